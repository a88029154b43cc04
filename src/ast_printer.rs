use crate::ast::{Expr, ExprKind, LiteralValue};
use crate::token::format_literal_number;

/// Renders expressions in fully parenthesised prefix form, e.g.
/// `1 + 2 * 3` → `(+ 1.0 (* 2.0 3.0))`.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(&self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Literal(literal) => match literal {
                LiteralValue::Number(n) => format_literal_number(*n),
                LiteralValue::Str(s) => s.clone(),
                LiteralValue::True => "true".to_string(),
                LiteralValue::False => "false".to_string(),
                LiteralValue::Nil => "nil".to_string(),
            },

            ExprKind::Grouping(inner) => self.parenthesize("group", &[&**inner]),

            ExprKind::Unary { operator, right } => self.parenthesize(&operator.lexeme, &[&**right]),

            ExprKind::Binary {
                left,
                operator,
                right,
            }
            | ExprKind::Logical {
                left,
                operator,
                right,
            } => self.parenthesize(&operator.lexeme, &[&**left, &**right]),

            ExprKind::Variable(name) => name.lexeme.clone(),

            ExprKind::Assign { name, value } => {
                self.parenthesize(&format!("= {}", name.lexeme), &[&**value])
            }

            ExprKind::Call {
                callee, arguments, ..
            } => {
                let mut parts: Vec<&Expr> = vec![&**callee];
                parts.extend(arguments.iter());
                self.parenthesize("call", &parts)
            }

            ExprKind::Get { object, name } => {
                self.parenthesize(&format!(". {}", name.lexeme), &[&**object])
            }

            ExprKind::Set {
                object,
                name,
                value,
            } => self.parenthesize(&format!("set {}", name.lexeme), &[&**object, &**value]),

            ExprKind::This(_) => "this".to_string(),

            ExprKind::Super { method, .. } => format!("(super {})", method.lexeme),
        }
    }

    fn parenthesize(&self, name: &str, exprs: &[&Expr]) -> String {
        let mut out = String::from("(");
        out.push_str(name);

        for expr in exprs {
            out.push(' ');
            out.push_str(&self.print(expr));
        }

        out.push(')');
        out
    }
}
