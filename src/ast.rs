//! Abstract syntax tree for Lox programs.
//!
//! Two closed node families: [`Expr`] (values) and [`Stmt`] (effects). Every
//! expression carries an [`ExprId`] assigned when the parser builds it, which
//! the resolver uses as the key of the binding table. Two syntactically equal
//! expressions at different places in the source therefore never share a
//! binding.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::token::Token;

static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

/// Stable identity of one expression node.
///
/// Ids come from a process-wide counter so that programs parsed one after
/// another (e.g. prompt lines) never collide in a shared binding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(usize);

impl ExprId {
    pub fn fresh() -> Self {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A **literal constant** that appears directly in the source code.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal ‑ stored as IEEE‑754 `f64`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    True,

    False,

    Nil,
}

/// An expression node: identity plus shape.
///
/// Not `Clone`: a copy would carry the same id as the original and share its
/// binding-table entry.
///
/// ```compile_fail
/// use rox::ast::{Expr, ExprKind, LiteralValue};
///
/// fn duplicate<T: Clone>(node: &T) -> T {
///     node.clone()
/// }
///
/// let expr = Expr::new(ExprKind::Literal(LiteralValue::Nil));
/// let copy: Expr = duplicate(&expr);
/// ```
#[derive(Debug, PartialEq)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
}

impl Expr {
    /// Wrap `kind` with a freshly allocated id.
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            id: ExprId::fresh(),
            kind,
        }
    }
}

/// Every kind of *expression* in Lox.
#[derive(Debug, PartialEq)]
pub enum ExprKind {
    /// A literal constant: number, string, `true`, `false`, or `nil`.
    Literal(LiteralValue),

    /// Parenthesised sub‑expression: `"(" expression ")"`.
    Grouping(Box<Expr>),

    /// Prefix unary operator expression
    /// *Example:* `!isReady` or `-42`
    Unary {
        /// The operator token (`!` or `-`).
        operator: Token,
        right: Box<Expr>,
    },

    /// Infix binary operator expression
    /// *Example:* `a + b`, `x <= y`
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Short‑circuiting logical operators `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token, // `AND` or `OR`
        right: Box<Expr>,
    },

    /// Variable access.
    Variable(Token),

    /// Assignment expression: `identifier "=" expression`
    Assign { name: Token, value: Box<Expr> },

    /// Function‑, method‑ or constructor call.
    Call {
        callee: Box<Expr>,
        /// The closing `)` token ‑ retained for error reporting.
        paren: Token,
        arguments: Vec<Expr>,
    },

    /// object.property
    Get { object: Box<Expr>, name: Token },

    /// object.property = value
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    /// The 'this' keyword inside a method.
    This(Token),

    /// `super.method`
    Super { keyword: Token, method: Token },
}

/// A named function or method: name, parameters and body.
///
/// Shared behind an `Rc` so that every closure created from the same
/// declaration points at one copy of the body.
#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: Token,

    /// Parameter name tokens (arity ≤ 255).
    pub params: Vec<Token>,

    pub body: Vec<Stmt>,
}

/// **Abstract‑Syntax‑Tree node** for *statements*.  A program is a sequence
/// of these nodes returned by [`Parser::parse`](crate::parser::Parser::parse).
///
/// `for` loops do not appear here: the parser lowers them to `While`.
#[derive(Debug, PartialEq)]
pub enum Stmt {
    /// Stand‑alone expression terminated by a semicolon.
    Expression(Expr),

    /// `print` statement used for output.
    Print(Expr),

    /// Variable declaration: `"var" IDENT ("=" initializer)? ";"`.
    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    /// Braced scope containing zero or more declarations/statements.
    Block(Vec<Stmt>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    While { condition: Expr, body: Box<Stmt> },

    /// Function declaration ‑ becomes a first‑class callable value.
    Function(Rc<FunctionDecl>),

    /// `return` statement inside a function body.
    Return {
        /// The `return` keyword token (for error locations).
        keyword: Token,

        /// Absent ⇒ `nil` is returned.
        value: Option<Expr>,
    },

    /// Class declaration. `superclass` is always an `ExprKind::Variable`.
    Class {
        name: Token,
        superclass: Option<Expr>,
        methods: Vec<Rc<FunctionDecl>>,
    },
}
