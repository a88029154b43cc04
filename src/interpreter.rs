//! Tree-walking evaluator.
//!
//! Expressions evaluate to a [`Value`]; statements run for their effects and
//! may unwind with an [`Unwind`]: either a `return` travelling to the nearest
//! enclosing call, or a runtime error travelling to [`Interpreter::interpret`].
//!
//! Variable reads and writes consult the binding table produced by the
//! resolver: a recorded distance goes straight to that frame, no entry means
//! the name is global.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info, warn};

use crate::ast::{Expr, ExprId, ExprKind, FunctionDecl, LiteralValue, Stmt};
use crate::callable::{LoxFunction, NativeFunction};
use crate::class::{LoxClass, LoxInstance, INITIALIZER};
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::resolver::Bindings;
use crate::stack::ensure_sufficient_stack;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Non-local exit from statement execution.
#[derive(Debug)]
pub enum Unwind {
    /// A `return` carrying its value to the enclosing call. Not an error.
    Return(Value),

    /// A runtime error aborting the current run.
    Error(LoxError),
}

impl From<LoxError> for Unwind {
    fn from(e: LoxError) -> Self {
        Unwind::Error(e)
    }
}

/// Deepest nesting of Lox calls; one more fails the run with "Stack overflow.".
pub const MAX_CALL_DEPTH: usize = 16_384;

/// Result of executing one statement.
pub type ExecResult = std::result::Result<(), Unwind>;

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    locals: Bindings,
    out: Box<dyn Write>,
    /// Lox calls currently in progress.
    call_depth: usize,
}

impl Interpreter {
    /// Interpreter printing to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Interpreter printing to `out`. The global scope holds `clock`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Rc::new(RefCell::new(Environment::new()));

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction(Rc::new(NativeFunction {
                name: "clock",
                arity: 0,
                func: |_args: &[Value]| {
                    let micros: i64 = Utc::now().timestamp_micros();
                    Value::Number(micros as f64 / 1_000_000.0)
                },
            })),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: Bindings::new(),
            out,
            call_depth: 0,
        }
    }

    /// Merge a resolver's binding table into this interpreter's. Ids are
    /// globally unique, so tables from earlier runs stay valid.
    pub fn add_bindings(&mut self, bindings: Bindings) {
        debug!("Adding {} binding(s)", bindings.len());

        self.locals.extend(bindings);
    }

    /// Run a program. The first runtime error stops the run and is returned;
    /// the interpreter stays usable for the next run.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        info!("Interpreting {} statement(s)", statements.len());

        let mut outcome: Result<()> = Ok(());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}

                Err(Unwind::Error(e)) => {
                    debug!("Runtime error aborts run: {:?}", e);
                    outcome = Err(e);
                    break;
                }

                Err(Unwind::Return(value)) => {
                    // Only reachable when the resolver was skipped.
                    debug!("Top-level return with {}, stopping run", value);
                    break;
                }
            }
        }

        // Output printed before a runtime error must still appear. When both
        // fail, the runtime error is the one reported.
        let flushed: io::Result<()> = self.out.flush();
        if let (Err(flush_error), Err(_)) = (&flushed, &outcome) {
            warn!("Discarding output flush failure: {}", flush_error);
        }
        outcome?;
        flushed?;

        info!("Interpretation completed");

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    pub fn execute(&mut self, stmt: &Stmt) -> ExecResult {
        ensure_sufficient_stack(|| self.execute_inner(stmt))
    }

    fn execute_inner(&mut self, stmt: &Stmt) -> ExecResult {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value).map_err(LoxError::from)?;
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}'", name.lexeme);

                self.environment.borrow_mut().define(&name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let environment: EnvRef = Environment::child_of(&self.environment);
                self.execute_block(statements, environment)?;
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);

                let function = LoxFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );

                self.environment.borrow_mut().define(
                    &declaration.name.lexeme,
                    Value::Function(Rc::new(function)),
                );
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                return Err(Unwind::Return(value));
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                self.execute_class(name, superclass.as_ref(), methods)?;
            }
        }

        Ok(())
    }

    /// Run `statements` with `environment` as the current scope, restoring the
    /// previous scope on every exit path.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: EnvRef) -> ExecResult {
        let previous: EnvRef = std::mem::replace(&mut self.environment, environment);

        let result: ExecResult = statements.iter().try_for_each(|stmt| self.execute(stmt));

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<()> {
        debug!("Defining class '{}'", name.lexeme);

        let superclass: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let token: &Token = match &expr.kind {
                        ExprKind::Variable(token) => token,
                        _ => name,
                    };
                    return Err(LoxError::runtime(token, "Superclass must be a class."));
                }
            },
            None => None,
        };

        // Bound first so methods can refer to the class by name.
        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        let enclosing: EnvRef = Rc::clone(&self.environment);

        if let Some(superclass) = &superclass {
            self.environment = Environment::child_of(&enclosing);
            self.environment
                .borrow_mut()
                .define("super", Value::Class(Rc::clone(superclass)));
        }

        let methods: HashMap<String, Rc<LoxFunction>> = methods
            .iter()
            .map(|declaration| {
                let function = LoxFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    declaration.name.lexeme == INITIALIZER,
                );
                (declaration.name.lexeme.clone(), Rc::new(function))
            })
            .collect();

        let class = LoxClass::new(&name.lexeme, superclass, methods);

        self.environment = enclosing;

        self.environment
            .borrow_mut()
            .assign(name, Value::Class(Rc::new(class)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        ensure_sufficient_stack(|| self.evaluate_inner(expr))
    }

    fn evaluate_inner(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::from(s.as_str()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            ExprKind::Grouping(inner) => self.evaluate(inner),

            ExprKind::Unary { operator, right } => {
                let right: Value = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::MINUS => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(LoxError::runtime(operator, "Operand must be a number.")),
                    },
                    TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
                    _ => unreachable!("parser produced unary operator {:?}", operator),
                }
            }

            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let right: Value = self.evaluate(right)?;

                binary(operator, left, right)
            }

            ExprKind::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;

                let short_circuit: bool = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            ExprKind::Variable(name) => self.look_up_variable(name, expr.id),

            ExprKind::Assign { name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(&expr.id) {
                    Some(&distance) => {
                        Environment::assign_at(&self.environment, distance, name, value.clone())
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            ExprKind::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut values: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                let Some(function) = callee.as_callable() else {
                    return Err(LoxError::runtime(
                        paren,
                        "Can only call functions and classes.",
                    ));
                };

                if values.len() != function.arity() {
                    return Err(LoxError::runtime(
                        paren,
                        format!(
                            "Expected {} arguments but got {}.",
                            function.arity(),
                            values.len()
                        ),
                    ));
                }

                if self.call_depth >= MAX_CALL_DEPTH {
                    return Err(LoxError::runtime(paren, "Stack overflow."));
                }

                debug!("Calling {} with {} argument(s)", callee, values.len());

                self.call_depth += 1;
                let result: Result<Value> = function.call(self, values);
                self.call_depth -= 1;

                result
            }

            ExprKind::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),
                _ => Err(LoxError::runtime(name, "Only instances have properties.")),
            },

            ExprKind::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name, "Only instances have fields."));
                };

                let value: Value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());

                Ok(value)
            }

            ExprKind::This(keyword) => self.look_up_variable(keyword, expr.id),

            ExprKind::Super { method, .. } => {
                let Some(&distance) = self.locals.get(&expr.id) else {
                    unreachable!("'super' at line {} was never resolved", method.line)
                };

                let superclass: Value = Environment::get_at(&self.environment, distance, "super");
                // `this` lives in the frame just inside the one binding `super`.
                let object: Value = Environment::get_at(&self.environment, distance - 1, "this");

                let (Value::Class(superclass), Value::Instance(instance)) = (superclass, object)
                else {
                    unreachable!("'super'/'this' frames hold a class and an instance")
                };

                match superclass.find_method(&method.lexeme) {
                    Some(found) => Ok(Value::Function(Rc::new(found.bind(&instance)))),
                    None => Err(LoxError::runtime(
                        method,
                        format!("Undefined property '{}'.", method.lexeme),
                    )),
                }
            }
        }
    }

    fn look_up_variable(&self, name: &Token, id: ExprId) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => Ok(Environment::get_at(
                &self.environment,
                distance,
                &name.lexeme,
            )),
            None => self.globals.borrow().get(name),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Binary operators other than `and`/`or`.
///
/// `+` never fails: two numbers add, two strings concatenate, and any other
/// pair is stringified and concatenated. Every other arithmetic or comparison
/// operator requires two numbers. Division follows IEEE rules, so `1 / 0` is
/// infinity rather than an error.
fn binary(operator: &Token, left: Value, right: Value) -> Result<Value> {
    match operator.token_type {
        TokenType::EQUAL_EQUAL => return Ok(Value::Bool(left == right)),
        TokenType::BANG_EQUAL => return Ok(Value::Bool(left != right)),
        TokenType::PLUS => {
            return Ok(match (left, right) {
                (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                (Value::String(a), Value::String(b)) => Value::from(format!("{}{}", a, b)),
                (a, b) => Value::from(format!("{}{}", a, b)),
            });
        }
        _ => {}
    }

    let (a, b) = match (&left, &right) {
        (Value::Number(a), Value::Number(b)) => (*a, *b),
        _ => {
            debug!(
                "'{}' applied to {} and {}",
                operator.lexeme,
                left.type_name(),
                right.type_name()
            );
            return Err(LoxError::runtime(operator, "Operands must be numbers."));
        }
    };

    Ok(match operator.token_type {
        TokenType::MINUS => Value::Number(a - b),
        TokenType::STAR => Value::Number(a * b),
        TokenType::SLASH => Value::Number(a / b),
        TokenType::GREATER => Value::Bool(a > b),
        TokenType::GREATER_EQUAL => Value::Bool(a >= b),
        TokenType::LESS => Value::Bool(a < b),
        TokenType::LESS_EQUAL => Value::Bool(a <= b),
        _ => unreachable!("parser produced binary operator {:?}", operator),
    })
}
