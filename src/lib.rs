//! A tree-walking interpreter for the Lox scripting language.
//!
//! Source text flows through four stages:
//!
//! ```text
//! text → Scanner → tokens → Parser → AST → Resolver → (AST, bindings) → Interpreter
//! ```
//!
//! [`analyze`] runs the static stages and returns either a [`Program`] or
//! every static error found. [`Lox`] keeps one interpreter alive across runs,
//! which is what a prompt needs.

pub mod ast;
pub mod ast_printer;
pub mod callable;
pub mod class;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
mod stack;
pub mod token;
pub mod value;

use std::io::Write;

use log::{debug, info};
use thiserror::Error;

use crate::ast::{Expr, Stmt};
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::{Bindings, Resolver};
use crate::value::Value;

/// Exit status for programs rejected by the scanner, parser or resolver.
pub const EXIT_STATIC_ERROR: i32 = 65;

/// Exit status for programs that failed while running.
pub const EXIT_RUNTIME_ERROR: i32 = 70;

/// A statically valid program: its statements and their binding table.
#[derive(Debug)]
pub struct Program {
    pub statements: Vec<Stmt>,
    pub bindings: Bindings,
}

/// Why a run did not complete.
#[derive(Debug, Error)]
pub enum RunError {
    /// One or more scan/parse/resolve errors; nothing was executed.
    #[error("{}", render_all(.0))]
    Static(Vec<LoxError>),

    /// Execution started and stopped at this error.
    #[error(transparent)]
    Runtime(LoxError),
}

impl RunError {
    /// Conventional process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Static(_) => EXIT_STATIC_ERROR,
            RunError::Runtime(_) => EXIT_RUNTIME_ERROR,
        }
    }

    /// Every diagnostic carried by this failure.
    pub fn errors(&self) -> Vec<&LoxError> {
        match self {
            RunError::Static(errors) => errors.iter().collect(),
            RunError::Runtime(error) => vec![error],
        }
    }
}

fn render_all(errors: &[LoxError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Scan, parse and resolve `source`. Errors from all three stages are
/// reported together; the resolver only runs on a clean parse.
pub fn analyze(source: &str) -> Result<Program, Vec<LoxError>> {
    let (tokens, mut errors) = scanner::scan_tokens(source);

    let statements: Vec<Stmt> = match Parser::new(tokens).parse() {
        Ok(statements) => statements,
        Err(parse_errors) => {
            errors.extend(parse_errors);
            return Err(errors);
        }
    };

    let bindings: Bindings = match Resolver::new().resolve(&statements) {
        Ok(bindings) => bindings,
        Err(resolve_errors) => {
            errors.extend(resolve_errors);
            return Err(errors);
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    debug!(
        "Analyzed {} statement(s), {} binding(s)",
        statements.len(),
        bindings.len()
    );

    Ok(Program {
        statements,
        bindings,
    })
}

/// Scan and parse `source` as a single expression.
pub fn parse_expression(source: &str) -> Result<Expr, Vec<LoxError>> {
    let (tokens, mut errors) = scanner::scan_tokens(source);

    match Parser::new(tokens).parse_expression() {
        Ok(expr) if errors.is_empty() => Ok(expr),
        Ok(_) => Err(errors),
        Err(parse_errors) => {
            errors.extend(parse_errors);
            Err(errors)
        }
    }
}

/// An interpreter session. Globals defined by one run are visible to the next.
pub struct Lox {
    interpreter: Interpreter,
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}

impl Lox {
    /// Session printing to stdout.
    pub fn new() -> Self {
        Lox {
            interpreter: Interpreter::new(),
        }
    }

    /// Session printing to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        Lox {
            interpreter: Interpreter::with_output(out),
        }
    }

    /// Analyze and execute `source`. Static errors suppress execution.
    pub fn run(&mut self, source: &str) -> Result<(), RunError> {
        info!("Running {} byte(s) of source", source.len());

        let program: Program = analyze(source).map_err(RunError::Static)?;

        self.execute(program)
    }

    /// Execute an already analyzed program.
    pub fn execute(&mut self, program: Program) -> Result<(), RunError> {
        self.interpreter.add_bindings(program.bindings);

        self.interpreter
            .interpret(&program.statements)
            .map_err(RunError::Runtime)
    }

    /// Analyze and evaluate a single expression, returning its value.
    pub fn evaluate(&mut self, source: &str) -> Result<Value, RunError> {
        let expr: Expr = parse_expression(source).map_err(RunError::Static)?;
        let bindings: Bindings = Resolver::new()
            .resolve_expression(&expr)
            .map_err(RunError::Static)?;

        self.interpreter.add_bindings(bindings);

        self.interpreter.evaluate(&expr).map_err(RunError::Runtime)
    }
}
