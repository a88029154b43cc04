//! Things that can be called: native functions, user functions (closures) and
//! classes. Classes implement [`Callable`] in `class.rs`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::ast::FunctionDecl;
use crate::class::LoxInstance;
use crate::environment::{EnvRef, Environment};
use crate::error::Result;
use crate::interpreter::{Interpreter, Unwind};
use crate::value::Value;

/// The call capability. Callers check `arguments.len() == arity()` before
/// calling; implementations may assume it.
pub trait Callable {
    fn arity(&self) -> usize;

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value>;
}

/// A function implemented in Rust.
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: fn(&[Value]) -> Value,
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(&self, _interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!("Calling native function '{}'", self.name);

        Ok((self.func)(&arguments))
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

/// A user-defined function value: a declaration closed over the environment
/// it was defined in.
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: EnvRef,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvRef, is_initializer: bool) -> Self {
        LoxFunction {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    /// Same declaration, closed over one extra frame that binds `this`.
    pub fn bind(&self, instance: &Rc<RefCell<LoxInstance>>) -> LoxFunction {
        let environment: EnvRef = Environment::child_of(&self.closure);

        environment
            .borrow_mut()
            .define("this", Value::Instance(Rc::clone(instance)));

        LoxFunction::new(
            Rc::clone(&self.declaration),
            environment,
            self.is_initializer,
        )
    }

    /// The instance an initializer is bound to.
    fn bound_this(&self) -> Value {
        Environment::get_at(&self.closure, 0, "this")
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!("Calling user-defined function '{}'", self.name());

        // Parented at the closure, not the caller: scoping is lexical.
        let environment: EnvRef = Environment::child_of(&self.closure);

        {
            let mut frame = environment.borrow_mut();
            for (param, argument) in self.declaration.params.iter().zip(arguments) {
                frame.define(&param.lexeme, argument);
            }
        }

        let returned: Value = match interpreter.execute_block(&self.declaration.body, environment) {
            Ok(()) => Value::Nil,
            Err(Unwind::Return(value)) => value,
            Err(Unwind::Error(e)) => return Err(e),
        };

        if self.is_initializer {
            return Ok(self.bound_this());
        }

        Ok(returned)
    }
}

impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoxFunction")
            .field("name", &self.name())
            .field("arity", &self.declaration.params.len())
            .field("is_initializer", &self.is_initializer)
            .finish()
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}
