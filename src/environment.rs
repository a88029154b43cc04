use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to a scope frame. Closures hold these, so a frame lives as
/// long as its longest holder.
pub type EnvRef = Rc<RefCell<Environment>>;

/// One lexical scope: its bindings plus the frame it is nested in.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Fresh shared frame nested in `enclosing`.
    pub fn child_of(enclosing: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(enclosing))))
    }

    /// Bind `name` in this frame, overwriting any existing binding here.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Dynamic lookup through the enclosing chain.
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    /// Dynamic assignment through the enclosing chain; never creates a binding.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// The frame exactly `distance` hops out from `env`.
    ///
    /// Distances come from the resolver, so a missing frame is a bug in the
    /// resolver or interpreter, not in the user's program.
    pub fn ancestor(env: &EnvRef, distance: usize) -> EnvRef {
        let mut frame: EnvRef = Rc::clone(env);

        for hop in 0..distance {
            let next: EnvRef = match &frame.borrow().enclosing {
                Some(enclosing) => Rc::clone(enclosing),
                None => unreachable!(
                    "resolved distance {} but scope chain ends after {} hop(s)",
                    distance, hop
                ),
            };
            frame = next;
        }

        frame
    }

    /// Read `name` from the frame `distance` hops out, with no fallback.
    pub fn get_at(env: &EnvRef, distance: usize, name: &str) -> Value {
        let frame: EnvRef = Self::ancestor(env, distance);
        let value: Option<Value> = frame.borrow().values.get(name).cloned();

        match value {
            Some(value) => value,
            None => unreachable!("'{}' not bound at resolved distance {}", name, distance),
        }
    }

    /// Write `name` in the frame `distance` hops out, with no fallback.
    pub fn assign_at(env: &EnvRef, distance: usize, name: &Token, value: Value) {
        let frame: EnvRef = Self::ancestor(env, distance);
        let mut frame = frame.borrow_mut();

        match frame.values.get_mut(&name.lexeme) {
            Some(slot) => *slot = value,
            None => unreachable!(
                "'{}' not bound at resolved distance {}",
                name.lexeme, distance
            ),
        }
    }
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}
