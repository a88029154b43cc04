#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use rox::{Lox, RunError};

/// In-memory sink shared between a test and the interpreter it drives.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("interpreter wrote invalid UTF-8")
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A session whose `print` output can be inspected.
pub fn session() -> (Lox, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let lox = Lox::with_output(Box::new(buffer.clone()));
    (lox, buffer)
}

/// Run `source` in a fresh session and return what it printed.
pub fn run(source: &str) -> (String, Result<(), RunError>) {
    let (mut lox, buffer) = session();
    let result = lox.run(source);
    (buffer.contents(), result)
}

/// Run `source`, which must succeed, and return its printed lines.
pub fn output_of(source: &str) -> Vec<String> {
    let (out, result) = run(source);
    if let Err(e) = result {
        panic!("program failed:\n{}\noutput so far:\n{}", e, out);
    }
    out.lines().map(str::to_string).collect()
}

/// Rendered static diagnostics of a program that must fail analysis.
pub fn static_errors(source: &str) -> Vec<String> {
    match rox::analyze(source) {
        Ok(_) => panic!("expected static errors for:\n{}", source),
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    }
}

/// Rendered runtime error of a program that must fail while running.
pub fn runtime_error(source: &str) -> (String, String) {
    let (out, result) = run(source);
    match result {
        Err(RunError::Runtime(e)) => (out, e.to_string()),
        Err(RunError::Static(errors)) => panic!("unexpected static errors: {:?}", errors),
        Ok(()) => panic!("expected a runtime error, got output:\n{}", out),
    }
}
