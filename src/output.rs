//! Output collaborator
//!
//! The evaluator writes program output through a single `write(text)`
//! primitive. Stdout is the default sink; the buffer sink captures output
//! for golden comparisons.

use std::cell::RefCell;
use std::io::Write as _;
use std::rc::Rc;

/// Destination for program output
pub trait Output {
    fn write(&mut self, text: &str);
}

/// Writes to the process stdout
#[derive(Debug, Default)]
pub struct StdoutOutput;

impl Output for StdoutOutput {
    fn write(&mut self, text: &str) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        // a closed pipe is not the program's error
        let _ = lock.write_all(text.as_bytes());
    }
}

/// Captures output in a shared buffer
///
/// Clones share the same buffer, so a test can keep one handle and give
/// another to the interpreter.
#[derive(Debug, Default, Clone)]
pub struct BufferOutput {
    buffer: Rc<RefCell<String>>,
}

impl BufferOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far
    pub fn contents(&self) -> String {
        self.buffer.borrow().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.buffer.borrow().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.buffer.borrow_mut().clear();
    }
}

impl Output for BufferOutput {
    fn write(&mut self, text: &str) {
        self.buffer.borrow_mut().push_str(text);
    }
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullOutput;

impl Output for NullOutput {
    fn write(&mut self, _text: &str) {}
}
