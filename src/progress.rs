//! Shared scan progress log
//!
//! The progress log is the only mutable structure shared across scan
//! workers. A single mutex guards the line buffer; the optional callback
//! is invoked with a rendered snapshot *after* the lock is released, so
//! observers can never stall a worker inside the critical section.

use std::sync::Mutex;

/// Callback invoked with the full rendered log after every append.
pub type ProgressCallback = Box<dyn Fn(&str) + Send + Sync>;

pub struct ProgressLog {
    lines: Mutex<Vec<String>>,
    callback: Option<ProgressCallback>,
}

impl ProgressLog {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            callback,
        }
    }

    /// Append a line and notify the observer, if any.
    pub fn push(&self, line: impl Into<String>) {
        let snapshot = {
            let mut lines = self.lines.lock().expect("progress log poisoned");
            lines.push(line.into());
            lines.join("\n")
        };
        if let Some(ref callback) = self.callback {
            callback(&snapshot);
        }
    }

    /// All lines appended so far, in real completion order.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("progress log poisoned").clone()
    }

    pub fn render(&self) -> String {
        self.lines().join("\n")
    }
}

impl Default for ProgressLog {
    fn default() -> Self {
        Self::new(None)
    }
}
