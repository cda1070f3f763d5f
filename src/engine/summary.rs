// src/engine/summary.rs

use std::path::PathBuf;

/// Aggregate of one drained batch, handed to the host's
/// stack-completed event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Masters compiled in this batch, in enqueue order.
    pub compiled: Vec<PathBuf>,
    /// Masters that produced no artifact.
    pub failed: Vec<PathBuf>,
    pub errors: usize,
    pub warnings: usize,
    pub todos: usize,
    /// Compiler failures and timeouts.
    pub unhandled: usize,
    /// Whether any compiled master's family ended the batch with an error.
    pub has_errors: bool,
}

impl BatchSummary {
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}
