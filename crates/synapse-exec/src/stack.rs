//! The argument (result) stack of a processor.
//!
//! Every `GetValue` evaluation runs inside its own list: the caller pushes an
//! empty list, the evaluation writes its results into the top list, and the
//! caller pops it. [`ExecContext::solve`](crate::ExecContext::solve) pairs
//! the push and the pop so the depth is restored on every path, errors
//! included.

use synapse_core::Value;

#[derive(Debug, Default)]
pub struct ArgumentStack {
    lists: Vec<Vec<Value>>,
}

impl ArgumentStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.lists.len()
    }

    pub(crate) fn push(&mut self) {
        self.lists.push(Vec::new());
    }

    pub(crate) fn pop(&mut self) -> Vec<Value> {
        self.lists.pop().unwrap_or_default()
    }

    /// Appends results to the innermost list. Results produced with no list
    /// open have no reader and are dropped.
    pub(crate) fn extend_top(&mut self, values: impl IntoIterator<Item = Value>) {
        if let Some(top) = self.lists.last_mut() {
            top.extend(values);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.lists.clear();
    }
}
