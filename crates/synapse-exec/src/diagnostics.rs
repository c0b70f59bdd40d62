//! Reporting of structural, type and invariant errors.
//!
//! These never abort a run. The evaluating code reports a [`Diagnostic`] to
//! the engine's [`DiagnosticSink`] and carries on with the documented
//! default (false, an empty list, zero, empty text, or a no-op).

use std::fmt;
use std::sync::Mutex;

use serde::Serialize;
use synapse_core::NeuronId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// A link the expression needs is missing or points at the wrong kind.
    Structural,
    /// A value had the wrong type; a default was substituted.
    Type,
    /// An unknown operator or loop style, or a malformed conditional.
    Invariant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// The expression kind or component that reported it.
    pub source: &'static str,
    pub neuron: NeuronId,
    /// The offending neuron's string form.
    pub rendered: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.source, self.rendered, self.message)
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing` at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        tracing::error!(
            kind = ?diagnostic.kind,
            source = diagnostic.source,
            neuron = %diagnostic.neuron,
            rendered = %diagnostic.rendered,
            "{}",
            diagnostic.message
        );
    }
}

/// Collects diagnostics in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns everything collected so far.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, diagnostic: Diagnostic) {
        tracing::warn!(source = diagnostic.source, neuron = %diagnostic.neuron, "{}", diagnostic.message);
        self.lock().push(diagnostic);
    }
}
