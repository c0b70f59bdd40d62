//! Execution trace recording.
//!
//! When [`EngineConfig::trace_enabled`](crate::EngineConfig::trace_enabled)
//! is set, the processor records a [`TraceEntry`] for every statement it
//! executes.

use serde::Serialize;
use synapse_core::{ExpressionKind, NeuronId};

/// One executed statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub neuron: NeuronId,
    pub kind: ExpressionKind,
    /// Number of frames on the stack when the statement ran.
    pub depth: usize,
}

/// Renders a trace as one line per statement, indented by frame depth.
pub fn render(trace: &[TraceEntry]) -> String {
    trace
        .iter()
        .map(|entry| {
            let indent = entry.depth.saturating_sub(1) * 2;
            format!("{:indent$}{}\n", "", entry.kind.name())
        })
        .collect()
}
