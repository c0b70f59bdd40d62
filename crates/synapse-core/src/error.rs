//! Core error types for synapse-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the graph registry.

use crate::id::NeuronId;
use thiserror::Error;

/// Errors produced by graph mutations and lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A neuron ID was not found in the graph.
    #[error("neuron not found: {id}")]
    NeuronNotFound { id: NeuronId },

    /// The neuron exists but has the wrong kind for the operation.
    #[error("neuron {id} is not a {expected}")]
    WrongKind { id: NeuronId, expected: &'static str },

    /// Reserved neurons cannot be modified structurally.
    #[error("neuron {id} is reserved")]
    Reserved { id: NeuronId },
}
