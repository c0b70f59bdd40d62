//! Host errors that abort a processor's run.
//!
//! Malformed graphs are not errors in this sense: they are reported as
//! [`Diagnostic`](crate::diagnostics::Diagnostic)s and evaluation continues
//! with a safe default. A [`RuntimeError`] means the run cannot continue,
//! e.g. a fast path was dispatched to a neuron that cannot serve it.

use synapse_core::{CoreError, LockError, NeuronId};

/// Errors that move a processor into the error state.
///
/// Variants carry the neuron being executed where one is known.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("neuron {neuron} is not an expression")]
    NotAnExpression { neuron: NeuronId },

    #[error("frame depth limit ({limit}) exceeded at neuron {neuron}")]
    FrameLimitExceeded { neuron: NeuronId, limit: usize },

    #[error("neuron {neuron} cannot produce a {capability} directly")]
    InvalidDispatch {
        neuron: NeuronId,
        capability: &'static str,
    },

    #[error("instruction failed at neuron {neuron}: {message}")]
    Instruction { neuron: NeuronId, message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}
