//! Evaluation of each expression kind.
//!
//! Expressions are a closed set ([`ExpressionKind`](synapse_core::ExpressionKind));
//! [`ExecContext`](crate::ExecContext) dispatches on the kind and calls into
//! the module for it. Each module reads the expression's operands from its
//! cached [`WorkData`](crate::WorkData).

pub mod assignment;
pub mod block;
pub mod boolean;
pub mod by_ref;
pub mod conditional;
pub mod statement;

use crate::error::RuntimeError;

fn unexpected_work(neuron: synapse_core::NeuronId, expected: &str) -> RuntimeError {
    RuntimeError::Internal {
        message: format!("work data of {neuron} is not {expected}"),
    }
}
