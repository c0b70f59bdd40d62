//! Stable ID newtypes for graph entities.
//!
//! [`NeuronId`] identifies every vertex in the graph (values, variables,
//! clusters, expressions and the well-known meaning tags). [`ProcessorId`]
//! identifies one thread of execution and is the owner key for locks.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable neuron identifier, unique within one [`NeuronGraph`](crate::graph::NeuronGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NeuronId(pub u64);

/// Identity of a processor (one script thread of execution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessorId(pub Uuid);

impl ProcessorId {
    /// Allocates a fresh random processor identity.
    pub fn new() -> Self {
        ProcessorId(Uuid::new_v4())
    }
}

impl Default for ProcessorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NeuronId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
