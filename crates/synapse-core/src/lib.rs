pub mod cleanup;
pub mod error;
pub mod graph;
pub mod id;
pub mod known;
pub mod link;
pub mod lock_manager;
pub mod neuron;
pub mod value;
pub mod work_cell;

// Re-export commonly used types
pub use cleanup::{delete_pattern, CleanupReport};
pub use error::CoreError;
pub use graph::{GraphObserver, NeuronGraph};
pub use id::{NeuronId, ProcessorId};
pub use known::Known;
pub use link::{Link, LinkBuffer, LinkInfo};
pub use lock_manager::{
    HeldLocks, LockDenial, LockError, LockLevel, LockManager, LockRequest, LockRequestList,
    LockStatusEntry,
};
pub use neuron::{ExpressionKind, Neuron, NeuronData, NeuronRef, Prototype};
pub use value::{Scalar, Value};
pub use work_cell::WorkCell;
