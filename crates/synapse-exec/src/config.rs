//! Engine configuration.

use std::time::Duration;

/// Settings shared by every processor of an [`Engine`](crate::Engine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Validate conditional statements before running them: at most one
    /// clause without a condition, placed last, and exactly one clause for
    /// ForEach, Until and query loops. Default: true.
    pub check_conditions: bool,
    /// Maximum number of call frames per processor. Default: 256.
    pub max_frame_depth: usize,
    /// Record a [`TraceEntry`](crate::TraceEntry) per executed statement.
    pub trace_enabled: bool,
    /// How long a LockExpression waits for a conflicting lock; `None` waits
    /// forever.
    pub lock_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            check_conditions: true,
            max_frame_depth: 256,
            trace_enabled: false,
            lock_timeout: None,
        }
    }
}
