//! The engine: everything processors share.
//!
//! An [`Engine`] bundles the graph with the injected tables (instructions
//! and queries), the lock manager, the diagnostic sink and the
//! configuration. It is `Sync`; any number of [`Processor`]s may run
//! against one engine from different threads.

use std::sync::Arc;

use synapse_core::{LockManager, NeuronGraph, NeuronId};

use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::RuntimeError;
use crate::instruction::InstructionSet;
use crate::processor::{Processor, ProcessorState};
use crate::source::QueryRegistry;

pub struct Engine {
    graph: Arc<NeuronGraph>,
    instructions: InstructionSet,
    queries: QueryRegistry,
    locks: Arc<LockManager>,
    sink: Arc<dyn DiagnosticSink>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(graph: Arc<NeuronGraph>, instructions: InstructionSet, config: EngineConfig) -> Self {
        let locks = match config.lock_timeout {
            Some(timeout) => LockManager::with_timeout(timeout),
            None => LockManager::new(),
        };
        Engine {
            graph,
            instructions,
            queries: QueryRegistry::new(),
            locks: Arc::new(locks),
            sink: Arc::new(TracingSink),
            config,
        }
    }

    pub fn with_queries(mut self, queries: QueryRegistry) -> Self {
        self.queries = queries;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn graph(&self) -> &NeuronGraph {
        &self.graph
    }

    pub fn shared_graph(&self) -> &Arc<NeuronGraph> {
        &self.graph
    }

    pub fn instructions(&self) -> &InstructionSet {
        &self.instructions
    }

    pub fn queries(&self) -> &QueryRegistry {
        &self.queries
    }

    pub fn locks(&self) -> &Arc<LockManager> {
        &self.locks
    }

    pub fn sink(&self) -> &dyn DiagnosticSink {
        self.sink.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A new processor in the Ready state.
    pub fn processor(&self) -> Processor<'_> {
        Processor::new(self)
    }

    /// Runs `root` to the end on a fresh processor and returns its output.
    /// Halting on a terminator counts as success.
    pub fn execute(&self, root: NeuronId) -> Result<Vec<String>, RuntimeError> {
        let mut processor = self.processor();
        processor.start(root);
        processor.run();
        match processor.state() {
            ProcessorState::Error { error } => Err(error.clone()),
            _ => Ok(processor.output().to_vec()),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("graph", &self.graph)
            .field("instructions", &self.instructions)
            .field("queries", &self.queries)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
