//! Execution core for neuron graphs.
//!
//! Programs are graphs of expression neurons whose operands are outgoing
//! links tagged by meaning. This crate runs them.
//!
//! # Architecture
//!
//! - [`Engine`] bundles the shared graph with the injected instruction and
//!   query tables, the lock manager, the diagnostic sink and the
//!   [`EngineConfig`].
//! - [`Processor`] is one thread of execution: a stack of [`CallFrame`]s
//!   stepped by a flat loop (`Ready -> Running -> Paused | Completed |
//!   Halted | Error`).
//! - [`ExecContext`] is what expressions and instructions see while
//!   running: the argument stack, the output, lock acquisition and
//!   diagnostics.
//! - [`WorkData`] caches each expression's classified operand links.
//! - [`fast_path`] lets BoolExpressions compare bools and numbers directly
//!   instead of through result lists.
//! - [`Instruction`] is the plugin contract for statements; the built-in
//!   set lives in [`builtins`].
//!
//! # Usage
//!
//! ```ignore
//! let graph = Arc::new(NeuronGraph::new());
//! let instructions = InstructionSet::standard(&graph);
//! let engine = Engine::new(graph, instructions, EngineConfig::default());
//! let b = GraphBuilder::new(engine.graph());
//! let print = engine.instructions().id_of("print").unwrap();
//! let hello = b.text("hello");
//! let root = b.statement(print, vec![hello])?;
//! assert_eq!(engine.execute(root)?, vec!["hello"]);
//! ```

pub mod builder;
pub mod builtins;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod expr;
pub mod fast_path;
pub mod frame;
pub mod instruction;
pub mod load;
pub mod processor;
pub mod source;
pub mod stack;
pub mod trace;
pub mod work;

pub use builder::GraphBuilder;
pub use config::EngineConfig;
pub use context::ExecContext;
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, MemorySink, TracingSink};
pub use engine::Engine;
pub use error::RuntimeError;
pub use fast_path::{Capabilities, FastPath, Strategy};
pub use frame::{CallFrame, Clause};
pub use instruction::{
    BoolInstruction, DirectInstruction, DoubleInstruction, Flow, Instruction, InstructionSet,
    IntInstruction,
};
pub use load::{is_code_loaded, load_code};
pub use processor::{Processor, ProcessorState};
pub use source::{QueryRegistry, Row, RowCursor, RowSource, StaticRows};
pub use stack::ArgumentStack;
pub use trace::TraceEntry;
pub use work::WorkData;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use synapse_core::NeuronGraph;

    use crate::{Engine, EngineConfig, InstructionSet, MemorySink};

    pub fn engine() -> Engine {
        engine_with_sink().0
    }

    pub fn engine_with_sink() -> (Engine, Arc<MemorySink>) {
        let graph = Arc::new(NeuronGraph::new());
        let instructions = InstructionSet::standard(&graph);
        let sink = Arc::new(MemorySink::new());
        let engine = Engine::new(graph, instructions, EngineConfig::default()).with_sink(sink.clone());
        (engine, sink)
    }
}
