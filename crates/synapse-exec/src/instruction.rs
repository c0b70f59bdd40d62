//! The instruction plugin contract.
//!
//! Statements and ResultStatements call an [`Instruction`] identified by a
//! neuron ID. The generic contract receives the argument list with every
//! result expression already evaluated in place. An instruction may also
//! expose fast paths (`as_bool`, `as_int`, `as_double`, `as_direct`) that
//! receive the raw argument neurons and evaluate only what they need,
//! bypassing the argument stack.

use std::sync::Arc;

use indexmap::IndexMap;
use synapse_core::{NeuronGraph, NeuronId, Prototype, Value};

use crate::context::ExecContext;
use crate::error::RuntimeError;
use crate::fast_path::Capabilities;

/// What the enclosing frames should do after a statement ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Next,
    /// Skip the innermost loop to its end.
    Break,
}

pub trait Instruction: Send + Sync {
    fn name(&self) -> &str;

    /// Terminators halt the processor instead of running.
    fn is_terminator(&self) -> bool {
        false
    }

    /// Runs for side effect with evaluated arguments.
    fn execute(&self, ctx: &mut ExecContext<'_>, args: &[Value]) -> Result<Flow, RuntimeError> {
        let mut ignored = Vec::new();
        self.get_values(ctx, args, &mut ignored)?;
        Ok(Flow::Next)
    }

    /// Computes the instruction's result list into `out`.
    fn get_values(
        &self,
        _ctx: &mut ExecContext<'_>,
        _args: &[Value],
        _out: &mut Vec<Value>,
    ) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn as_bool(&self) -> Option<&dyn BoolInstruction> {
        None
    }

    fn as_int(&self) -> Option<&dyn IntInstruction> {
        None
    }

    fn as_double(&self) -> Option<&dyn DoubleInstruction> {
        None
    }

    fn as_direct(&self) -> Option<&dyn DirectInstruction> {
        None
    }
}

pub trait BoolInstruction {
    fn get_bool(&self, ctx: &mut ExecContext<'_>, args: &[NeuronId]) -> Result<bool, RuntimeError>;
}

pub trait IntInstruction {
    /// Whether the fast path applies to arguments with these capabilities.
    /// Instructions that evaluate their arguments through the fast paths
    /// override this.
    fn can_get_int(&self, _args: &[Capabilities]) -> bool {
        true
    }

    fn get_int(&self, ctx: &mut ExecContext<'_>, args: &[NeuronId]) -> Result<i64, RuntimeError>;
}

pub trait DoubleInstruction {
    fn can_get_double(&self, _args: &[Capabilities]) -> bool {
        true
    }

    fn get_double(&self, ctx: &mut ExecContext<'_>, args: &[NeuronId]) -> Result<f64, RuntimeError>;
}

/// Instructions that take their raw argument neurons for a statement call.
pub trait DirectInstruction {
    fn execute_direct(
        &self,
        ctx: &mut ExecContext<'_>,
        args: &[NeuronId],
    ) -> Result<Flow, RuntimeError>;
}

/// Instruction table keyed by the neuron that identifies each instruction.
#[derive(Default, Clone)]
pub struct InstructionSet {
    by_id: IndexMap<NeuronId, Arc<dyn Instruction>>,
    by_name: IndexMap<String, NeuronId>,
}

impl InstructionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in instructions, registered in `graph`.
    pub fn standard(graph: &NeuronGraph) -> Self {
        let mut set = Self::new();
        crate::builtins::register_all(&mut set, graph);
        set
    }

    /// Creates and pins a neuron for `instruction` and returns its ID.
    pub fn register(&mut self, graph: &NeuronGraph, instruction: impl Instruction + 'static) -> NeuronId {
        let id = graph.add(Prototype::Neuron);
        graph.pin(id);
        self.by_name.insert(instruction.name().to_string(), id);
        self.by_id.insert(id, Arc::new(instruction));
        tracing::debug!(instruction = %id, "instruction registered");
        id
    }

    pub fn get(&self, id: NeuronId) -> Option<&Arc<dyn Instruction>> {
        self.by_id.get(&id)
    }

    pub fn id_of(&self, name: &str) -> Option<NeuronId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for InstructionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.by_name.iter().map(|(name, id)| (id, name)))
            .finish()
    }
}
