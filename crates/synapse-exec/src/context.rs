//! Per-processor evaluation context.
//!
//! [`ExecContext`] is what expressions and instructions see while running:
//! the shared engine (graph, instruction table, lock manager), the owning
//! processor's identity, its argument stack and its output. Result
//! expressions are evaluated through [`ExecContext::solve`]; statements
//! through [`ExecContext::execute`], which returns how the enclosing frame
//! should proceed.

use std::sync::Arc;

use synapse_core::{
    ExpressionKind, HeldLocks, Known, LockRequestList, NeuronData, NeuronGraph, NeuronId,
    ProcessorId, Value,
};

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::engine::Engine;
use crate::error::RuntimeError;
use crate::expr::{assignment, block, boolean, by_ref, conditional, statement};
use crate::frame::Step;
use crate::stack::ArgumentStack;
use crate::trace::TraceEntry;
use crate::work::{self, WorkData};

pub struct ExecContext<'e> {
    engine: &'e Engine,
    owner: ProcessorId,
    stack: ArgumentStack,
    output: Vec<String>,
    trace: Option<Vec<TraceEntry>>,
    /// Frame depth of the statement being executed, for the trace.
    pub(crate) depth: usize,
    /// The statement whose instruction is running.
    pub(crate) current: NeuronId,
}

impl<'e> ExecContext<'e> {
    pub fn new(engine: &'e Engine, owner: ProcessorId) -> Self {
        let trace = engine.config().trace_enabled.then(Vec::new);
        ExecContext {
            engine,
            owner,
            stack: ArgumentStack::new(),
            output: Vec::new(),
            trace,
            depth: 0,
            current: NeuronId(0),
        }
    }

    pub fn engine(&self) -> &'e Engine {
        self.engine
    }

    pub fn graph(&self) -> &'e NeuronGraph {
        self.engine.graph()
    }

    pub fn owner(&self) -> ProcessorId {
        self.owner
    }

    /// The statement calling the running instruction; `NeuronId(0)`, which
    /// is never allocated, before the first call.
    pub fn current(&self) -> NeuronId {
        self.current
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.depth()
    }

    /// Appends a line to the processor's output.
    pub fn emit(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!(processor = %self.owner, %line, "output");
        self.output.push(line);
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub(crate) fn trace(&self) -> Option<&[TraceEntry]> {
        self.trace.as_deref()
    }

    /// Reports a non-fatal problem with `neuron` to the engine's sink.
    pub fn report(
        &self,
        kind: DiagnosticKind,
        source: &'static str,
        neuron: NeuronId,
        message: impl Into<String>,
    ) {
        self.engine.sink().report(Diagnostic {
            kind,
            source,
            neuron,
            rendered: self.graph().describe(neuron),
            message: message.into(),
        });
    }

    /// Acquires a batch of locks for this processor, waiting as configured.
    pub fn lock(&self, list: &LockRequestList) -> Result<HeldLocks, RuntimeError> {
        Ok(self.engine.locks().acquire(self.owner, list)?)
    }

    pub(crate) fn work(&self, id: NeuronId) -> Result<Arc<WorkData>, RuntimeError> {
        work::fetch(self.engine, id)
    }

    // -----------------------------------------------------------------------
    // Result evaluation
    // -----------------------------------------------------------------------

    /// Evaluates a result expression into a fresh list on the argument
    /// stack and pops it. The stack depth is restored on every path.
    pub fn solve(&mut self, id: NeuronId) -> Result<Vec<Value>, RuntimeError> {
        self.stack.push();
        let result = self.get_value(id);
        let values = self.stack.pop();
        result.map(|()| values)
    }

    /// The values an operand stands for: a result expression's results, or
    /// the neuron itself.
    pub fn operand_values(&mut self, id: NeuronId) -> Result<Vec<Value>, RuntimeError> {
        let neuron = self.graph().by_id(id)?;
        if neuron.is_result_expression() {
            self.solve(id)
        } else {
            Ok(vec![Value::Neuron(id)])
        }
    }

    /// Evaluates an argument list. Result expressions are replaced in place
    /// by their results; other neurons are passed as they are.
    pub fn resolve_arguments(&mut self, raw: &[NeuronId]) -> Result<Vec<Value>, RuntimeError> {
        let mut args = Vec::with_capacity(raw.len());
        for &id in raw {
            args.extend(self.operand_values(id)?);
        }
        Ok(args)
    }

    /// A condition holds when it evaluates to a non-empty list of True.
    pub fn test_condition(&mut self, id: NeuronId) -> Result<bool, RuntimeError> {
        if Known::True.is(id) {
            return Ok(true);
        }
        if Known::False.is(id) {
            return Ok(false);
        }
        let neuron = self.graph().by_id(id)?;
        if neuron.expression_kind() == Some(ExpressionKind::Bool) {
            return boolean::evaluate(self, id);
        }
        let values = self.operand_values(id)?;
        Ok(!values.is_empty() && values.iter().all(Value::is_true))
    }

    /// Writes the results of `id` into the top list of the stack.
    fn get_value(&mut self, id: NeuronId) -> Result<(), RuntimeError> {
        let neuron = self.graph().by_id(id)?;
        match neuron.data() {
            NeuronData::Variable { .. } => {
                let values = neuron.values().unwrap_or_default();
                self.stack.extend_top(values);
            }
            NeuronData::Expression(ExpressionKind::Bool) => {
                let flag = boolean::evaluate(self, id)?;
                self.stack.extend_top([Value::truth(flag)]);
            }
            NeuronData::Expression(ExpressionKind::ResultStatement) => {
                let values = statement::get_values(self, id)?;
                self.stack.extend_top(values);
            }
            NeuronData::Expression(ExpressionKind::ByRef) => {
                if let Some(argument) = by_ref::argument(self, id)? {
                    self.stack.extend_top([Value::Neuron(argument)]);
                }
            }
            _ => self.report(
                DiagnosticKind::Structural,
                "GetValue",
                id,
                "neuron does not produce a result",
            ),
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Statement execution
    // -----------------------------------------------------------------------

    /// Runs one statement and tells the enclosing frame how to continue.
    pub(crate) fn execute(&mut self, id: NeuronId) -> Result<Step, RuntimeError> {
        let neuron = self.graph().by_id(id)?;
        let Some(kind) = neuron.expression_kind() else {
            self.report(
                DiagnosticKind::Structural,
                "Execute",
                id,
                "neuron is not executable",
            );
            return Ok(Step::Done);
        };
        if let Some(trace) = self.trace.as_mut() {
            trace.push(TraceEntry {
                neuron: id,
                kind,
                depth: self.depth,
            });
        }
        match kind {
            ExpressionKind::Assignment => assignment::execute(self, id).map(|()| Step::Done),
            ExpressionKind::Bool => boolean::evaluate(self, id).map(|_| Step::Done),
            ExpressionKind::Conditional => conditional::start(self, id),
            ExpressionKind::Block => block::start(self, id),
            ExpressionKind::Lock => block::start_locked(self, id),
            ExpressionKind::Statement | ExpressionKind::ResultStatement => {
                statement::execute(self, id)
            }
            ExpressionKind::ByRef => Ok(Step::Done),
            ExpressionKind::ConditionalPart => {
                self.report(
                    DiagnosticKind::Invariant,
                    "Execute",
                    id,
                    "conditional part executed outside its conditional statement",
                );
                Ok(Step::Done)
            }
        }
    }

    /// Drops every open list after an aborted run.
    pub(crate) fn reset(&mut self) {
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::testing::{engine, engine_with_sink};

    #[test]
    fn solve_variable_and_literal_operands() {
        let engine = engine();
        let b = GraphBuilder::new(engine.graph());
        let var = b.variable();
        let five = b.int(5);
        engine
            .graph()
            .set_values(var, vec![Value::Int(1), Value::Int(2)])
            .unwrap();

        let mut ctx = ExecContext::new(&engine, ProcessorId::new());
        assert_eq!(ctx.solve(var).unwrap(), vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(ctx.operand_values(five).unwrap(), vec![Value::Neuron(five)]);
        assert_eq!(ctx.stack_depth(), 0);
    }

    #[test]
    fn arguments_are_replaced_in_place() {
        let engine = engine();
        let b = GraphBuilder::new(engine.graph());
        let var = b.variable();
        let text = b.text("x");
        engine
            .graph()
            .set_values(var, vec![Value::Int(1), Value::Int(2)])
            .unwrap();

        let mut ctx = ExecContext::new(&engine, ProcessorId::new());
        let args = ctx.resolve_arguments(&[text, var, text]).unwrap();
        assert_eq!(
            args,
            vec![
                Value::Neuron(text),
                Value::Int(1),
                Value::Int(2),
                Value::Neuron(text)
            ]
        );
    }

    #[test]
    fn solving_a_non_result_is_reported_and_empty() {
        let (engine, sink) = engine_with_sink();
        let b = GraphBuilder::new(engine.graph());
        let var = b.variable();
        let val = b.int(1);
        let assign = b.assignment(var, val).unwrap();

        let mut ctx = ExecContext::new(&engine, ProcessorId::new());
        assert!(ctx.solve(assign).unwrap().is_empty());
        assert_eq!(ctx.stack_depth(), 0);
        let entries = sink.take();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source, "GetValue");
    }

    #[test]
    fn stack_is_balanced_when_solve_fails() {
        let engine = engine();
        let mut ctx = ExecContext::new(&engine, ProcessorId::new());
        assert!(ctx.solve(NeuronId(999_999)).is_err());
        assert_eq!(ctx.stack_depth(), 0);
    }

    #[test]
    fn conditions() {
        let engine = engine();
        let b = GraphBuilder::new(engine.graph());
        let var = b.variable();
        let mut ctx = ExecContext::new(&engine, ProcessorId::new());

        assert!(ctx.test_condition(Known::True.id()).unwrap());
        assert!(!ctx.test_condition(var).unwrap());
        engine
            .graph()
            .set_values(var, vec![Value::truth(true), Value::truth(true)])
            .unwrap();
        assert!(ctx.test_condition(var).unwrap());
        engine
            .graph()
            .set_values(var, vec![Value::truth(true), Value::Int(1)])
            .unwrap();
        assert!(!ctx.test_condition(var).unwrap());
    }
}
