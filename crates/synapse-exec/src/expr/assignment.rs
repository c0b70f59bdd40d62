//! Assignment: `LeftPart := RightPart`.
//!
//! The left part is followed through result expressions until it reaches a
//! storage target: a variable, or an int, double or text neuron. The first
//! variable found is the target; it is never evaluated further. The right
//! part is evaluated and copied into the target according to its kind.

use synapse_core::{LockRequestList, LockLevel, NeuronData, NeuronId, Value};

use super::unexpected_work;
use crate::context::ExecContext;
use crate::diagnostics::DiagnosticKind;
use crate::error::RuntimeError;
use crate::work::WorkData;

const SOURCE: &str = "Assignment";

/// Result expressions followed on the left side before giving up.
const MAX_TARGET_CHAIN: usize = 32;

pub(crate) fn execute(ctx: &mut ExecContext<'_>, id: NeuronId) -> Result<(), RuntimeError> {
    let work = ctx.work(id)?;
    let WorkData::Assignment { left, right } = *work else {
        return Err(unexpected_work(id, "an assignment"));
    };
    let (Some(left), Some(right)) = (left, right) else {
        ctx.report(
            DiagnosticKind::Structural,
            SOURCE,
            id,
            "missing left or right part",
        );
        return Ok(());
    };
    let Some(target) = resolve_target(ctx, id, left)? else {
        return Ok(());
    };
    let graph = ctx.graph();
    let target_neuron = graph.by_id(target)?;

    match target_neuron.data() {
        NeuronData::Variable { by_ref, .. } => {
            let values = if *by_ref && graph.get(right).is_some_and(|n| n.is_variable()) {
                vec![Value::Neuron(right)]
            } else {
                ctx.operand_values(right)?
            };
            graph.set_values(target, values)?;
        }
        NeuronData::Text(_) => {
            let first = ctx.operand_values(right)?.into_iter().next();
            let text = match first.and_then(|v| v.as_text(graph)) {
                Some(text) => text,
                None => {
                    ctx.report(DiagnosticKind::Type, SOURCE, id, "right part is not a text");
                    String::new()
                }
            };
            let _guard = lock_value(ctx, target)?;
            graph.set_text(target, text)?;
        }
        NeuronData::Int(_) => {
            let first = ctx.operand_values(right)?.into_iter().next();
            let value = match first.and_then(|v| v.as_int(graph)) {
                Some(value) => value,
                None => {
                    ctx.report(DiagnosticKind::Type, SOURCE, id, "right part is not a number");
                    0
                }
            };
            let _guard = lock_value(ctx, target)?;
            graph.set_int(target, value)?;
        }
        NeuronData::Double(_) => {
            let first = ctx.operand_values(right)?.into_iter().next();
            let value = match first.and_then(|v| v.as_double(graph)) {
                Some(value) => value,
                None => {
                    ctx.report(DiagnosticKind::Type, SOURCE, id, "right part is not a number");
                    0.0
                }
            };
            let _guard = lock_value(ctx, target)?;
            graph.set_double(target, value)?;
        }
        _ => ctx.report(
            DiagnosticKind::Structural,
            SOURCE,
            id,
            format!("cannot assign to {target_neuron}"),
        ),
    }
    Ok(())
}

/// Follows the left part to the neuron that receives the value.
fn resolve_target(
    ctx: &mut ExecContext<'_>,
    id: NeuronId,
    left: NeuronId,
) -> Result<Option<NeuronId>, RuntimeError> {
    let mut target = left;
    for _ in 0..MAX_TARGET_CHAIN {
        let neuron = ctx.graph().by_id(target)?;
        let is_storage = matches!(
            neuron.data(),
            NeuronData::Variable { .. }
                | NeuronData::Int(_)
                | NeuronData::Double(_)
                | NeuronData::Text(_)
        );
        if is_storage || !neuron.is_result_expression() {
            return Ok(Some(target));
        }
        match ctx.solve(target)?.first().and_then(Value::neuron) {
            Some(next) => target = next,
            None => {
                ctx.report(
                    DiagnosticKind::Structural,
                    SOURCE,
                    id,
                    "left part does not resolve to a target",
                );
                return Ok(None);
            }
        }
    }
    ctx.report(
        DiagnosticKind::Structural,
        SOURCE,
        id,
        "left part resolves through too many expressions",
    );
    Ok(None)
}

fn lock_value(
    ctx: &ExecContext<'_>,
    target: NeuronId,
) -> Result<synapse_core::HeldLocks, RuntimeError> {
    let mut list = LockRequestList::new();
    list.push(target, LockLevel::Value);
    ctx.lock(&list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::testing::{engine, engine_with_sink};
    use synapse_core::{Known, ProcessorId};

    fn run(engine: &crate::Engine, id: NeuronId) {
        let mut ctx = ExecContext::new(engine, ProcessorId::new());
        execute(&mut ctx, id).unwrap();
        assert_eq!(ctx.stack_depth(), 0);
    }

    #[test]
    fn variable_receives_int_neuron() {
        let engine = engine();
        let b = GraphBuilder::new(engine.graph());
        let v = b.variable();
        let answer = b.int(42);
        let assign = b.assignment(v, answer).unwrap();
        run(&engine, assign);

        let stored = engine.graph().get(v).unwrap().values().unwrap();
        assert_eq!(stored, vec![Value::Neuron(answer)]);
        assert_eq!(stored[0].as_int(engine.graph()), Some(42));
    }

    #[test]
    fn variable_copies_other_variable_values() {
        let engine = engine();
        let b = GraphBuilder::new(engine.graph());
        let source = b.variable();
        let copy = b.variable();
        let reference = b.variable_by_ref();
        engine
            .graph()
            .set_values(source, vec![Value::Int(1), Value::Int(2)])
            .unwrap();
        run(&engine, b.assignment(copy, source).unwrap());
        run(&engine, b.assignment(reference, source).unwrap());

        let graph = engine.graph();
        assert_eq!(
            graph.get(copy).unwrap().values().unwrap(),
            vec![Value::Int(1), Value::Int(2)]
        );
        assert_eq!(
            graph.get(reference).unwrap().values().unwrap(),
            vec![Value::Neuron(source)]
        );
    }

    #[test]
    fn primitive_round_trips() {
        let engine = engine();
        let b = GraphBuilder::new(engine.graph());
        let text = b.text("");
        let int = b.int(0);
        let double = b.double(0.0);
        let text_src = b.text("héllo wörld");
        let int_src = b.int(i64::MIN);
        let double_src = b.double(0.1 + 0.2);
        run(&engine, b.assignment(text, text_src).unwrap());
        run(&engine, b.assignment(int, int_src).unwrap());
        run(&engine, b.assignment(double, double_src).unwrap());

        let graph = engine.graph();
        assert_eq!(graph.get(text).unwrap().text().as_deref(), Some("héllo wörld"));
        assert_eq!(graph.get(int).unwrap().int(), Some(i64::MIN));
        assert_eq!(graph.get(double).unwrap().double(), Some(0.1 + 0.2));
        assert!(engine.locks().status().is_empty());
    }

    #[test]
    fn type_errors_substitute_defaults() {
        let (engine, sink) = engine_with_sink();
        let b = GraphBuilder::new(engine.graph());
        let text = b.text("old");
        let int = b.int(7);
        let number = b.int(3);
        let word = b.text("x");
        run(&engine, b.assignment(text, number).unwrap());
        run(&engine, b.assignment(int, word).unwrap());

        let graph = engine.graph();
        assert_eq!(graph.get(text).unwrap().text().as_deref(), Some(""));
        assert_eq!(graph.get(int).unwrap().int(), Some(0));
        let entries = sink.take();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|d| d.kind == DiagnosticKind::Type));
    }

    #[test]
    fn left_part_is_followed_through_result_expressions() {
        let engine = engine();
        let b = GraphBuilder::new(engine.graph());
        let counter = b.int(0);
        let pointer = b.variable();
        engine
            .graph()
            .set_values(pointer, vec![Value::Neuron(counter)])
            .unwrap();
        // A by-ref expression yields the variable itself, which is the target.
        let by_ref = b.by_ref(pointer).unwrap();
        let five = b.int(5);
        run(&engine, b.assignment(by_ref, five).unwrap());
        assert_eq!(
            engine.graph().get(pointer).unwrap().values().unwrap(),
            vec![Value::Neuron(five)]
        );
        assert_eq!(engine.graph().get(counter).unwrap().int(), Some(0));
    }

    #[test]
    fn unsupported_target_is_a_reported_no_op() {
        let (engine, sink) = engine_with_sink();
        let b = GraphBuilder::new(engine.graph());
        let five = b.int(5);
        let assign = b.assignment(Known::True.id(), five).unwrap();
        run(&engine, assign);
        assert_eq!(sink.take()[0].kind, DiagnosticKind::Structural);
    }
}
