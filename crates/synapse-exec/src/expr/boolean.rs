//! BoolExpression: `LeftPart Operator RightPart`.
//!
//! The strategy picked at WorkData build time decides how the operands are
//! evaluated (see [`Strategy`]). The generic strategy solves both sides into
//! lists and compares them:
//!
//! | operator       | true when                                                    |
//! |----------------|--------------------------------------------------------------|
//! | `And`          | both lists are non-empty and hold only True                  |
//! | `Or`           | either list holds a True                                     |
//! | `Contains`     | right is non-empty and each right element is in left         |
//! | `NotContains`  | right is empty, or no right element is in left               |
//! | `Equal`        | same length, every positional pair equal                     |
//! | `Different`    | not `Equal`                                                  |
//! | comparisons    | any pair `(l, r)` satisfies the comparison                   |
//!
//! An empty left list makes every operator false, except `Different` with a
//! non-empty right list and the empty-right rules of the containment
//! operators, which are checked first.

use std::cmp::Ordering;

use synapse_core::{Known, NeuronGraph, NeuronId, Value};

use super::unexpected_work;
use crate::context::ExecContext;
use crate::diagnostics::DiagnosticKind;
use crate::error::RuntimeError;
use crate::fast_path::Strategy;
use crate::work::WorkData;

const SOURCE: &str = "BoolExpression";

pub(crate) fn evaluate(ctx: &mut ExecContext<'_>, id: NeuronId) -> Result<bool, RuntimeError> {
    let work = ctx.work(id)?;
    let WorkData::Bool(work) = &*work else {
        return Err(unexpected_work(id, "a bool expression"));
    };
    let Some(op) = work
        .operator
        .and_then(Known::from_id)
        .filter(|k| k.is_operator())
    else {
        ctx.report(DiagnosticKind::Invariant, SOURCE, id, "unknown operator");
        return Ok(false);
    };
    let (left, right) = match (work.left, work.right) {
        (Some(left), Some(right)) => (left, right),
        (left, right) => {
            let missing = if left.is_none() { "left" } else { "right" };
            ctx.report(
                DiagnosticKind::Structural,
                SOURCE,
                id,
                format!("missing {missing} part"),
            );
            // One side present and the other not counts as different.
            return Ok(op == Known::Different && (left.is_some() || right.is_some()));
        }
    };

    match work.strategy {
        Strategy::Bool => {
            let l = ctx.get_bool(left)?;
            let r = ctx.get_bool(right)?;
            Ok(match op {
                Known::And => l && r,
                Known::Or => l || r,
                Known::Equal => l == r,
                Known::Different => l != r,
                _ => false,
            })
        }
        Strategy::Int => {
            let l = ctx.get_int(left)?;
            let r = ctx.get_int(right)?;
            Ok(satisfies(op, Some(l.cmp(&r))))
        }
        Strategy::Double => {
            let l = ctx.get_double(left)?;
            let r = ctx.get_double(right)?;
            Ok(satisfies(op, l.partial_cmp(&r)))
        }
        Strategy::Generic => {
            let l = ctx.operand_values(left)?;
            let r = ctx.operand_values(right)?;
            Ok(compare_lists(ctx.graph(), op, &l, &r))
        }
    }
}

/// Applies a comparison operator to an ordering. Unordered operands only
/// satisfy `Different`.
fn satisfies(op: Known, ordering: Option<Ordering>) -> bool {
    match (op, ordering) {
        (Known::Different, None) => true,
        (_, None) => false,
        (Known::Equal, Some(o)) => o == Ordering::Equal,
        (Known::Different, Some(o)) => o != Ordering::Equal,
        (Known::Bigger, Some(o)) => o == Ordering::Greater,
        (Known::BiggerOrEqual, Some(o)) => o != Ordering::Less,
        (Known::Smaller, Some(o)) => o == Ordering::Less,
        (Known::SmallerOrEqual, Some(o)) => o != Ordering::Greater,
        _ => false,
    }
}

/// Same length and pairwise equal. Two empty lists are not equal.
pub fn lists_equal(graph: &NeuronGraph, left: &[Value], right: &[Value]) -> bool {
    !left.is_empty()
        && left.len() == right.len()
        && left.iter().zip(right).all(|(l, r)| l.equals(r, graph))
}

/// The generic list comparison.
pub fn compare_lists(graph: &NeuronGraph, op: Known, left: &[Value], right: &[Value]) -> bool {
    match op {
        Known::Contains if right.is_empty() => return false,
        Known::NotContains if right.is_empty() => return true,
        _ => {}
    }
    if left.is_empty() {
        return op == Known::Different && !right.is_empty();
    }
    let in_left = |r: &Value| left.iter().any(|l| l.equals(r, graph));
    match op {
        Known::And => {
            left.iter().all(Value::is_true)
                && !right.is_empty()
                && right.iter().all(Value::is_true)
        }
        Known::Or => left.iter().any(Value::is_true) || right.iter().any(Value::is_true),
        Known::Contains => right.iter().all(in_left),
        Known::NotContains => !right.iter().any(in_left),
        Known::Equal => lists_equal(graph, left, right),
        Known::Different => !lists_equal(graph, left, right),
        _ => left
            .iter()
            .any(|l| right.iter().any(|r| satisfies(op, l.compare(r, graph)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::testing::{engine, engine_with_sink};
    use synapse_core::ProcessorId;

    fn eval(engine: &crate::Engine, id: NeuronId) -> bool {
        let mut ctx = ExecContext::new(engine, ProcessorId::new());
        let result = evaluate(&mut ctx, id).unwrap();
        assert_eq!(ctx.stack_depth(), 0);
        result
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn numeric_fast_path() {
        let engine = engine();
        let b = GraphBuilder::new(engine.graph());
        let five = b.int(5);
        let three = b.int(3);
        let expr = b.boolean(five, Known::Bigger, three).unwrap();

        let work = crate::work::fetch(&engine, expr).unwrap();
        assert!(matches!(&*work, WorkData::Bool(w) if w.strategy == Strategy::Int));
        assert!(eval(&engine, expr));
    }

    #[test]
    fn cluster_equality() {
        let engine = engine();
        let b = GraphBuilder::new(engine.graph());
        let a = b.int(1);
        let c = b.text("c");
        let left = b.cluster(Known::Arguments, vec![a, c]);
        let right = b.cluster(Known::Arguments, vec![a, c]);
        let expr = b.boolean(left, Known::Equal, right).unwrap();
        assert!(eval(&engine, expr));
    }

    #[test]
    fn bool_fast_path() {
        let engine = engine();
        let b = GraphBuilder::new(engine.graph());
        let t = Known::True.id();
        let f = Known::False.id();
        let and = b.boolean(t, Known::And, f).unwrap();
        let or = b.boolean(t, Known::Or, f).unwrap();
        let nested = b.boolean(or, Known::Equal, t).unwrap();
        assert!(!eval(&engine, and));
        assert!(eval(&engine, or));
        assert!(eval(&engine, nested));
    }

    #[test]
    fn generic_list_rules() {
        let graph = NeuronGraph::new();
        let t = Value::truth(true);
        let f = Value::truth(false);

        assert!(compare_lists(&graph, Known::And, &[t.clone(), t.clone()], &[t.clone()]));
        assert!(!compare_lists(&graph, Known::And, &[t.clone(), f.clone()], &[t.clone()]));
        assert!(!compare_lists(&graph, Known::And, &[t.clone()], &[]));
        assert!(compare_lists(&graph, Known::Or, &[f.clone()], &[t.clone()]));
        assert!(!compare_lists(&graph, Known::Or, &[], &[t.clone()]));

        assert!(compare_lists(&graph, Known::Contains, &ints(&[1, 2, 3]), &ints(&[3, 1])));
        assert!(!compare_lists(&graph, Known::Contains, &ints(&[1, 2]), &ints(&[4])));
        assert!(!compare_lists(&graph, Known::Contains, &ints(&[1]), &[]));
        assert!(compare_lists(&graph, Known::NotContains, &ints(&[1]), &[]));
        assert!(compare_lists(&graph, Known::NotContains, &[], &[]));
        assert!(compare_lists(&graph, Known::NotContains, &ints(&[1, 2]), &ints(&[4])));

        assert!(compare_lists(&graph, Known::Equal, &ints(&[1, 2]), &[Value::Int(1), Value::Double(2.0)]));
        assert!(!compare_lists(&graph, Known::Equal, &ints(&[1, 2]), &ints(&[1])));
        assert!(compare_lists(&graph, Known::Different, &ints(&[1, 2]), &ints(&[2, 1])));

        assert!(compare_lists(&graph, Known::Bigger, &ints(&[1, 9]), &ints(&[5])));
        assert!(!compare_lists(&graph, Known::Bigger, &ints(&[1, 2]), &ints(&[5])));
        assert!(!compare_lists(&graph, Known::Bigger, &[Value::Text("a".into())], &ints(&[1])));
    }

    #[test]
    fn empty_left_special_cases() {
        let graph = NeuronGraph::new();
        let one = ints(&[1]);
        assert!(compare_lists(&graph, Known::Different, &[], &one));
        assert!(!compare_lists(&graph, Known::Different, &[], &[]));
        assert!(!compare_lists(&graph, Known::Equal, &[], &[]));
        assert!(!compare_lists(&graph, Known::Equal, &[], &one));
        assert!(!compare_lists(&graph, Known::Smaller, &[], &one));
    }

    #[test]
    fn missing_parts_are_reported() {
        let (engine, sink) = engine_with_sink();
        let b = GraphBuilder::new(engine.graph());
        let five = b.int(5);
        let equal = b.partial_boolean(Some(five), Known::Equal, None).unwrap();
        let different = b.partial_boolean(Some(five), Known::Different, None).unwrap();
        let empty = b.partial_boolean(None, Known::Different, None).unwrap();

        assert!(!eval(&engine, equal));
        assert!(eval(&engine, different));
        assert!(!eval(&engine, empty));
        assert_eq!(sink.len(), 3);
    }

    #[test]
    fn unknown_operator_is_false() {
        let (engine, sink) = engine_with_sink();
        let b = GraphBuilder::new(engine.graph());
        let five = b.int(5);
        // LoopItem is a meaning, not an operator.
        let expr = b.boolean(five, Known::LoopItem, five).unwrap();
        assert!(!eval(&engine, expr));
        assert_eq!(sink.take()[0].kind, DiagnosticKind::Invariant);
    }
}
