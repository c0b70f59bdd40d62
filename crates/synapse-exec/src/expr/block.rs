//! ExpressionsBlock and LockExpression.
//!
//! Both push a block frame over their `Statements` cluster. A
//! LockExpression first resolves the neurons and link endpoints it guards,
//! acquires them as one batch, and hands the granted locks to the frame;
//! they are released when the frame is dropped.

use synapse_core::{HeldLocks, LockRequestList, NeuronId, Value};

use super::unexpected_work;
use crate::context::ExecContext;
use crate::diagnostics::DiagnosticKind;
use crate::error::RuntimeError;
use crate::frame::{BlockFrame, CallFrame, Step};
use crate::work::WorkData;

pub(crate) fn start(ctx: &mut ExecContext<'_>, id: NeuronId) -> Result<Step, RuntimeError> {
    let work = ctx.work(id)?;
    let WorkData::Block { statements } = *work else {
        return Err(unexpected_work(id, "a block"));
    };
    let Some(statements) = statement_list(ctx, "ExpressionsBlock", id, statements)? else {
        return Ok(Step::Done);
    };
    Ok(Step::Push(CallFrame::Block(BlockFrame::new(id, statements, None))))
}

pub(crate) fn start_locked(ctx: &mut ExecContext<'_>, id: NeuronId) -> Result<Step, RuntimeError> {
    let work = ctx.work(id)?;
    let WorkData::Lock {
        statements,
        neurons,
        links,
    } = *work
    else {
        return Err(unexpected_work(id, "a lock expression"));
    };
    let Some(statements) = statement_list(ctx, "LockExpression", id, statements)? else {
        return Ok(Step::Done);
    };
    let locks = acquire(ctx, id, neurons, links)?;
    Ok(Step::Push(CallFrame::Block(BlockFrame::new(
        id, statements, locks,
    ))))
}

/// Resolves the lock targets and acquires them together.
fn acquire(
    ctx: &mut ExecContext<'_>,
    id: NeuronId,
    neurons: Option<NeuronId>,
    links: Option<NeuronId>,
) -> Result<Option<HeldLocks>, RuntimeError> {
    let mut list = LockRequestList::new();
    for neuron in targets(ctx, id, neurons)? {
        list.lock_neuron(neuron);
    }
    let endpoints = targets(ctx, id, links)?;
    if endpoints.len() % 2 != 0 {
        ctx.report(
            DiagnosticKind::Structural,
            "LockExpression",
            id,
            "link endpoints are not in (from, to) pairs",
        );
    }
    for (position, neuron) in endpoints.into_iter().enumerate() {
        list.lock_link_endpoint(position, neuron);
    }
    if list.is_empty() {
        return Ok(None);
    }
    let held = ctx.lock(&list)?;
    tracing::debug!(
        processor = %ctx.owner(),
        expression = %id,
        count = held.requests().len(),
        "lock expression entered"
    );
    Ok(Some(held))
}

/// The neurons listed in a lock cluster, with result expressions evaluated.
fn targets(
    ctx: &mut ExecContext<'_>,
    id: NeuronId,
    cluster: Option<NeuronId>,
) -> Result<Vec<NeuronId>, RuntimeError> {
    let Some(cluster) = cluster else {
        return Ok(Vec::new());
    };
    let children = ctx.graph().by_id(cluster)?.children().unwrap_or_default();
    let mut result = Vec::with_capacity(children.len());
    for value in ctx.resolve_arguments(&children)? {
        match value {
            Value::Neuron(neuron) => result.push(neuron),
            other => ctx.report(
                DiagnosticKind::Type,
                "LockExpression",
                id,
                format!("cannot lock the value {other}"),
            ),
        }
    }
    Ok(result)
}

/// Children of a `Statements` cluster; `None` after reporting a missing or
/// malformed list.
pub(crate) fn statement_list(
    ctx: &ExecContext<'_>,
    source: &'static str,
    id: NeuronId,
    statements: Option<NeuronId>,
) -> Result<Option<Vec<NeuronId>>, RuntimeError> {
    let Some(cluster) = statements else {
        ctx.report(DiagnosticKind::Structural, source, id, "missing statements");
        return Ok(None);
    };
    match ctx.graph().by_id(cluster)?.children() {
        Some(children) => Ok(Some(children)),
        None => {
            ctx.report(
                DiagnosticKind::Structural,
                source,
                id,
                "statements are not a cluster",
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::testing::engine;
    use synapse_core::{LockLevel, ProcessorId};

    #[test]
    fn lock_expression_requests_neurons_and_link_endpoints() {
        let engine = engine();
        let b = GraphBuilder::new(engine.graph());
        let counter = b.int(0);
        let from = b.neuron();
        let to = b.neuron();
        let lock = b.lock(vec![counter], vec![from, to], vec![]).unwrap();

        let mut ctx = ExecContext::new(&engine, ProcessorId::new());
        let Step::Push(frame) = start_locked(&mut ctx, lock).unwrap() else {
            panic!("expected a block frame");
        };
        let mut status: Vec<_> = engine
            .locks()
            .status()
            .into_iter()
            .map(|e| (e.neuron, e.level))
            .collect();
        status.sort();
        assert_eq!(
            status,
            vec![
                (counter, LockLevel::All),
                (from, LockLevel::LinksOut),
                (to, LockLevel::LinksIn)
            ]
        );
        drop(frame);
        assert!(engine.locks().status().is_empty());
    }

    #[test]
    fn lock_targets_may_be_result_expressions() {
        let engine = engine();
        let b = GraphBuilder::new(engine.graph());
        let counter = b.int(0);
        let holder = b.variable();
        engine
            .graph()
            .set_values(holder, vec![Value::Neuron(counter)])
            .unwrap();
        let lock = b.lock(vec![holder], vec![], vec![]).unwrap();

        let mut ctx = ExecContext::new(&engine, ProcessorId::new());
        let step = start_locked(&mut ctx, lock).unwrap();
        assert_eq!(engine.locks().status()[0].neuron, counter);
        drop(step);
    }
}
