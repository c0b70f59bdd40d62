//! ConditionalStatement: if/case/loop constructs.
//!
//! The statement itself never loops. It resolves its clauses, validates them
//! and pushes the frame for its loop style; the frame owns all iteration
//! state.

use std::sync::Arc;

use synapse_core::{ExpressionKind, Known, NeuronId, Value};

use super::block::statement_list;
use super::unexpected_work;
use crate::context::ExecContext;
use crate::diagnostics::DiagnosticKind;
use crate::error::RuntimeError;
use crate::frame::{
    CallFrame, CaseFrame, Clause, ForEachFrame, IfFrame, LoopFrame, QueryFrame, Step, UntilFrame,
};
use crate::source::{ChildRows, ClusterRows, Direction, LinkRows, RowSource};
use crate::work::WorkData;

const SOURCE: &str = "ConditionalStatement";

pub(crate) fn start(ctx: &mut ExecContext<'_>, id: NeuronId) -> Result<Step, RuntimeError> {
    let work = ctx.work(id)?;
    let WorkData::Conditional(work) = &*work else {
        return Err(unexpected_work(id, "a conditional statement"));
    };
    let style = match work.style {
        None => Known::Normal,
        Some(style) => match Known::from_id(style).filter(|k| k.is_loop_style()) {
            Some(style) => style,
            None => {
                ctx.report(DiagnosticKind::Invariant, SOURCE, id, "unknown loop style");
                return Ok(Step::Done);
            }
        },
    };
    let Some(conditions) = work.conditions else {
        ctx.report(DiagnosticKind::Structural, SOURCE, id, "missing conditions");
        return Ok(Step::Done);
    };
    let clauses = clauses(ctx, id, conditions)?;
    if ctx.engine().config().check_conditions {
        if let Err(message) = check_conditions(style, &clauses) {
            ctx.report(DiagnosticKind::Invariant, SOURCE, id, message);
            return Ok(Step::Done);
        }
    }

    let frame = match style {
        Known::Case | Known::CaseLooped => {
            let Some(item) = work.case_item else {
                ctx.report(DiagnosticKind::Structural, SOURCE, id, "missing case item");
                return Ok(Step::Done);
            };
            CallFrame::Case(CaseFrame::new(id, item, clauses, style == Known::CaseLooped))
        }
        Known::Looped => CallFrame::Loop(LoopFrame::new(id, clauses)),
        Known::Until => {
            let Some(clause) = clauses.into_iter().next() else {
                return Ok(Step::Done);
            };
            CallFrame::Until(UntilFrame::new(id, clause))
        }
        Known::ForEach => {
            let Some((variable, clause)) = loop_parts(ctx, id, work.loop_item, clauses)? else {
                return Ok(Step::Done);
            };
            let items = match clause.condition {
                Some(condition) => for_each_items(ctx, condition)?,
                None => Vec::new(),
            };
            CallFrame::ForEach(ForEachFrame::new(id, variable, items, clause))
        }
        Known::QueryLoop
        | Known::QueryLoopIn
        | Known::QueryLoopOut
        | Known::QueryLoopClusters
        | Known::QueryLoopChildren => {
            let Some((variable, clause)) = loop_parts(ctx, id, work.loop_item, clauses)? else {
                return Ok(Step::Done);
            };
            let Some(source) = query_source(ctx, id, style, clause.condition)? else {
                return Ok(Step::Done);
            };
            let cursor = source.enumerate(ctx.graph());
            CallFrame::Query(QueryFrame::new(id, variable, source, cursor, clause))
        }
        _ => CallFrame::If(IfFrame::new(id, clauses)),
    };
    Ok(Step::Push(frame))
}

/// Resolves the parts listed in the `Conditions` cluster.
fn clauses(
    ctx: &ExecContext<'_>,
    id: NeuronId,
    conditions: NeuronId,
) -> Result<Vec<Clause>, RuntimeError> {
    let graph = ctx.graph();
    let Some(parts) = graph.by_id(conditions)?.children() else {
        ctx.report(DiagnosticKind::Structural, SOURCE, id, "conditions are not a cluster");
        return Ok(Vec::new());
    };
    let mut clauses = Vec::with_capacity(parts.len());
    for part in parts {
        if graph.by_id(part)?.expression_kind() != Some(ExpressionKind::ConditionalPart) {
            ctx.report(
                DiagnosticKind::Structural,
                SOURCE,
                id,
                format!("{} is not a conditional part", graph.describe(part)),
            );
            continue;
        }
        let work = ctx.work(part)?;
        let WorkData::Part {
            condition,
            statements,
        } = *work
        else {
            return Err(unexpected_work(part, "a conditional part"));
        };
        let statements =
            statement_list(ctx, "ConditionalExpression", part, statements)?.unwrap_or_default();
        clauses.push(Clause {
            part,
            condition,
            statements,
        });
    }
    Ok(clauses)
}

/// At most one clause may lack a condition and it must come last; loops
/// over a single body take exactly one clause.
pub fn check_conditions(style: Known, clauses: &[Clause]) -> Result<(), String> {
    let single = matches!(
        style,
        Known::ForEach
            | Known::Until
            | Known::QueryLoop
            | Known::QueryLoopIn
            | Known::QueryLoopOut
            | Known::QueryLoopClusters
            | Known::QueryLoopChildren
    );
    if single && clauses.len() != 1 {
        return Err(format!(
            "{} loops take exactly one condition, found {}",
            style.name(),
            clauses.len()
        ));
    }
    let empty: Vec<usize> = clauses
        .iter()
        .enumerate()
        .filter(|(_, c)| c.condition.is_none())
        .map(|(i, _)| i)
        .collect();
    match empty.as_slice() {
        [] => Ok(()),
        [last] if *last + 1 == clauses.len() => Ok(()),
        [_] => Err("the clause without condition must be last".into()),
        _ => Err(format!("{} clauses without condition", empty.len())),
    }
}

/// The loop variable and the single clause of a ForEach or query loop.
fn loop_parts(
    ctx: &ExecContext<'_>,
    id: NeuronId,
    loop_item: Option<NeuronId>,
    clauses: Vec<Clause>,
) -> Result<Option<(NeuronId, Clause)>, RuntimeError> {
    let Some(variable) = loop_item else {
        ctx.report(DiagnosticKind::Structural, SOURCE, id, "missing loop item");
        return Ok(None);
    };
    if !ctx.graph().by_id(variable)?.is_variable() {
        ctx.report(
            DiagnosticKind::Structural,
            SOURCE,
            id,
            "loop item is not a variable",
        );
        return Ok(None);
    }
    Ok(clauses.into_iter().next().map(|clause| (variable, clause)))
}

/// The list a ForEach iterates: a cluster literal's children, otherwise the
/// condition's values.
fn for_each_items(ctx: &mut ExecContext<'_>, condition: NeuronId) -> Result<Vec<Value>, RuntimeError> {
    let neuron = ctx.graph().by_id(condition)?;
    if let Some(children) = neuron.children() {
        return Ok(children.into_iter().map(Value::Neuron).collect());
    }
    ctx.operand_values(condition)
}

fn query_source(
    ctx: &mut ExecContext<'_>,
    id: NeuronId,
    style: Known,
    condition: Option<NeuronId>,
) -> Result<Option<Arc<dyn RowSource>>, RuntimeError> {
    let Some(condition) = condition else {
        ctx.report(DiagnosticKind::Structural, SOURCE, id, "query loop without a source");
        return Ok(None);
    };
    let Some(subject) = ctx
        .operand_values(condition)?
        .into_iter()
        .find_map(|v| v.neuron())
    else {
        ctx.report(
            DiagnosticKind::Structural,
            SOURCE,
            id,
            "query source does not evaluate to a neuron",
        );
        return Ok(None);
    };
    let source: Arc<dyn RowSource> = match style {
        Known::QueryLoopIn => Arc::new(LinkRows {
            neuron: subject,
            direction: Direction::In,
        }),
        Known::QueryLoopOut => Arc::new(LinkRows {
            neuron: subject,
            direction: Direction::Out,
        }),
        Known::QueryLoopClusters => Arc::new(ClusterRows { neuron: subject }),
        Known::QueryLoopChildren => Arc::new(ChildRows { cluster: subject }),
        _ => match ctx.engine().queries().get(subject) {
            Some(source) => source,
            None => {
                ctx.report(
                    DiagnosticKind::Structural,
                    SOURCE,
                    id,
                    format!("{subject} is not a registered query"),
                );
                return Ok(None);
            }
        },
    };
    Ok(Some(source))
}
