//! Statement and ResultStatement: calls of an instruction.
//!
//! The arguments are the children of the `Arguments` cluster. The generic
//! call evaluates result-expression arguments in place; instructions with a
//! fast path receive the raw argument neurons instead.

use std::sync::Arc;

use synapse_core::{NeuronId, Value};

use super::unexpected_work;
use crate::context::ExecContext;
use crate::diagnostics::DiagnosticKind;
use crate::error::RuntimeError;
use crate::frame::Step;
use crate::instruction::{Flow, Instruction};
use crate::work::WorkData;

const SOURCE: &str = "Statement";

struct Call {
    instruction: Arc<dyn Instruction>,
    args: Vec<NeuronId>,
}

/// Looks up the instruction and raw arguments; `None` after reporting a
/// malformed call.
fn call(ctx: &ExecContext<'_>, id: NeuronId) -> Result<Option<Call>, RuntimeError> {
    let work = ctx.work(id)?;
    let WorkData::Statement {
        instruction,
        arguments,
    } = *work
    else {
        return Err(unexpected_work(id, "a statement"));
    };
    let Some(instruction_id) = instruction else {
        ctx.report(DiagnosticKind::Structural, SOURCE, id, "missing instruction");
        return Ok(None);
    };
    let Some(instruction) = ctx.engine().instructions().get(instruction_id).cloned() else {
        ctx.report(
            DiagnosticKind::Structural,
            SOURCE,
            id,
            format!("{instruction_id} is not a registered instruction"),
        );
        return Ok(None);
    };
    let args = match arguments {
        None => Vec::new(),
        Some(cluster) => match ctx.graph().by_id(cluster)?.children() {
            Some(children) => children,
            None => {
                ctx.report(
                    DiagnosticKind::Structural,
                    SOURCE,
                    id,
                    "arguments are not a cluster",
                );
                Vec::new()
            }
        },
    };
    Ok(Some(Call { instruction, args }))
}

pub(crate) fn execute(ctx: &mut ExecContext<'_>, id: NeuronId) -> Result<Step, RuntimeError> {
    let Some(Call { instruction, args }) = call(ctx, id)? else {
        return Ok(Step::Done);
    };
    if instruction.is_terminator() {
        tracing::debug!(statement = %id, instruction = instruction.name(), "terminator reached");
        return Ok(Step::Exit(id));
    }
    ctx.current = id;
    let flow = match instruction.as_direct() {
        Some(direct) => direct.execute_direct(ctx, &args)?,
        None => {
            let values = ctx.resolve_arguments(&args)?;
            ctx.current = id;
            instruction.execute(ctx, &values)?
        }
    };
    Ok(match flow {
        Flow::Next => Step::Done,
        Flow::Break => Step::Break,
    })
}

pub(crate) fn get_values(ctx: &mut ExecContext<'_>, id: NeuronId) -> Result<Vec<Value>, RuntimeError> {
    let Some(Call { instruction, args }) = call(ctx, id)? else {
        return Ok(Vec::new());
    };
    let values = ctx.resolve_arguments(&args)?;
    let mut out = Vec::new();
    ctx.current = id;
    instruction.get_values(ctx, &values, &mut out)?;
    Ok(out)
}

pub(crate) fn get_bool(ctx: &mut ExecContext<'_>, id: NeuronId) -> Result<bool, RuntimeError> {
    let Some(Call { instruction, args }) = call(ctx, id)? else {
        return Ok(false);
    };
    if let Some(fast) = instruction.as_bool() {
        ctx.current = id;
        return fast.get_bool(ctx, &args);
    }
    let values = ctx.solve(id)?;
    Ok(!values.is_empty() && values.iter().all(Value::is_true))
}

pub(crate) fn get_int(ctx: &mut ExecContext<'_>, id: NeuronId) -> Result<i64, RuntimeError> {
    let Some(Call { instruction, args }) = call(ctx, id)? else {
        return Ok(0);
    };
    if let Some(fast) = instruction.as_int() {
        ctx.current = id;
        return fast.get_int(ctx, &args);
    }
    let first = ctx.solve(id)?.into_iter().next();
    match first.and_then(|v| v.as_int(ctx.graph())) {
        Some(value) => Ok(value),
        None => {
            ctx.report(DiagnosticKind::Type, SOURCE, id, "result is not a number");
            Ok(0)
        }
    }
}

pub(crate) fn get_double(ctx: &mut ExecContext<'_>, id: NeuronId) -> Result<f64, RuntimeError> {
    let Some(Call { instruction, args }) = call(ctx, id)? else {
        return Ok(0.0);
    };
    if let Some(fast) = instruction.as_double() {
        ctx.current = id;
        return fast.get_double(ctx, &args);
    }
    let first = ctx.solve(id)?.into_iter().next();
    match first.and_then(|v| v.as_double(ctx.graph())) {
        Some(value) => Ok(value),
        None => {
            ctx.report(DiagnosticKind::Type, SOURCE, id, "result is not a number");
            Ok(0.0)
        }
    }
}
