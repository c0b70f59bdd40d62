//! ByRefExpression: yields its argument without evaluating it.

use synapse_core::NeuronId;

use super::unexpected_work;
use crate::context::ExecContext;
use crate::diagnostics::DiagnosticKind;
use crate::error::RuntimeError;
use crate::work::WorkData;

pub(crate) fn argument(
    ctx: &mut ExecContext<'_>,
    id: NeuronId,
) -> Result<Option<NeuronId>, RuntimeError> {
    let work = ctx.work(id)?;
    let WorkData::ByRef { argument } = *work else {
        return Err(unexpected_work(id, "a by-ref expression"));
    };
    if argument.is_none() {
        ctx.report(
            DiagnosticKind::Structural,
            "ByRefExpression",
            id,
            "missing argument",
        );
    }
    Ok(argument)
}
