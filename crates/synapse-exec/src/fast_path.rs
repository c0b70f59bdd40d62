//! Typed shortcuts that bypass the argument stack.
//!
//! Some neurons can produce a bool, an int or a double directly: the True
//! and False literals, int and double neurons, BoolExpressions, and
//! ResultStatements whose instruction exposes a matching fast path. A
//! BoolExpression probes its operands when its WorkData is built and picks
//! a [`Strategy`]; the generic list comparison is the fallback and all
//! strategies agree on the result.
//!
//! Dispatching a fast path to a neuron that cannot serve it is a host error
//! ([`RuntimeError::InvalidDispatch`]).

use serde::Serialize;
use synapse_core::{ExpressionKind, Known, Neuron, NeuronData, NeuronId};

use crate::context::ExecContext;
use crate::engine::Engine;
use crate::error::RuntimeError;
use crate::expr::{boolean, statement};

/// Probing follows ResultStatement arguments this deep.
const MAX_PROBE_DEPTH: usize = 8;

/// Which direct results a neuron can produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub bool: bool,
    pub int: bool,
    pub double: bool,
}

impl Capabilities {
    const NONE: Capabilities = Capabilities {
        bool: false,
        int: false,
        double: false,
    };
    const BOOL: Capabilities = Capabilities {
        bool: true,
        ..Self::NONE
    };
}

/// How a BoolExpression evaluates its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
    /// Both sides produce bools directly.
    Bool,
    /// Both sides produce ints directly.
    Int,
    /// Both sides produce doubles directly.
    Double,
    /// Solve both sides into result lists and compare the lists.
    Generic,
}

impl Strategy {
    pub fn choose(
        engine: &Engine,
        left: Option<NeuronId>,
        operator: Option<NeuronId>,
        right: Option<NeuronId>,
    ) -> Strategy {
        let (Some(left), Some(op), Some(right)) =
            (left, operator.and_then(Known::from_id), right)
        else {
            return Strategy::Generic;
        };
        let l = capabilities(engine, left);
        let r = capabilities(engine, right);
        let logical = matches!(op, Known::And | Known::Or | Known::Equal | Known::Different);
        let numeric = matches!(
            op,
            Known::Equal
                | Known::Different
                | Known::Bigger
                | Known::BiggerOrEqual
                | Known::Smaller
                | Known::SmallerOrEqual
        );
        if logical && l.bool && r.bool {
            Strategy::Bool
        } else if numeric && l.int && r.int {
            Strategy::Int
        } else if numeric && l.double && r.double {
            Strategy::Double
        } else {
            Strategy::Generic
        }
    }
}

/// Cross-cutting capabilities of executable and value neurons.
pub trait FastPath {
    fn capabilities(&self, engine: &Engine) -> Capabilities;

    /// `true` for statements calling a terminator instruction.
    fn is_terminator(&self, engine: &Engine) -> bool;
}

impl FastPath for Neuron {
    fn capabilities(&self, engine: &Engine) -> Capabilities {
        probe(engine, self, 0)
    }

    fn is_terminator(&self, engine: &Engine) -> bool {
        matches!(
            self.expression_kind(),
            Some(ExpressionKind::Statement | ExpressionKind::ResultStatement)
        ) && self
            .first_out(Known::Instruction.id())
            .and_then(|id| engine.instructions().get(id))
            .is_some_and(|instruction| instruction.is_terminator())
    }
}

/// Capabilities of the neuron `id`; missing neurons have none.
pub fn capabilities(engine: &Engine, id: NeuronId) -> Capabilities {
    engine
        .graph()
        .get(id)
        .map(|neuron| neuron.capabilities(engine))
        .unwrap_or_default()
}

fn probe(engine: &Engine, neuron: &Neuron, depth: usize) -> Capabilities {
    if Known::True.is(neuron.id()) || Known::False.is(neuron.id()) {
        return Capabilities::BOOL;
    }
    match neuron.data() {
        NeuronData::Int(_) => Capabilities {
            int: true,
            double: true,
            ..Capabilities::NONE
        },
        NeuronData::Double(_) => Capabilities {
            double: true,
            ..Capabilities::NONE
        },
        NeuronData::Expression(ExpressionKind::Bool) => Capabilities::BOOL,
        NeuronData::Expression(ExpressionKind::ResultStatement) if depth < MAX_PROBE_DEPTH => {
            let Some(instruction) = neuron
                .first_out(Known::Instruction.id())
                .and_then(|id| engine.instructions().get(id))
            else {
                return Capabilities::NONE;
            };
            let graph = engine.graph();
            let args: Vec<Capabilities> = neuron
                .first_out(Known::Arguments.id())
                .and_then(|id| graph.get(id))
                .and_then(|cluster| cluster.children())
                .unwrap_or_default()
                .into_iter()
                .map(|arg| match graph.get(arg) {
                    Some(arg) => probe(engine, &arg, depth + 1),
                    None => Capabilities::NONE,
                })
                .collect();
            Capabilities {
                bool: instruction.as_bool().is_some(),
                int: instruction.as_int().is_some_and(|i| i.can_get_int(&args)),
                double: instruction
                    .as_double()
                    .is_some_and(|d| d.can_get_double(&args)),
            }
        }
        _ => Capabilities::NONE,
    }
}

impl ExecContext<'_> {
    pub fn get_bool(&mut self, id: NeuronId) -> Result<bool, RuntimeError> {
        if Known::True.is(id) {
            return Ok(true);
        }
        if Known::False.is(id) {
            return Ok(false);
        }
        let neuron = self.graph().by_id(id)?;
        match neuron.expression_kind() {
            Some(ExpressionKind::Bool) => boolean::evaluate(self, id),
            Some(ExpressionKind::ResultStatement) => statement::get_bool(self, id),
            _ => Err(RuntimeError::InvalidDispatch {
                neuron: id,
                capability: "bool",
            }),
        }
    }

    pub fn get_int(&mut self, id: NeuronId) -> Result<i64, RuntimeError> {
        let neuron = self.graph().by_id(id)?;
        if let Some(value) = neuron.int() {
            return Ok(value);
        }
        match neuron.expression_kind() {
            Some(ExpressionKind::ResultStatement) => statement::get_int(self, id),
            _ => Err(RuntimeError::InvalidDispatch {
                neuron: id,
                capability: "int",
            }),
        }
    }

    pub fn get_double(&mut self, id: NeuronId) -> Result<f64, RuntimeError> {
        let neuron = self.graph().by_id(id)?;
        if let Some(value) = neuron.number() {
            return Ok(value);
        }
        match neuron.expression_kind() {
            Some(ExpressionKind::ResultStatement) => statement::get_double(self, id),
            _ => Err(RuntimeError::InvalidDispatch {
                neuron: id,
                capability: "double",
            }),
        }
    }
}
