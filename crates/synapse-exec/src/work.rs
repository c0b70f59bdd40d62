//! WorkData: the compiled operand view of an expression.
//!
//! An expression's operands are its outgoing links, tagged by meaning.
//! Looking them up on every evaluation would scan the link list each time,
//! so the first access snapshots the links once and classifies them into a
//! [`WorkData`] record, stored in the neuron's work cell. Any link change on
//! the neuron clears the cell and the next access rebuilds it.
//!
//! The record is built under the cell's build lock and published only when
//! complete; concurrent first accesses all observe the same record.

use std::any::Any;
use std::sync::Arc;

use synapse_core::{ExpressionKind, Known, Neuron, NeuronId};

use crate::engine::Engine;
use crate::error::RuntimeError;
use crate::fast_path::Strategy;

#[derive(Debug, Clone, PartialEq)]
pub enum WorkData {
    Assignment {
        left: Option<NeuronId>,
        right: Option<NeuronId>,
    },
    Bool(BoolWork),
    Conditional(ConditionalWork),
    Part {
        condition: Option<NeuronId>,
        statements: Option<NeuronId>,
    },
    Block {
        statements: Option<NeuronId>,
    },
    Lock {
        statements: Option<NeuronId>,
        neurons: Option<NeuronId>,
        links: Option<NeuronId>,
    },
    Statement {
        instruction: Option<NeuronId>,
        arguments: Option<NeuronId>,
    },
    ByRef {
        argument: Option<NeuronId>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoolWork {
    pub left: Option<NeuronId>,
    pub operator: Option<NeuronId>,
    pub right: Option<NeuronId>,
    /// Evaluation strategy picked from the operands' capabilities.
    pub strategy: Strategy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalWork {
    /// Cluster of ConditionalExpression parts.
    pub conditions: Option<NeuronId>,
    pub style: Option<NeuronId>,
    pub loop_item: Option<NeuronId>,
    pub case_item: Option<NeuronId>,
}

impl WorkData {
    /// Classifies `neuron`'s outgoing links for an expression of `kind`.
    pub fn build(engine: &Engine, neuron: &Neuron, kind: ExpressionKind) -> WorkData {
        let links = neuron.links_out();
        let find = |meaning: Known| {
            links
                .iter()
                .find(|l| l.meaning == meaning.id())
                .map(|l| l.to)
        };
        match kind {
            ExpressionKind::Assignment => WorkData::Assignment {
                left: find(Known::LeftPart),
                right: find(Known::RightPart),
            },
            ExpressionKind::Bool => {
                let left = find(Known::LeftPart);
                let operator = find(Known::Operator);
                let right = find(Known::RightPart);
                WorkData::Bool(BoolWork {
                    left,
                    operator,
                    right,
                    strategy: Strategy::choose(engine, left, operator, right),
                })
            }
            ExpressionKind::Conditional => WorkData::Conditional(ConditionalWork {
                conditions: find(Known::Conditions),
                style: find(Known::LoopStyle),
                loop_item: find(Known::LoopItem),
                case_item: find(Known::CaseItem),
            }),
            ExpressionKind::ConditionalPart => WorkData::Part {
                condition: find(Known::Condition),
                statements: find(Known::Statements),
            },
            ExpressionKind::Block => WorkData::Block {
                statements: find(Known::Statements),
            },
            ExpressionKind::Lock => WorkData::Lock {
                statements: find(Known::Statements),
                neurons: find(Known::NeuronsToLock),
                links: find(Known::LinksToLock),
            },
            ExpressionKind::Statement | ExpressionKind::ResultStatement => WorkData::Statement {
                instruction: find(Known::Instruction),
                arguments: find(Known::Arguments),
            },
            ExpressionKind::ByRef => WorkData::ByRef {
                argument: find(Known::Argument),
            },
        }
    }
}

/// Returns the WorkData of expression `id`, building it on first access.
pub fn fetch(engine: &Engine, id: NeuronId) -> Result<Arc<WorkData>, RuntimeError> {
    let neuron = engine.graph().by_id(id)?;
    let kind = neuron
        .expression_kind()
        .ok_or(RuntimeError::NotAnExpression { neuron: id })?;
    let cached = neuron.work().get_or_build(|| {
        tracing::trace!(neuron = %id, kind = kind.name(), "building work data");
        Arc::new(WorkData::build(engine, &neuron, kind)) as Arc<dyn Any + Send + Sync>
    });
    cached.downcast::<WorkData>().map_err(|_| RuntimeError::Internal {
        message: format!("work cell of {id} holds a foreign type"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::testing::engine;

    #[test]
    fn assignment_work_classifies_links() {
        let engine = engine();
        let b = GraphBuilder::new(engine.graph());
        let var = b.variable();
        let val = b.int(42);
        let assign = b.assignment(var, val).unwrap();

        let work = fetch(&engine, assign).unwrap();
        assert_eq!(
            *work,
            WorkData::Assignment {
                left: Some(var),
                right: Some(val)
            }
        );
    }

    #[test]
    fn missing_links_stay_empty() {
        let engine = engine();
        let assign = engine
            .graph()
            .add(synapse_core::Prototype::Expression(ExpressionKind::Assignment));
        let work = fetch(&engine, assign).unwrap();
        assert_eq!(
            *work,
            WorkData::Assignment {
                left: None,
                right: None
            }
        );
    }

    #[test]
    fn fetch_is_cached_until_links_change() {
        let engine = engine();
        let b = GraphBuilder::new(engine.graph());
        let var = b.variable();
        let one = b.int(1);
        let two = b.int(2);
        let assign = b.assignment(var, one).unwrap();

        let first = fetch(&engine, assign).unwrap();
        let again = fetch(&engine, assign).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        engine
            .graph()
            .remove_link(assign, one, Known::RightPart.id());
        engine
            .graph()
            .add_link(assign, two, Known::RightPart.id())
            .unwrap();
        let rebuilt = fetch(&engine, assign).unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert_eq!(
            *rebuilt,
            WorkData::Assignment {
                left: Some(var),
                right: Some(two)
            }
        );
    }

    #[test]
    fn non_expressions_have_no_work() {
        let engine = engine();
        let val = engine.graph().add(synapse_core::Prototype::Int(1));
        assert_eq!(
            fetch(&engine, val).unwrap_err(),
            RuntimeError::NotAnExpression { neuron: val }
        );
    }
}
