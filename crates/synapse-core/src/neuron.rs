//! The neuron: a uniquely identified graph vertex.
//!
//! A [`Neuron`] has an immutable identity and kind, a mutable payload that
//! depends on the kind, and two mutable link lists. Each mutable part sits
//! behind its own short-lived `RwLock`; callers never hold one of these
//! while traversing, they copy out what they need (see
//! [`Neuron::links_out`]).

use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::NeuronId;
use crate::known::Known;
use crate::link::{Link, LinkBuffer};
use crate::value::Value;
use crate::work_cell::WorkCell;

/// Executable expression kinds.
///
/// The kind is fixed at creation; the operands of an expression are its
/// outgoing links, tagged by meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpressionKind {
    /// `LeftPart := RightPart`.
    Assignment,
    /// `LeftPart Operator RightPart`, producing True or False.
    Bool,
    /// If/case/loop construct over a cluster of conditional parts.
    Conditional,
    /// One clause of a conditional statement: `Condition` and `Statements`.
    ConditionalPart,
    /// A plain block of statements.
    Block,
    /// A block executed while holding a batch of locks.
    Lock,
    /// Call of an instruction for its side effect.
    Statement,
    /// Call of an instruction for its result.
    ResultStatement,
    /// Returns its `Argument` without evaluating it.
    ByRef,
}

impl ExpressionKind {
    /// Returns `true` if the expression can produce a result list.
    pub fn is_result(self) -> bool {
        matches!(
            self,
            ExpressionKind::Bool | ExpressionKind::ResultStatement | ExpressionKind::ByRef
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ExpressionKind::Assignment => "Assignment",
            ExpressionKind::Bool => "BoolExpression",
            ExpressionKind::Conditional => "ConditionalStatement",
            ExpressionKind::ConditionalPart => "ConditionalExpression",
            ExpressionKind::Block => "ExpressionsBlock",
            ExpressionKind::Lock => "LockExpression",
            ExpressionKind::Statement => "Statement",
            ExpressionKind::ResultStatement => "ResultStatement",
            ExpressionKind::ByRef => "ByRefExpression",
        }
    }
}

/// Template for creating a neuron with [`NeuronGraph::add`](crate::graph::NeuronGraph::add).
#[derive(Debug, Clone, PartialEq)]
pub enum Prototype {
    /// A plain neuron carrying no payload (tags, instructions, literals).
    Neuron,
    Int(i64),
    Double(f64),
    Text(String),
    /// A storage slot. With `by_ref`, assigning another variable stores a
    /// reference to it instead of copying its values.
    Variable { by_ref: bool },
    Cluster {
        meaning: NeuronId,
        children: Vec<NeuronId>,
    },
    Expression(ExpressionKind),
}

/// Kind-specific payload of a neuron.
#[derive(Debug)]
pub enum NeuronData {
    Neuron,
    Int(RwLock<i64>),
    Double(RwLock<f64>),
    Text(RwLock<String>),
    Variable {
        by_ref: bool,
        values: RwLock<Vec<Value>>,
    },
    Cluster {
        meaning: NeuronId,
        children: RwLock<Vec<NeuronId>>,
    },
    Expression(ExpressionKind),
}

/// Type-erased slot holding an expression's compiled operand view.
pub type WorkSlot = WorkCell<dyn Any + Send + Sync>;

/// A graph vertex.
pub struct Neuron {
    id: NeuronId,
    data: NeuronData,
    links_out: RwLock<Vec<Link>>,
    links_in: RwLock<Vec<Link>>,
    /// Clusters listing this neuron as a child.
    clustered_by: RwLock<SmallVec<[NeuronId; 2]>>,
    work: WorkSlot,
}

impl Neuron {
    pub(crate) fn new(id: NeuronId, prototype: Prototype) -> Self {
        let data = match prototype {
            Prototype::Neuron => NeuronData::Neuron,
            Prototype::Int(v) => NeuronData::Int(RwLock::new(v)),
            Prototype::Double(v) => NeuronData::Double(RwLock::new(v)),
            Prototype::Text(v) => NeuronData::Text(RwLock::new(v)),
            Prototype::Variable { by_ref } => NeuronData::Variable {
                by_ref,
                values: RwLock::new(Vec::new()),
            },
            Prototype::Cluster { meaning, children } => NeuronData::Cluster {
                meaning,
                children: RwLock::new(children),
            },
            Prototype::Expression(kind) => NeuronData::Expression(kind),
        };
        Neuron {
            id,
            data,
            links_out: RwLock::new(Vec::new()),
            links_in: RwLock::new(Vec::new()),
            clustered_by: RwLock::new(SmallVec::new()),
            work: WorkCell::new(),
        }
    }

    pub fn id(&self) -> NeuronId {
        self.id
    }

    pub fn data(&self) -> &NeuronData {
        &self.data
    }

    /// The expression kind, if this neuron is executable.
    pub fn expression_kind(&self) -> Option<ExpressionKind> {
        match self.data {
            NeuronData::Expression(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.data, NeuronData::Variable { .. })
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self.data, NeuronData::Cluster { .. })
    }

    /// Returns `true` for neurons that produce a result list when evaluated
    /// (variables and result expressions).
    pub fn is_result_expression(&self) -> bool {
        match self.data {
            NeuronData::Variable { .. } => true,
            NeuronData::Expression(kind) => kind.is_result(),
            _ => false,
        }
    }

    pub fn int(&self) -> Option<i64> {
        match &self.data {
            NeuronData::Int(v) => Some(*read(v)),
            _ => None,
        }
    }

    pub fn double(&self) -> Option<f64> {
        match &self.data {
            NeuronData::Double(v) => Some(*read(v)),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<String> {
        match &self.data {
            NeuronData::Text(v) => Some(read(v).clone()),
            _ => None,
        }
    }

    /// Numeric payload of an int or double neuron, widened to `f64`.
    pub fn number(&self) -> Option<f64> {
        self.int().map(|v| v as f64).or_else(|| self.double())
    }

    /// Copy of a variable's stored values.
    pub fn values(&self) -> Option<Vec<Value>> {
        match &self.data {
            NeuronData::Variable { values, .. } => Some(read(values).clone()),
            _ => None,
        }
    }

    pub fn is_by_ref(&self) -> bool {
        matches!(self.data, NeuronData::Variable { by_ref: true, .. })
    }

    /// Meaning tag of a cluster.
    pub fn cluster_meaning(&self) -> Option<NeuronId> {
        match &self.data {
            NeuronData::Cluster { meaning, .. } => Some(*meaning),
            _ => None,
        }
    }

    /// Copy of a cluster's children.
    pub fn children(&self) -> Option<Vec<NeuronId>> {
        match &self.data {
            NeuronData::Cluster { children, .. } => Some(read(children).clone()),
            _ => None,
        }
    }

    /// Copies the outgoing links into a caller-owned buffer.
    pub fn links_out(&self) -> LinkBuffer {
        read(&self.links_out).iter().copied().collect()
    }

    /// Copies the incoming links into a caller-owned buffer.
    pub fn links_in(&self) -> LinkBuffer {
        read(&self.links_in).iter().copied().collect()
    }

    /// First outgoing link target with the given meaning.
    pub fn first_out(&self, meaning: NeuronId) -> Option<NeuronId> {
        read(&self.links_out)
            .iter()
            .find(|l| l.meaning == meaning)
            .map(|l| l.to)
    }

    /// Copy of the clusters that list this neuron as a child.
    pub fn clustered_by(&self) -> SmallVec<[NeuronId; 2]> {
        read(&self.clustered_by).clone()
    }

    /// Returns `true` while any link or cluster points at this neuron.
    pub fn has_references(&self) -> bool {
        !read(&self.links_in).is_empty() || !read(&self.clustered_by).is_empty()
    }

    /// The lazily built operand view of an expression.
    pub fn work(&self) -> &WorkSlot {
        &self.work
    }

    // Mutation helpers used by the graph, which owns link bookkeeping.

    pub(crate) fn links_out_mut(&self) -> RwLockWriteGuard<'_, Vec<Link>> {
        write(&self.links_out)
    }

    pub(crate) fn links_in_mut(&self) -> RwLockWriteGuard<'_, Vec<Link>> {
        write(&self.links_in)
    }

    pub(crate) fn clustered_by_mut(&self) -> RwLockWriteGuard<'_, SmallVec<[NeuronId; 2]>> {
        write(&self.clustered_by)
    }
}

impl fmt::Debug for Neuron {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neuron")
            .field("id", &self.id)
            .field("data", &self.data)
            .finish()
    }
}

impl fmt::Display for Neuron {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(known) = Known::from_id(self.id) {
            return write!(f, "{}", known.name());
        }
        match &self.data {
            NeuronData::Neuron => write!(f, "Neuron#{}", self.id),
            NeuronData::Int(v) => write!(f, "Int({})", read(v)),
            NeuronData::Double(v) => write!(f, "Double({})", read(v)),
            NeuronData::Text(v) => write!(f, "Text({:?})", read(v)),
            NeuronData::Variable { .. } => write!(f, "Variable#{}", self.id),
            NeuronData::Cluster { children, .. } => {
                write!(f, "Cluster#{}[", self.id)?;
                for (idx, child) in read(children).iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, "]")
            }
            NeuronData::Expression(kind) => write!(f, "{}#{}", kind.name(), self.id),
        }
    }
}

/// Shared handle to a neuron.
pub type NeuronRef = Arc<Neuron>;

// Lock poisoning only happens if a writer panicked mid-update; the payloads
// are plain values, so the data is still usable.

pub(crate) fn read<T: ?Sized>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn write<T: ?Sized>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
