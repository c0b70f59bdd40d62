//! Runtime values carried on the result stack and stored in variables.
//!
//! Most values are references to neurons. Instructions may also produce
//! transient numbers and texts, which keeps evaluation from allocating graph
//! nodes for intermediate results.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::NeuronGraph;
use crate::id::NeuronId;
use crate::known::Known;

/// Nesting limit for cluster deep equality; graphs may contain cycles.
const MAX_CLUSTER_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Neuron(NeuronId),
    Int(i64),
    Double(f64),
    Text(String),
}

/// A value with any neuron reference resolved to its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Double(f64),
    Text(String),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Double(v) => Some(*v),
            Scalar::Text(_) => None,
        }
    }
}

impl Value {
    pub fn truth(flag: bool) -> Value {
        if flag {
            Value::Neuron(Known::True.id())
        } else {
            Value::Neuron(Known::False.id())
        }
    }

    pub fn neuron(&self) -> Option<NeuronId> {
        match self {
            Value::Neuron(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns `true` only for the literal True neuron.
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Neuron(id) if Known::True.is(*id))
    }

    /// The primitive payload, looking through neuron references.
    pub fn scalar(&self, graph: &NeuronGraph) -> Option<Scalar> {
        match self {
            Value::Int(v) => Some(Scalar::Int(*v)),
            Value::Double(v) => Some(Scalar::Double(*v)),
            Value::Text(v) => Some(Scalar::Text(v.clone())),
            Value::Neuron(id) => {
                let neuron = graph.get(*id)?;
                if let Some(v) = neuron.int() {
                    Some(Scalar::Int(v))
                } else if let Some(v) = neuron.double() {
                    Some(Scalar::Double(v))
                } else {
                    neuron.text().map(Scalar::Text)
                }
            }
        }
    }

    pub fn as_int(&self, graph: &NeuronGraph) -> Option<i64> {
        match self.scalar(graph)? {
            Scalar::Int(v) => Some(v),
            Scalar::Double(v) => Some(v as i64),
            Scalar::Text(_) => None,
        }
    }

    pub fn as_double(&self, graph: &NeuronGraph) -> Option<f64> {
        self.scalar(graph)?.as_f64()
    }

    pub fn as_text(&self, graph: &NeuronGraph) -> Option<String> {
        match self.scalar(graph)? {
            Scalar::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Value equality as used by comparisons: same neuron, equal numbers
    /// (int and double compare by value), equal texts, or clusters with the
    /// same meaning and pairwise-equal children.
    pub fn equals(&self, other: &Value, graph: &NeuronGraph) -> bool {
        equals_at(self, other, graph, 0)
    }

    /// Ordering between two numbers or two texts; `None` for anything else.
    pub fn compare(&self, other: &Value, graph: &NeuronGraph) -> Option<Ordering> {
        match (self.scalar(graph)?, other.scalar(graph)?) {
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(&b)),
            (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }

    /// Renders the value for output, resolving neuron payloads.
    pub fn render(&self, graph: &NeuronGraph) -> String {
        match self {
            Value::Neuron(id) => match graph.get(*id) {
                Some(neuron) => match neuron.text() {
                    Some(text) => text,
                    None => neuron
                        .int()
                        .map(|v| v.to_string())
                        .or_else(|| neuron.double().map(|v| v.to_string()))
                        .unwrap_or_else(|| neuron.to_string()),
                },
                None => format!("<missing {id}>"),
            },
            other => other.to_string(),
        }
    }
}

fn equals_at(a: &Value, b: &Value, graph: &NeuronGraph, depth: usize) -> bool {
    if let (Value::Neuron(x), Value::Neuron(y)) = (a, b) {
        if x == y {
            return true;
        }
        if let (Some(nx), Some(ny)) = (graph.get(*x), graph.get(*y)) {
            if let (Some(cx), Some(cy)) = (nx.children(), ny.children()) {
                if depth >= MAX_CLUSTER_DEPTH || nx.cluster_meaning() != ny.cluster_meaning() {
                    return false;
                }
                return cx.len() == cy.len()
                    && cx.iter().zip(cy.iter()).all(|(l, r)| {
                        equals_at(&Value::Neuron(*l), &Value::Neuron(*r), graph, depth + 1)
                    });
            }
        }
    }
    match (a.scalar(graph), b.scalar(graph)) {
        (Some(Scalar::Text(x)), Some(Scalar::Text(y))) => x == y,
        (Some(Scalar::Text(_)), Some(_)) | (Some(_), Some(Scalar::Text(_))) => false,
        (Some(Scalar::Int(x)), Some(Scalar::Int(y))) => x == y,
        (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
        _ => false,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Neuron(id) => match Known::from_id(*id) {
                Some(known) => write!(f, "{}", known.name()),
                None => write!(f, "#{id}"),
            },
            Value::Int(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<NeuronId> for Value {
    fn from(id: NeuronId) -> Self {
        Value::Neuron(id)
    }
}
