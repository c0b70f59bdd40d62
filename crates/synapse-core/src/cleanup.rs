//! Deletion of a pattern's subgraph with reference checks.
//!
//! A pattern owns everything reachable from its root through outgoing links
//! and cluster children, except what something outside the pattern still
//! references. Dependency order is unknown up front (patterns may contain
//! cycles), so the survivor set is computed as a fixpoint:
//!
//! 1. collect the candidates reachable from the root;
//! 2. evict every candidate referenced from outside the candidate set, and
//!    repeat until a pass evicts nothing;
//! 3. delete the remaining candidates.
//!
//! Each eviction pass removes at least one candidate or ends the loop, so the
//! number of passes is bounded by the number of candidates.

use std::collections::{HashSet, VecDeque};

use crate::graph::NeuronGraph;
use crate::id::NeuronId;

/// Outcome of [`delete_pattern`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Deleted neurons, in deletion order.
    pub deleted: Vec<NeuronId>,
    /// Candidates kept because something outside the pattern references them.
    pub kept: Vec<NeuronId>,
    /// Eviction passes until the fixpoint was reached.
    pub passes: usize,
}

/// Deletes the pattern rooted at `root`, keeping shared neurons.
pub fn delete_pattern(graph: &NeuronGraph, root: NeuronId) -> CleanupReport {
    let order = reachable(graph, root);
    let mut dying: HashSet<NeuronId> = order.iter().copied().collect();
    let mut report = CleanupReport::default();

    loop {
        report.passes += 1;
        let evicted: Vec<NeuronId> = order
            .iter()
            .copied()
            .filter(|id| dying.contains(id))
            .filter(|id| graph.is_protected(*id) || referenced_outside(graph, *id, &dying))
            .collect();
        if evicted.is_empty() {
            break;
        }
        for id in evicted {
            dying.remove(&id);
            report.kept.push(id);
        }
    }

    for id in order.iter().copied().filter(|id| dying.contains(id)) {
        if graph.delete_unless_referenced_outside(id, &dying) {
            report.deleted.push(id);
        }
    }

    tracing::debug!(
        root = %root,
        deleted = report.deleted.len(),
        kept = report.kept.len(),
        passes = report.passes,
        "pattern deleted"
    );
    report
}

/// Breadth-first walk over outgoing links and cluster children. Link
/// meanings are tags, not owned operands, and are not followed.
fn reachable(graph: &NeuronGraph, root: NeuronId) -> Vec<NeuronId> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        let Some(neuron) = graph.get(id) else {
            continue;
        };
        order.push(id);
        queue.extend(neuron.links_out().iter().map(|l| l.to));
        if let Some(children) = neuron.children() {
            queue.extend(children);
        }
    }
    order
}

fn referenced_outside(graph: &NeuronGraph, id: NeuronId, dying: &HashSet<NeuronId>) -> bool {
    let Some(neuron) = graph.get(id) else {
        return false;
    };
    neuron.links_in().iter().any(|l| !dying.contains(&l.from))
        || neuron.clustered_by().iter().any(|c| !dying.contains(c))
}
