//! Row sources for query loops.
//!
//! A query loop pulls rows from a [`RowSource`] one at a time through a
//! resumable [`RowCursor`] and binds each row to the loop variable. Cursors
//! can be duplicated for forked evaluation paths and skipped to the end
//! when the loop is broken out of.
//!
//! Graph-backed sources snapshot the links or children they enumerate when
//! the cursor is created, so the loop body may mutate the graph freely.

use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use synapse_core::{NeuronGraph, NeuronId, Prototype, Value};

/// One enumeration step: the values bound to the loop variable.
pub type Row = SmallVec<[Value; 4]>;

pub trait RowCursor: Send {
    fn next_row(&mut self) -> Option<Row>;

    /// An independent cursor at the same position.
    fn fork(&self) -> Box<dyn RowCursor>;

    /// Moves past the last row.
    fn finish(&mut self);
}

pub trait RowSource: Send + Sync {
    fn enumerate(&self, graph: &NeuronGraph) -> Box<dyn RowCursor>;

    fn duplicate(&self, cursor: &dyn RowCursor) -> Box<dyn RowCursor> {
        cursor.fork()
    }

    fn goto_end(&self, cursor: &mut dyn RowCursor) {
        cursor.finish();
    }
}

/// Cursor over a shared, fixed list of rows.
#[derive(Debug, Clone)]
pub struct VecCursor {
    rows: Arc<[Row]>,
    position: usize,
}

impl VecCursor {
    pub fn new(rows: impl Into<Arc<[Row]>>) -> Self {
        VecCursor {
            rows: rows.into(),
            position: 0,
        }
    }

    fn single_values(ids: impl IntoIterator<Item = NeuronId>) -> Self {
        let rows: Vec<Row> = ids
            .into_iter()
            .map(|id| SmallVec::from_elem(Value::Neuron(id), 1))
            .collect();
        Self::new(rows)
    }
}

impl RowCursor for VecCursor {
    fn next_row(&mut self) -> Option<Row> {
        let row = self.rows.get(self.position)?.clone();
        self.position += 1;
        Some(row)
    }

    fn fork(&self) -> Box<dyn RowCursor> {
        Box::new(self.clone())
    }

    fn finish(&mut self) {
        self.position = self.rows.len();
    }
}

/// A fixed table of rows, e.g. results computed by the host.
#[derive(Debug, Clone, Default)]
pub struct StaticRows {
    rows: Arc<[Row]>,
}

impl StaticRows {
    pub fn new(rows: Vec<Row>) -> Self {
        StaticRows { rows: rows.into() }
    }

    /// One single-value row per element.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        Self::new(
            values
                .into_iter()
                .map(|v| SmallVec::from_elem(v, 1))
                .collect(),
        )
    }
}

impl RowSource for StaticRows {
    fn enumerate(&self, _graph: &NeuronGraph) -> Box<dyn RowCursor> {
        Box::new(VecCursor::new(Arc::clone(&self.rows)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// The neurons on the other end of a neuron's incoming or outgoing links.
#[derive(Debug, Clone, Copy)]
pub struct LinkRows {
    pub neuron: NeuronId,
    pub direction: Direction,
}

impl RowSource for LinkRows {
    fn enumerate(&self, graph: &NeuronGraph) -> Box<dyn RowCursor> {
        let ids: Vec<NeuronId> = match graph.get(self.neuron) {
            Some(neuron) => match self.direction {
                Direction::In => neuron.links_in().iter().map(|l| l.from).collect(),
                Direction::Out => neuron.links_out().iter().map(|l| l.to).collect(),
            },
            None => Vec::new(),
        };
        Box::new(VecCursor::single_values(ids))
    }
}

/// The clusters that contain a neuron.
#[derive(Debug, Clone, Copy)]
pub struct ClusterRows {
    pub neuron: NeuronId,
}

impl RowSource for ClusterRows {
    fn enumerate(&self, graph: &NeuronGraph) -> Box<dyn RowCursor> {
        let ids = graph
            .get(self.neuron)
            .map(|n| n.clustered_by())
            .unwrap_or_default();
        Box::new(VecCursor::single_values(ids))
    }
}

/// The children of a cluster.
#[derive(Debug, Clone, Copy)]
pub struct ChildRows {
    pub cluster: NeuronId,
}

impl RowSource for ChildRows {
    fn enumerate(&self, graph: &NeuronGraph) -> Box<dyn RowCursor> {
        let ids = graph
            .get(self.cluster)
            .and_then(|n| n.children())
            .unwrap_or_default();
        Box::new(VecCursor::single_values(ids))
    }
}

/// Query table keyed by the neuron that identifies each query.
#[derive(Default, Clone)]
pub struct QueryRegistry {
    sources: IndexMap<NeuronId, Arc<dyn RowSource>>,
}

impl QueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and pins a neuron for `source` and returns its ID.
    pub fn register(&mut self, graph: &NeuronGraph, source: impl RowSource + 'static) -> NeuronId {
        let id = graph.add(Prototype::Neuron);
        graph.pin(id);
        self.sources.insert(id, Arc::new(source));
        id
    }

    pub fn get(&self, id: NeuronId) -> Option<Arc<dyn RowSource>> {
        self.sources.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl std::fmt::Debug for QueryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.sources.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_core::Known;

    fn drain(cursor: &mut dyn RowCursor) -> Vec<Row> {
        std::iter::from_fn(|| cursor.next_row()).collect()
    }

    #[test]
    fn static_rows_enumerate_in_order() {
        let graph = NeuronGraph::new();
        let source = StaticRows::from_values([Value::Int(1), Value::Int(2)]);
        let mut cursor = source.enumerate(&graph);
        let rows = drain(cursor.as_mut());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].as_slice(), &[Value::Int(2)]);
    }

    #[test]
    fn duplicate_is_independent() {
        let graph = NeuronGraph::new();
        let source = StaticRows::from_values([Value::Int(1), Value::Int(2), Value::Int(3)]);
        let mut cursor = source.enumerate(&graph);
        cursor.next_row();
        let mut copy = source.duplicate(cursor.as_ref());
        assert_eq!(drain(cursor.as_mut()).len(), 2);
        assert_eq!(copy.next_row().unwrap().as_slice(), &[Value::Int(2)]);
    }

    #[test]
    fn goto_end_stops_enumeration() {
        let graph = NeuronGraph::new();
        let source = StaticRows::from_values([Value::Int(1)]);
        let mut cursor = source.enumerate(&graph);
        source.goto_end(cursor.as_mut());
        assert!(cursor.next_row().is_none());
    }

    #[test]
    fn graph_sources_snapshot_links_and_children() {
        let graph = NeuronGraph::new();
        let hub = graph.add(Prototype::Neuron);
        let a = graph.add(Prototype::Neuron);
        let b = graph.add(Prototype::Neuron);
        graph.add_link(hub, a, Known::Argument.id()).unwrap();
        graph.add_link(b, hub, Known::Argument.id()).unwrap();
        let cluster = graph.add_cluster(Known::Arguments.id(), vec![a, b]);

        let out = drain(LinkRows { neuron: hub, direction: Direction::Out }.enumerate(&graph).as_mut());
        assert_eq!(out, vec![Row::from_elem(Value::Neuron(a), 1)]);

        let mut incoming = LinkRows { neuron: hub, direction: Direction::In }.enumerate(&graph);
        graph.remove_link(b, hub, Known::Argument.id());
        assert_eq!(incoming.next_row().unwrap().as_slice(), &[Value::Neuron(b)]);

        let clusters = drain(ClusterRows { neuron: a }.enumerate(&graph).as_mut());
        assert_eq!(clusters, vec![Row::from_elem(Value::Neuron(cluster), 1)]);

        let children = drain(ChildRows { cluster }.enumerate(&graph).as_mut());
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn registered_queries_are_pinned() {
        let graph = NeuronGraph::new();
        let mut registry = QueryRegistry::new();
        let id = registry.register(&graph, StaticRows::default());
        assert!(registry.get(id).is_some());
        assert!(graph.is_protected(id));
    }
}
