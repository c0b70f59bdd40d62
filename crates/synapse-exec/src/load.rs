//! Pre-warming of WorkData caches.
//!
//! [`load_code`] forces the WorkData of every expression reachable from a
//! root (statements, clauses, operands, arguments) so the first run does not
//! stall on cold caches. The walk uses an explicit work list and a visited
//! set; code graphs may contain cycles.

use std::collections::HashSet;

use synapse_core::NeuronId;

use crate::engine::Engine;
use crate::error::RuntimeError;
use crate::work;

/// Builds the WorkData of every expression reachable from `root` and
/// returns how many expressions were visited.
pub fn load_code(engine: &Engine, root: NeuronId) -> Result<usize, RuntimeError> {
    let mut loaded = 0;
    walk(engine, root, |neuron| {
        if neuron.expression_kind().is_some() {
            work::fetch(engine, neuron.id())?;
            loaded += 1;
        }
        Ok(true)
    })?;
    tracing::debug!(root = %root, expressions = loaded, "code loaded");
    Ok(loaded)
}

/// Returns `true` if every expression reachable from `root` has its
/// WorkData built.
pub fn is_code_loaded(engine: &Engine, root: NeuronId) -> bool {
    let mut complete = true;
    let _ = walk(engine, root, |neuron| {
        if neuron.expression_kind().is_some() && !neuron.work().is_loaded() {
            complete = false;
            return Ok(false);
        }
        Ok(true)
    });
    complete
}

/// Visits neurons reachable through outgoing links and cluster children.
/// The visitor returns `false` to stop the walk.
fn walk<F>(engine: &Engine, root: NeuronId, mut visit: F) -> Result<(), RuntimeError>
where
    F: FnMut(&synapse_core::Neuron) -> Result<bool, RuntimeError>,
{
    let graph = engine.graph();
    let mut seen = HashSet::new();
    let mut pending = vec![root];
    while let Some(id) = pending.pop() {
        if !seen.insert(id) {
            continue;
        }
        let Some(neuron) = graph.get(id) else {
            continue;
        };
        if !visit(&neuron)? {
            return Ok(());
        }
        pending.extend(neuron.links_out().iter().map(|l| l.to));
        if let Some(children) = neuron.children() {
            pending.extend(children);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::testing::engine;
    use synapse_core::Known;

    #[test]
    fn load_code_warms_nested_expressions() {
        let engine = engine();
        let b = GraphBuilder::new(engine.graph());
        let var = b.variable();
        let five = b.int(5);
        let assign = b.assignment(var, five).unwrap();
        let check = b.boolean(var, Known::Equal, five).unwrap();
        let part = b.part(Some(check), vec![assign]).unwrap();
        let root = b.conditional(Known::Normal, vec![part]).unwrap();

        assert!(!is_code_loaded(&engine, root));
        assert_eq!(load_code(&engine, root).unwrap(), 4);
        assert!(is_code_loaded(&engine, root));

        engine
            .graph()
            .add_link(assign, five, Known::Argument.id())
            .unwrap();
        assert!(!is_code_loaded(&engine, root));
    }

    #[test]
    fn cycles_terminate() {
        let engine = engine();
        let b = GraphBuilder::new(engine.graph());
        let block = b.block(vec![]).unwrap();
        let statements = engine.graph().targets(block, Known::Statements.id())[0];
        engine.graph().add_child(statements, block).unwrap();
        assert_eq!(load_code(&engine, block).unwrap(), 1);
    }
}
