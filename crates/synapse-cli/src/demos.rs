//! Built-in demo programs, assembled with [`GraphBuilder`].

use synapse_core::{Known, NeuronId};
use synapse_exec::{Engine, GraphBuilder, RuntimeError};

/// Instructions every demo needs; `InstructionSet::standard` registers all
/// of them.
struct Calls {
    print: NeuronId,
    add: NeuronId,
}

impl Calls {
    fn of(engine: &Engine) -> Result<Calls, RuntimeError> {
        let id = |name: &str| {
            engine
                .instructions()
                .id_of(name)
                .ok_or_else(|| RuntimeError::Internal {
                    message: format!("instruction `{name}` is not registered"),
                })
        };
        Ok(Calls {
            print: id("print")?,
            add: id("add")?,
        })
    }
}

/// `target := target + 1`
fn increment(b: &GraphBuilder<'_>, calls: &Calls, target: NeuronId) -> Result<NeuronId, RuntimeError> {
    let one = b.int(1);
    let sum = b.result_statement(calls.add, vec![target, one])?;
    Ok(b.assignment(target, sum)?)
}

/// Prints `0 .. limit` with a Looped conditional.
pub fn count(engine: &Engine, limit: i64) -> Result<NeuronId, RuntimeError> {
    let calls = Calls::of(engine)?;
    let b = GraphBuilder::new(engine.graph());
    let counter = b.int(0);
    let limit = b.int(limit);
    let below = b.boolean(counter, Known::Smaller, limit)?;
    let show = b.statement(calls.print, vec![counter])?;
    let step = increment(&b, &calls, counter)?;
    let part = b.part(Some(below), vec![show, step])?;
    Ok(b.conditional(Known::Looped, vec![part])?)
}

/// Prints each item of a cluster with its position.
pub fn foreach(engine: &Engine, items: &[String]) -> Result<NeuronId, RuntimeError> {
    let calls = Calls::of(engine)?;
    let b = GraphBuilder::new(engine.graph());
    let words = items.iter().map(|item| b.text(item.as_str())).collect();
    let list = b.cluster(Known::Arguments, words);
    let item = b.variable();
    let position = b.int(1);
    let show = b.statement(calls.print, vec![position, item])?;
    let step = increment(&b, &calls, position)?;
    let part = b.part(Some(list), vec![show, step])?;
    Ok(b.conditional_with(Known::ForEach, vec![part], Some(item), None)?)
}

/// One worker of the `locks` demo: increments `counter` `rounds` times,
/// each time inside a LockExpression on it.
pub fn locked_worker(engine: &Engine, counter: NeuronId, rounds: i64) -> Result<NeuronId, RuntimeError> {
    let calls = Calls::of(engine)?;
    let b = GraphBuilder::new(engine.graph());
    let done = b.int(0);
    let rounds = b.int(rounds);
    let guarded = b.lock(vec![counter], vec![], vec![increment(&b, &calls, counter)?])?;
    let below = b.boolean(done, Known::Smaller, rounds)?;
    let part = b.part(Some(below), vec![guarded, increment(&b, &calls, done)?])?;
    Ok(b.conditional(Known::Looped, vec![part])?)
}
