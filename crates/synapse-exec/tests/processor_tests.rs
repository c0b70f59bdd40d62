//! End-to-end runs of expression graphs on a processor.

use std::sync::Arc;

use synapse_core::{Known, NeuronGraph, NeuronId, Value};
use synapse_exec::source::ChildRows;
use synapse_exec::trace::render;
use synapse_exec::{
    load_code, DiagnosticKind, Engine, EngineConfig, GraphBuilder, InstructionSet, MemorySink,
    ProcessorState, QueryRegistry, RuntimeError, StaticRows,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    engine: Engine,
    sink: Arc<MemorySink>,
}

impl Harness {
    fn new() -> Self {
        Self::with(EngineConfig::default(), |_, _| {})
    }

    fn with(config: EngineConfig, queries: impl FnOnce(&NeuronGraph, &mut QueryRegistry)) -> Self {
        let graph = Arc::new(NeuronGraph::new());
        let instructions = InstructionSet::standard(&graph);
        let mut registry = QueryRegistry::new();
        queries(&graph, &mut registry);
        let sink = Arc::new(MemorySink::new());
        let engine = Engine::new(graph, instructions, config)
            .with_queries(registry)
            .with_sink(sink.clone());
        Harness { engine, sink }
    }

    fn builder(&self) -> GraphBuilder<'_> {
        GraphBuilder::new(self.engine.graph())
    }

    fn instruction(&self, name: &str) -> NeuronId {
        self.engine.instructions().id_of(name).unwrap()
    }

    fn print(&self, args: Vec<NeuronId>) -> NeuronId {
        self.builder().statement(self.instruction("print"), args).unwrap()
    }

    fn print_text(&self, text: &str) -> NeuronId {
        let text = self.builder().text(text);
        self.print(vec![text])
    }

    /// `target := target + 1`
    fn increment(&self, target: NeuronId) -> NeuronId {
        let b = self.builder();
        let one = b.int(1);
        let sum = b.result_statement(self.instruction("add"), vec![target, one]).unwrap();
        b.assignment(target, sum).unwrap()
    }

    fn run(&self, root: NeuronId) -> Vec<String> {
        self.engine.execute(root).unwrap()
    }

    fn int(&self, id: NeuronId) -> i64 {
        self.engine.graph().get(id).unwrap().int().unwrap()
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[test]
fn assignment_stores_values_in_a_variable() {
    let h = Harness::new();
    let b = h.builder();
    let x = b.variable();
    let answer = b.int(42);
    let assign = b.assignment(x, answer).unwrap();

    h.run(assign);
    let values = h.engine.graph().get(x).unwrap().values().unwrap();
    assert_eq!(values, vec![Value::Neuron(answer)]);
    assert!(h.sink.is_empty());
}

#[test]
fn int_comparison_selects_the_branch() {
    let h = Harness::new();
    let b = h.builder();
    let five = b.int(5);
    let three = b.int(3);
    let bigger = b.boolean(five, Known::Bigger, three).unwrap();
    let yes = h.print_text("yes");
    let no = h.print_text("no");
    let then = b.part(Some(bigger), vec![yes]).unwrap();
    let otherwise = b.part(None, vec![no]).unwrap();
    let root = b.conditional(Known::Normal, vec![then, otherwise]).unwrap();

    assert_eq!(h.run(root), vec!["yes"]);
}

#[test]
fn else_if_chain_takes_the_first_match_only() {
    let h = Harness::new();
    let b = h.builder();
    let x = b.int(5);
    let ten = b.int(10);
    let three = b.int(3);
    let big = b.boolean(x, Known::Bigger, ten).unwrap();
    let medium = b.boolean(x, Known::Bigger, three).unwrap();
    let always = b.boolean(x, Known::Bigger, three).unwrap();
    let parts = vec![
        b.part(Some(big), vec![h.print_text("big")]).unwrap(),
        b.part(Some(medium), vec![h.print_text("medium")]).unwrap(),
        b.part(Some(always), vec![h.print_text("also medium")]).unwrap(),
        b.part(None, vec![h.print_text("small")]).unwrap(),
    ];
    let root = b.conditional(Known::Normal, parts).unwrap();

    assert_eq!(h.run(root), vec!["medium"]);
}

#[test]
fn structurally_equal_clusters_compare_equal() {
    let h = Harness::new();
    let b = h.builder();
    let one = b.int(1);
    let two = b.int(2);
    let left = b.cluster(Known::Arguments, vec![one, two]);
    let right = b.cluster(Known::Arguments, vec![one, two]);
    let equal = b.boolean(left, Known::Equal, right).unwrap();
    let part = b.part(Some(equal), vec![h.print_text("same")]).unwrap();
    let root = b.conditional(Known::Normal, vec![part]).unwrap();

    assert_eq!(h.run(root), vec!["same"]);
}

#[test]
fn structural_errors_are_reported_and_the_run_continues() {
    let h = Harness::new();
    let b = h.builder();
    let lonely = b.partial_boolean(None, Known::Bigger, None).unwrap();
    let part = b.part(Some(lonely), vec![h.print_text("unreachable")]).unwrap();
    let conditional = b.conditional(Known::Normal, vec![part]).unwrap();
    let after = h.print_text("after");
    let root = b.block(vec![conditional, after]).unwrap();

    assert_eq!(h.run(root), vec!["after"]);
    let entries = h.sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, DiagnosticKind::Structural);
    assert_eq!(entries[0].neuron, lonely);
}

#[test]
fn unknown_loop_style_is_reported_and_skipped() {
    let h = Harness::new();
    let b = h.builder();
    let part = b.part(None, vec![h.print_text("body")]).unwrap();
    let conditional = b.conditional(Known::Bigger, vec![part]).unwrap();
    let root = b.block(vec![conditional, h.print_text("after")]).unwrap();

    let output = h.run(root);
    assert!(!output.contains(&"body".to_string()));
    assert_eq!(output.last().map(String::as_str), Some("after"));
    assert!(h
        .sink
        .entries()
        .iter()
        .any(|d| d.kind == DiagnosticKind::Invariant));
}

// ---------------------------------------------------------------------------
// Loops
// ---------------------------------------------------------------------------

#[test]
fn for_each_binds_every_element_in_order() {
    let h = Harness::new();
    let b = h.builder();
    let items = vec![b.int(1), b.int(2), b.int(3)];
    let list = b.cluster(Known::Arguments, items);
    let item = b.variable();
    let body = h.print(vec![item]);
    let part = b.part(Some(list), vec![body]).unwrap();
    let root = b
        .conditional_with(Known::ForEach, vec![part], Some(item), None)
        .unwrap();

    let mut processor = h.engine.processor();
    processor.start(root);
    assert_eq!(processor.run(), &ProcessorState::Completed);
    assert_eq!(processor.output(), ["1", "2", "3"]);
    assert_eq!(processor.stack_depth(), 0);
    assert_eq!(processor.frame_depth(), 0);
}

#[test]
fn looped_repeats_while_a_clause_holds() {
    let h = Harness::new();
    let b = h.builder();
    let counter = b.int(0);
    let limit = b.int(3);
    let below = b.boolean(counter, Known::Smaller, limit).unwrap();
    let part = b.part(Some(below), vec![h.increment(counter)]).unwrap();
    let root = b.conditional(Known::Looped, vec![part]).unwrap();

    h.run(root);
    assert_eq!(h.int(counter), 3);
}

#[test]
fn break_leaves_the_innermost_loop() {
    let h = Harness::new();
    let b = h.builder();
    let counter = b.int(0);
    let two = b.int(2);
    let reached = b.boolean(counter, Known::Equal, two).unwrap();
    let stop = b.statement(h.instruction("break"), vec![]).unwrap();
    let check_part = b.part(Some(reached), vec![stop]).unwrap();
    let check = b.conditional(Known::Normal, vec![check_part]).unwrap();
    let forever = b
        .part(Some(Known::True.id()), vec![h.increment(counter), check])
        .unwrap();
    let looped = b.conditional(Known::Looped, vec![forever]).unwrap();
    let root = b.block(vec![looped, h.print_text("after")]).unwrap();

    assert_eq!(h.run(root), vec!["after"]);
    assert_eq!(h.int(counter), 2);
    assert!(h.sink.is_empty());
}

#[test]
fn break_outside_a_loop_is_reported() {
    let h = Harness::new();
    let b = h.builder();
    let stop = b.statement(h.instruction("break"), vec![]).unwrap();
    let root = b.block(vec![stop, h.print_text("never")]).unwrap();

    let mut processor = h.engine.processor();
    processor.start(root);
    assert_eq!(processor.run(), &ProcessorState::Completed);
    assert!(processor.output().is_empty());
    assert_eq!(h.sink.entries()[0].kind, DiagnosticKind::Invariant);
}

#[test]
fn until_runs_the_body_before_testing() {
    let h = Harness::new();
    let b = h.builder();
    let counter = b.int(10);
    let three = b.int(3);
    let done = b.boolean(counter, Known::BiggerOrEqual, three).unwrap();
    let part = b.part(Some(done), vec![h.increment(counter)]).unwrap();
    let root = b.conditional(Known::Until, vec![part]).unwrap();

    h.run(root);
    assert_eq!(h.int(counter), 11);

    let counter = b.int(0);
    let done = b.boolean(counter, Known::BiggerOrEqual, three).unwrap();
    let part = b.part(Some(done), vec![h.increment(counter)]).unwrap();
    let root = b.conditional(Known::Until, vec![part]).unwrap();
    h.run(root);
    assert_eq!(h.int(counter), 3);
}

#[test]
fn case_runs_the_matching_clause() {
    let h = Harness::new();
    let b = h.builder();
    let item = b.variable();
    let chosen = b.text("b");
    let set = b.assignment(item, chosen).unwrap();
    let a = b.text("a");
    let bee = b.text("b");
    let parts = vec![
        b.part(Some(a), vec![h.print_text("A")]).unwrap(),
        b.part(Some(bee), vec![h.print_text("B")]).unwrap(),
        b.part(None, vec![h.print_text("other")]).unwrap(),
    ];
    let case = b
        .conditional_with(Known::Case, parts, None, Some(item))
        .unwrap();
    let root = b.block(vec![set, case]).unwrap();

    assert_eq!(h.run(root), vec!["B"]);
}

#[test]
fn case_looped_reevaluates_the_item_after_each_match() {
    let h = Harness::new();
    let b = h.builder();
    let state = b.int(0);
    let zero = b.int(0);
    let one = b.int(1);
    let to_one = b.assignment(state, one).unwrap();
    let to_two = h.increment(state);
    let parts = vec![
        b.part(Some(zero), vec![h.print_text("zero"), to_one]).unwrap(),
        b.part(Some(one), vec![h.print_text("one"), to_two]).unwrap(),
    ];
    let root = b
        .conditional_with(Known::CaseLooped, parts, None, Some(state))
        .unwrap();

    assert_eq!(h.run(root), vec!["zero", "one"]);
    assert_eq!(h.int(state), 2);
}

#[test]
fn query_loop_pulls_rows_from_a_registered_source() {
    let mut query = NeuronId(0);
    let h = Harness::with(EngineConfig::default(), |graph, registry| {
        query = registry.register(
            graph,
            StaticRows::from_values([Value::Int(1), Value::Int(2)]),
        );
    });
    let b = h.builder();
    let row = b.variable();
    let part = b.part(Some(query), vec![h.print(vec![row])]).unwrap();
    let root = b
        .conditional_with(Known::QueryLoop, vec![part], Some(row), None)
        .unwrap();

    assert_eq!(h.run(root), vec!["1", "2"]);
}

#[test]
fn query_loop_children_walks_a_cluster() {
    let h = Harness::new();
    let b = h.builder();
    let words = vec![b.text("x"), b.text("y")];
    let cluster = b.cluster(Known::Arguments, words);
    let row = b.variable();
    let part = b.part(Some(cluster), vec![h.print(vec![row])]).unwrap();
    let root = b
        .conditional_with(Known::QueryLoopChildren, vec![part], Some(row), None)
        .unwrap();

    assert_eq!(h.run(root), vec!["x", "y"]);
}

#[test]
fn child_rows_source_matches_query_loop_children() {
    let mut query = NeuronId(0);
    let mut cluster = NeuronId(0);
    let h = Harness::with(EngineConfig::default(), |graph, registry| {
        let b = GraphBuilder::new(graph);
        let words = vec![b.text("p"), b.text("q")];
        cluster = b.cluster(Known::Arguments, words);
        query = registry.register(graph, ChildRows { cluster });
    });
    let b = h.builder();
    let row = b.variable();
    let part = b.part(Some(query), vec![h.print(vec![row])]).unwrap();
    let root = b
        .conditional_with(Known::QueryLoop, vec![part], Some(row), None)
        .unwrap();

    assert_eq!(h.run(root), vec!["p", "q"]);
}

/// A variable holding `subject`, so the subject itself gains no incoming
/// condition link.
fn source_of(b: &GraphBuilder<'_>, subject: NeuronId) -> NeuronId {
    let var = b.variable();
    b.graph().set_values(var, vec![Value::Neuron(subject)]).unwrap();
    var
}

#[test]
fn query_loop_in_walks_incoming_links() {
    let h = Harness::new();
    let b = h.builder();
    let subject = b.neuron();
    let meaning = b.neuron();
    let (first, second) = (b.text("from-a"), b.text("from-b"));
    b.graph().add_link(first, subject, meaning).unwrap();
    b.graph().add_link(second, subject, meaning).unwrap();

    let row = b.variable();
    let visits = b.int(0);
    let part = b
        .part(
            Some(source_of(&b, subject)),
            vec![h.print(vec![row]), h.increment(visits)],
        )
        .unwrap();
    let root = b
        .conditional_with(Known::QueryLoopIn, vec![part], Some(row), None)
        .unwrap();

    assert_eq!(h.run(root), vec!["from-a", "from-b"]);
    assert_eq!(h.int(visits), 2);
    assert!(h.sink.is_empty());
}

#[test]
fn query_loop_out_walks_outgoing_links() {
    let h = Harness::new();
    let b = h.builder();
    let subject = b.neuron();
    let meaning = b.neuron();
    for target in ["to-a", "to-b", "to-c"] {
        let target = b.text(target);
        b.graph().add_link(subject, target, meaning).unwrap();
    }

    let row = b.variable();
    let part = b
        .part(Some(source_of(&b, subject)), vec![h.print(vec![row])])
        .unwrap();
    let root = b
        .conditional_with(Known::QueryLoopOut, vec![part], Some(row), None)
        .unwrap();

    assert_eq!(h.run(root), vec!["to-a", "to-b", "to-c"]);
    assert!(h.sink.is_empty());
}

#[test]
fn query_loop_clusters_walks_the_containing_clusters() {
    let h = Harness::new();
    let b = h.builder();
    let subject = b.text("s");
    let (x, y) = (b.text("x"), b.text("y"));
    b.cluster(Known::Arguments, vec![subject, x]);
    b.cluster(Known::Arguments, vec![y, subject]);
    // Not containing the subject, so never visited.
    b.cluster(Known::Arguments, vec![x, y]);

    let row = b.variable();
    let members = b
        .result_statement(h.instruction("children"), vec![row])
        .unwrap();
    let part = b
        .part(Some(source_of(&b, subject)), vec![h.print(vec![members])])
        .unwrap();
    let root = b
        .conditional_with(Known::QueryLoopClusters, vec![part], Some(row), None)
        .unwrap();

    assert_eq!(h.run(root), vec!["s x", "y s"]);
    assert!(h.sink.is_empty());
}

#[test]
fn query_loop_over_a_neuron_without_links_runs_no_body() {
    let h = Harness::new();
    let b = h.builder();
    let lonely = b.neuron();
    let row = b.variable();
    let part = b
        .part(Some(source_of(&b, lonely)), vec![h.print_text("never")])
        .unwrap();
    let root = b
        .conditional_with(Known::QueryLoopOut, vec![part], Some(row), None)
        .unwrap();

    assert!(h.run(root).is_empty());
    assert!(h.sink.is_empty());
}

// ---------------------------------------------------------------------------
// Processor control
// ---------------------------------------------------------------------------

#[test]
fn exit_halts_the_processor() {
    let h = Harness::new();
    let b = h.builder();
    let exit = b.statement(h.instruction("exit"), vec![]).unwrap();
    let root = b
        .block(vec![h.print_text("a"), exit, h.print_text("b")])
        .unwrap();

    let mut processor = h.engine.processor();
    processor.start(root);
    assert_eq!(processor.run(), &ProcessorState::Halted { at: exit });
    assert_eq!(processor.output(), ["a"]);
    assert_eq!(processor.frame_depth(), 0);
    assert_eq!(h.engine.execute(root).unwrap(), vec!["a"]);
}

#[test]
fn frame_limit_aborts_with_an_error() {
    let config = EngineConfig {
        max_frame_depth: 3,
        ..EngineConfig::default()
    };
    let h = Harness::with(config, |_, _| {});
    let b = h.builder();
    let mut root = h.print_text("deep");
    for _ in 0..4 {
        root = b.block(vec![root]).unwrap();
    }

    let err = h.engine.execute(root).unwrap_err();
    assert!(matches!(err, RuntimeError::FrameLimitExceeded { limit: 3, .. }));
}

#[test]
fn stale_fast_path_aborts_and_releases_locks() {
    let h = Harness::new();
    let b = h.builder();
    let one = b.int(1);
    let two = b.int(2);
    let sum = b.result_statement(h.instruction("add"), vec![one, two]).unwrap();
    let bigger = b.boolean(sum, Known::Bigger, one).unwrap();
    let part = b.part(Some(bigger), vec![h.print_text("yes")]).unwrap();
    let conditional = b.conditional(Known::Normal, vec![part]).unwrap();
    let guard = b.lock(vec![one], vec![], vec![conditional]).unwrap();
    load_code(&h.engine, guard).unwrap();

    // The comparison was specialised for ints; swap in a text argument
    // without touching the comparison's own links.
    let graph = h.engine.graph();
    let args = graph.targets(sum, Known::Arguments.id())[0];
    let word = b.text("two");
    assert!(graph.remove_child(args, two).unwrap());
    graph.add_child(args, word).unwrap();

    let mut processor = h.engine.processor();
    processor.start(guard);
    let state = processor.run().clone();
    assert_eq!(
        state,
        ProcessorState::Error {
            error: RuntimeError::InvalidDispatch {
                neuron: word,
                capability: "int",
            }
        }
    );
    assert_eq!(processor.frame_depth(), 0);
    assert_eq!(processor.stack_depth(), 0);
    assert!(h.engine.locks().status().is_empty());
}

#[test]
fn pause_and_resume_step_through_a_block() {
    let h = Harness::new();
    let b = h.builder();
    let first = h.print_text("1");
    let second = h.print_text("2");
    let root = b.block(vec![first, second]).unwrap();

    let mut processor = h.engine.processor();
    assert_eq!(processor.state(), &ProcessorState::Ready);
    processor.start(root);
    processor.pause();
    assert!(matches!(processor.step(), ProcessorState::Paused { .. }));
    assert!(processor.output().is_empty());

    processor.resume();
    assert_eq!(processor.run(), &ProcessorState::Completed);
    assert_eq!(processor.output(), ["1", "2"]);
}

#[test]
fn trace_records_executed_statements_by_depth() {
    let config = EngineConfig {
        trace_enabled: true,
        ..EngineConfig::default()
    };
    let h = Harness::with(config, |_, _| {});
    let b = h.builder();
    let x = b.variable();
    let one = b.int(1);
    let assign = b.assignment(x, one).unwrap();
    let check = b.boolean(x, Known::Equal, one).unwrap();
    let part = b.part(Some(check), vec![h.print_text("one")]).unwrap();
    let conditional = b.conditional(Known::Normal, vec![part]).unwrap();
    let root = b.block(vec![assign, conditional]).unwrap();

    let mut processor = h.engine.processor();
    processor.start(root);
    processor.run();
    let trace = processor.trace().unwrap();
    insta::assert_snapshot!(render(trace).trim_end(), @r"
    ExpressionsBlock
      Assignment
      ConditionalStatement
          Statement
    ");
}
