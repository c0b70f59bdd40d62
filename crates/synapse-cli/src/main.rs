//! Synapse graph interpreter CLI.
//!
//! Provides the `synapse` binary, which builds one of the demo programs
//! in a fresh neuron graph and runs it on one or more processors. Output
//! lines go to stdout; diagnostics and, with `--trace`, the execution trace
//! go to stderr.

mod demos;

use std::process;
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use synapse_core::{NeuronGraph, NeuronId};
use synapse_exec::trace::render;
use synapse_exec::{
    load_code, Engine, EngineConfig, GraphBuilder, InstructionSet, MemorySink, Processor,
    ProcessorState,
};

/// Synapse graph interpreter.
#[derive(Parser)]
#[command(name = "synapse", about = "Run demo programs on the synapse graph interpreter")]
struct Cli {
    /// Log filter, e.g. `debug` or `synapse_exec=trace` (default: RUST_LOG).
    #[arg(long, global = true)]
    log: Option<String>,

    /// Print the execution trace of every processor.
    #[arg(long, global = true)]
    trace: bool,

    /// Print traces and diagnostics as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available demos.
#[derive(Subcommand)]
enum Commands {
    /// Count from 0 with a looped conditional.
    Count {
        /// Stop before this number.
        #[arg(long, default_value_t = 5)]
        to: i64,
    },
    /// Iterate the items of a cluster with a for-each loop.
    Foreach {
        /// Comma-separated items.
        #[arg(long, value_delimiter = ',', default_value = "alpha,beta,gamma")]
        items: Vec<String>,
    },
    /// Increment a shared counter from several processors under a lock.
    Locks {
        /// Number of concurrent processors.
        #[arg(short, long, default_value_t = 4)]
        threads: usize,

        /// Increments per processor.
        #[arg(short, long, default_value_t = 100)]
        rounds: i64,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());

    let config = EngineConfig {
        trace_enabled: cli.trace,
        ..EngineConfig::default()
    };
    let graph = Arc::new(NeuronGraph::new());
    let instructions = InstructionSet::standard(&graph);
    let sink = Arc::new(MemorySink::new());
    let engine = Engine::new(graph, instructions, config).with_sink(sink.clone());
    let report = Report {
        json: cli.json,
        sink: &sink,
    };

    let exit_code = match cli.command {
        Commands::Count { to } => run_single(&engine, &report, demos::count(&engine, to)),
        Commands::Foreach { items } => {
            run_single(&engine, &report, demos::foreach(&engine, &items))
        }
        Commands::Locks { threads, rounds } => run_locks(&engine, &report, threads, rounds),
    };
    process::exit(exit_code);
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs a demo program on one processor.
///
/// Returns exit code: 0 = success, 1 = runtime error, 2 = diagnostics were
/// reported.
fn run_single(
    engine: &Engine,
    report: &Report<'_>,
    root: Result<NeuronId, synapse_exec::RuntimeError>,
) -> i32 {
    let root = match root {
        Ok(root) => root,
        Err(e) => {
            eprintln!("Error: failed to build the program: {}", e);
            return 1;
        }
    };
    if let Err(e) = load_code(engine, root) {
        eprintln!("Error: failed to load the program: {}", e);
        return 1;
    }

    let mut processor = engine.processor();
    processor.start(root);
    processor.run();
    for line in processor.output() {
        println!("{}", line);
    }
    report.trace(None, &processor);
    report.finish(processor.state())
}

/// Runs `threads` workers against one shared counter and prints its final
/// value.
fn run_locks(engine: &Engine, report: &Report<'_>, threads: usize, rounds: i64) -> i32 {
    tracing::info!(threads, rounds, "starting lock demo");
    let counter = GraphBuilder::new(engine.graph()).int(0);
    let mut roots = Vec::with_capacity(threads);
    for _ in 0..threads {
        match demos::locked_worker(engine, counter, rounds) {
            Ok(root) => roots.push(root),
            Err(e) => {
                eprintln!("Error: failed to build the program: {}", e);
                return 1;
            }
        }
    }

    let states: Vec<ProcessorState> = thread::scope(|scope| {
        let handles: Vec<_> = roots
            .iter()
            .enumerate()
            .map(|(n, &root)| {
                scope.spawn(move || {
                    let mut processor = engine.processor();
                    processor.start(root);
                    processor.run();
                    report.trace(Some(n), &processor);
                    processor.state().clone()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| ProcessorState::Error {
                    error: synapse_exec::RuntimeError::Internal {
                        message: "worker thread panicked".into(),
                    },
                })
            })
            .collect()
    });

    let total = engine.graph().get(counter).and_then(|n| n.int());
    match total {
        Some(total) => println!("counter = {} (expected {})", total, threads as i64 * rounds),
        None => println!("counter = <missing>"),
    }
    states
        .iter()
        .map(|state| report.finish(state))
        .max()
        .unwrap_or(0)
}

/// Where traces and diagnostics are written.
struct Report<'a> {
    json: bool,
    sink: &'a MemorySink,
}

impl Report<'_> {
    fn trace(&self, worker: Option<usize>, processor: &Processor<'_>) {
        let Some(trace) = processor.trace() else {
            return;
        };
        if self.json {
            match serde_json::to_string(trace) {
                Ok(json) => eprintln!("{}", json),
                Err(e) => eprintln!("Error: failed to serialize trace: {}", e),
            }
            return;
        }
        match worker {
            Some(n) => eprintln!("-- trace of worker {} --", n),
            None => eprintln!("-- trace --"),
        }
        eprint!("{}", render(trace));
    }

    /// Prints the collected diagnostics and maps the final state to an exit
    /// code.
    fn finish(&self, state: &ProcessorState) -> i32 {
        let diagnostics = self.sink.take();
        for diagnostic in &diagnostics {
            if self.json {
                match serde_json::to_string(diagnostic) {
                    Ok(json) => eprintln!("{}", json),
                    Err(e) => eprintln!("Error: failed to serialize diagnostic: {}", e),
                }
            } else {
                eprintln!("  - {}", diagnostic);
            }
        }
        match state {
            ProcessorState::Error { error } => {
                eprintln!("Runtime error: {}", error);
                1
            }
            _ if !diagnostics.is_empty() => 2,
            _ => 0,
        }
    }
}
