//! Processor state machine with step-by-step execution.
//!
//! A [`Processor`] is one thread of execution: a frame stack, an argument
//! stack and an output buffer, running against a shared [`Engine`]. The
//! state transitions are:
//! `Ready -> Running -> (Paused | Completed | Halted | Error)`.
//!
//! Each [`step`](Processor::step) advances the top frame once. Frames that
//! finish are popped; new frames (blocks, loop bodies) are pushed. The run
//! completes when the frame stack empties and halts early when a terminator
//! statement runs.

use synapse_core::{NeuronId, ProcessorId};

use crate::context::ExecContext;
use crate::diagnostics::DiagnosticKind;
use crate::engine::Engine;
use crate::error::RuntimeError;
use crate::frame::{BlockFrame, CallFrame, FrameStep};
use crate::trace::TraceEntry;

/// Execution state of a processor.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorState {
    /// Created, nothing to run yet.
    Ready,
    /// Between steps.
    Running,
    /// Paused after a step; `next` is the neuron owning the top frame.
    Paused { next: NeuronId },
    /// The root statement ran to the end.
    Completed,
    /// A terminator statement stopped the run.
    Halted { at: NeuronId },
    /// A host error aborted the run. All frames (and their locks) are gone.
    Error { error: RuntimeError },
}

pub struct Processor<'e> {
    id: ProcessorId,
    ctx: ExecContext<'e>,
    frames: Vec<CallFrame>,
    state: ProcessorState,
    pause_requested: bool,
}

impl<'e> Processor<'e> {
    pub fn new(engine: &'e Engine) -> Self {
        let id = ProcessorId::new();
        Processor {
            id,
            ctx: ExecContext::new(engine, id),
            frames: Vec::new(),
            state: ProcessorState::Ready,
            pause_requested: false,
        }
    }

    pub fn id(&self) -> ProcessorId {
        self.id
    }

    /// Starts running the statement `root`.
    pub fn start(&mut self, root: NeuronId) {
        self.frames.clear();
        self.ctx.reset();
        self.frames
            .push(CallFrame::Block(BlockFrame::new(root, vec![root], None)));
        self.state = ProcessorState::Running;
        tracing::info!(processor = %self.id, root = %root, "processor started");
    }

    /// Advances the top frame by one step and returns the new state.
    pub fn step(&mut self) -> &ProcessorState {
        match &self.state {
            ProcessorState::Running => {}
            ProcessorState::Paused { .. } => self.state = ProcessorState::Running,
            _ => return &self.state,
        }

        self.ctx.depth = self.frames.len();
        let Some(frame) = self.frames.last_mut() else {
            self.state = ProcessorState::Completed;
            return &self.state;
        };
        let result = frame.step(&mut self.ctx);

        match result {
            Ok(FrameStep::Continue) => {}
            Ok(FrameStep::Push(frame)) => {
                let limit = self.ctx.engine().config().max_frame_depth;
                if self.frames.len() >= limit {
                    return self.fail(RuntimeError::FrameLimitExceeded {
                        neuron: frame.owner(),
                        limit,
                    });
                }
                tracing::debug!(
                    processor = %self.id,
                    frame = frame.name(),
                    owner = %frame.owner(),
                    depth = self.frames.len() + 1,
                    "frame pushed"
                );
                self.frames.push(frame);
            }
            Ok(FrameStep::Done) => {
                if let Some(frame) = self.frames.pop() {
                    tracing::debug!(
                        processor = %self.id,
                        frame = frame.name(),
                        owner = %frame.owner(),
                        "frame popped"
                    );
                }
            }
            Ok(FrameStep::Break) => self.unwind_to_loop(),
            Ok(FrameStep::Exit(at)) => {
                self.frames.clear();
                tracing::info!(processor = %self.id, at = %at, "processor halted");
                self.state = ProcessorState::Halted { at };
                return &self.state;
            }
            Err(error) => return self.fail(error),
        }

        if self.frames.is_empty() {
            tracing::info!(processor = %self.id, "processor completed");
            self.state = ProcessorState::Completed;
        } else if self.pause_requested {
            self.pause_requested = false;
            let next = self.frames.last().map(CallFrame::owner).unwrap_or(NeuronId(0));
            self.state = ProcessorState::Paused { next };
        }
        &self.state
    }

    /// Runs until Completed, Halted, Error, or Paused.
    pub fn run(&mut self) -> &ProcessorState {
        loop {
            self.step();
            if self.state != ProcessorState::Running {
                return &self.state;
            }
        }
    }

    /// Requests a pause after the next step.
    pub fn pause(&mut self) {
        self.pause_requested = true;
    }

    pub fn resume(&mut self) {
        if matches!(self.state, ProcessorState::Paused { .. }) {
            self.state = ProcessorState::Running;
        }
    }

    pub fn state(&self) -> &ProcessorState {
        &self.state
    }

    /// The execution trace, if tracing is enabled.
    pub fn trace(&self) -> Option<&[TraceEntry]> {
        self.ctx.trace()
    }

    pub fn output(&self) -> &[String] {
        self.ctx.output()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn stack_depth(&self) -> usize {
        self.ctx.stack_depth()
    }

    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    /// Pops frames up to the innermost loop and skips that loop to its end.
    fn unwind_to_loop(&mut self) {
        while let Some(top) = self.frames.last_mut() {
            if top.is_loop() {
                tracing::debug!(processor = %self.id, owner = %top.owner(), "loop broken");
                top.finish();
                return;
            }
            self.frames.pop();
        }
        self.ctx.report(
            DiagnosticKind::Invariant,
            "Processor",
            self.ctx.current(),
            "break outside of a loop",
        );
    }

    fn fail(&mut self, error: RuntimeError) -> &ProcessorState {
        tracing::error!(processor = %self.id, %error, "processor aborted");
        self.frames.clear();
        self.ctx.reset();
        self.state = ProcessorState::Error { error };
        &self.state
    }
}

impl std::fmt::Debug for Processor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("frames", &self.frames.len())
            .finish()
    }
}
