//! Call frames: the resumable units of execution on a processor's stack.
//!
//! Every construct that runs more than one statement is a frame. The
//! processor asks the top frame to advance one step; the frame runs its next
//! statement or tests its next condition and answers with a [`FrameStep`].
//! Loops never iterate inline: a loop frame pushes a block frame per
//! iteration and is stepped again once the block is done, so the processor
//! loop stays flat however deeply scripts nest.
//!
//! Frames own their state (statement cursor, iteration cursor, held locks);
//! dropping a frame releases its locks.

use std::fmt;
use std::sync::Arc;

use synapse_core::{HeldLocks, NeuronId, Value};

use crate::context::ExecContext;
use crate::error::RuntimeError;
use crate::expr::boolean;
use crate::source::{RowCursor, RowSource};

/// Outcome of executing one statement.
#[derive(Debug)]
pub enum Step {
    Done,
    Push(CallFrame),
    Break,
    /// A terminator statement ran.
    Exit(NeuronId),
}

/// Outcome of advancing a frame.
#[derive(Debug)]
pub enum FrameStep {
    Continue,
    Push(CallFrame),
    /// The frame has finished and can be popped.
    Done,
    Break,
    Exit(NeuronId),
}

impl From<Step> for FrameStep {
    fn from(step: Step) -> Self {
        match step {
            Step::Done => FrameStep::Continue,
            Step::Push(frame) => FrameStep::Push(frame),
            Step::Break => FrameStep::Break,
            Step::Exit(at) => FrameStep::Exit(at),
        }
    }
}

/// One conditional part: an optional condition and its statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub part: NeuronId,
    /// `None` is an else clause.
    pub condition: Option<NeuronId>,
    pub statements: Vec<NeuronId>,
}

impl Clause {
    fn holds(&self, ctx: &mut ExecContext<'_>) -> Result<bool, RuntimeError> {
        match self.condition {
            None => Ok(true),
            Some(condition) => ctx.test_condition(condition),
        }
    }

    fn body(&self) -> CallFrame {
        CallFrame::Block(BlockFrame::new(self.part, self.statements.clone(), None))
    }
}

#[derive(Debug)]
pub enum CallFrame {
    Block(BlockFrame),
    If(IfFrame),
    Case(CaseFrame),
    Loop(LoopFrame),
    Until(UntilFrame),
    ForEach(ForEachFrame),
    Query(QueryFrame),
}

impl CallFrame {
    /// The neuron that opened this frame.
    pub fn owner(&self) -> NeuronId {
        match self {
            CallFrame::Block(f) => f.owner,
            CallFrame::If(f) => f.owner,
            CallFrame::Case(f) => f.owner,
            CallFrame::Loop(f) => f.owner,
            CallFrame::Until(f) => f.owner,
            CallFrame::ForEach(f) => f.owner,
            CallFrame::Query(f) => f.owner,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CallFrame::Block(_) => "block",
            CallFrame::If(_) => "if",
            CallFrame::Case(f) if f.looped => "case-loop",
            CallFrame::Case(_) => "case",
            CallFrame::Loop(_) => "loop",
            CallFrame::Until(_) => "until",
            CallFrame::ForEach(_) => "for-each",
            CallFrame::Query(_) => "query",
        }
    }

    /// Loop frames are the targets of `break`.
    pub fn is_loop(&self) -> bool {
        match self {
            CallFrame::Block(_) | CallFrame::If(_) => false,
            CallFrame::Case(f) => f.looped,
            CallFrame::Loop(_)
            | CallFrame::Until(_)
            | CallFrame::ForEach(_)
            | CallFrame::Query(_) => true,
        }
    }

    pub(crate) fn step(&mut self, ctx: &mut ExecContext<'_>) -> Result<FrameStep, RuntimeError> {
        match self {
            CallFrame::Block(f) => f.step(ctx),
            CallFrame::If(f) => f.step(ctx),
            CallFrame::Case(f) => f.step(ctx),
            CallFrame::Loop(f) => f.step(ctx),
            CallFrame::Until(f) => f.step(ctx),
            CallFrame::ForEach(f) => f.step(ctx),
            CallFrame::Query(f) => f.step(ctx),
        }
    }

    /// Skips to the end; the next step reports the frame as done.
    pub(crate) fn finish(&mut self) {
        match self {
            CallFrame::Block(f) => f.next = f.statements.len(),
            CallFrame::If(f) => f.taken = true,
            CallFrame::Case(f) => f.finished = true,
            CallFrame::Loop(f) => f.finished = true,
            CallFrame::Until(f) => f.finished = true,
            CallFrame::ForEach(f) => f.next = f.items.len(),
            CallFrame::Query(f) => f.source.goto_end(f.cursor.as_mut()),
        }
    }
}

/// A statement list, optionally run under a batch of locks.
#[derive(Debug)]
pub struct BlockFrame {
    owner: NeuronId,
    statements: Vec<NeuronId>,
    next: usize,
    _locks: Option<HeldLocks>,
}

impl BlockFrame {
    pub fn new(owner: NeuronId, statements: Vec<NeuronId>, locks: Option<HeldLocks>) -> Self {
        BlockFrame {
            owner,
            statements,
            next: 0,
            _locks: locks,
        }
    }

    fn step(&mut self, ctx: &mut ExecContext<'_>) -> Result<FrameStep, RuntimeError> {
        let Some(&statement) = self.statements.get(self.next) else {
            return Ok(FrameStep::Done);
        };
        self.next += 1;
        Ok(ctx.execute(statement)?.into())
    }
}

/// If / else-if / else: runs the first clause whose condition holds.
#[derive(Debug)]
pub struct IfFrame {
    owner: NeuronId,
    clauses: Vec<Clause>,
    next: usize,
    taken: bool,
}

impl IfFrame {
    pub fn new(owner: NeuronId, clauses: Vec<Clause>) -> Self {
        IfFrame {
            owner,
            clauses,
            next: 0,
            taken: false,
        }
    }

    fn step(&mut self, ctx: &mut ExecContext<'_>) -> Result<FrameStep, RuntimeError> {
        if self.taken {
            return Ok(FrameStep::Done);
        }
        while let Some(clause) = self.clauses.get(self.next) {
            self.next += 1;
            if clause.holds(ctx)? {
                self.taken = true;
                return Ok(FrameStep::Push(clause.body()));
            }
        }
        Ok(FrameStep::Done)
    }
}

/// Runs the first clause whose condition equals the case item. The looped
/// form re-evaluates the item and starts over after every match.
#[derive(Debug)]
pub struct CaseFrame {
    owner: NeuronId,
    item: NeuronId,
    clauses: Vec<Clause>,
    looped: bool,
    next: usize,
    value: Option<Vec<Value>>,
    matched: bool,
    finished: bool,
}

impl CaseFrame {
    pub fn new(owner: NeuronId, item: NeuronId, clauses: Vec<Clause>, looped: bool) -> Self {
        CaseFrame {
            owner,
            item,
            clauses,
            looped,
            next: 0,
            value: None,
            matched: false,
            finished: false,
        }
    }

    fn step(&mut self, ctx: &mut ExecContext<'_>) -> Result<FrameStep, RuntimeError> {
        if self.finished {
            return Ok(FrameStep::Done);
        }
        if self.matched {
            if !self.looped {
                return Ok(FrameStep::Done);
            }
            self.matched = false;
            self.next = 0;
            self.value = None;
        }
        let value = match self.value.take() {
            Some(value) => value,
            None => ctx.operand_values(self.item)?,
        };
        let mut hit = None;
        while let Some(clause) = self.clauses.get(self.next) {
            self.next += 1;
            let matches = match clause.condition {
                None => true,
                Some(condition) => {
                    let candidate = ctx.operand_values(condition)?;
                    boolean::lists_equal(ctx.graph(), &value, &candidate)
                }
            };
            if matches {
                hit = Some(clause.body());
                break;
            }
        }
        self.value = Some(value);
        Ok(match hit {
            Some(body) => {
                self.matched = true;
                FrameStep::Push(body)
            }
            None => FrameStep::Done,
        })
    }
}

/// Repeats an if-chain until no clause holds.
#[derive(Debug)]
pub struct LoopFrame {
    owner: NeuronId,
    clauses: Vec<Clause>,
    next: usize,
    finished: bool,
}

impl LoopFrame {
    pub fn new(owner: NeuronId, clauses: Vec<Clause>) -> Self {
        LoopFrame {
            owner,
            clauses,
            next: 0,
            finished: false,
        }
    }

    fn step(&mut self, ctx: &mut ExecContext<'_>) -> Result<FrameStep, RuntimeError> {
        if self.finished {
            return Ok(FrameStep::Done);
        }
        while let Some(clause) = self.clauses.get(self.next) {
            self.next += 1;
            if clause.holds(ctx)? {
                self.next = 0;
                return Ok(FrameStep::Push(clause.body()));
            }
        }
        Ok(FrameStep::Done)
    }
}

/// Runs the body, then tests the condition; stops once it holds.
#[derive(Debug)]
pub struct UntilFrame {
    owner: NeuronId,
    clause: Clause,
    started: bool,
    finished: bool,
}

impl UntilFrame {
    pub fn new(owner: NeuronId, clause: Clause) -> Self {
        UntilFrame {
            owner,
            clause,
            started: false,
            finished: false,
        }
    }

    fn step(&mut self, ctx: &mut ExecContext<'_>) -> Result<FrameStep, RuntimeError> {
        if self.finished {
            return Ok(FrameStep::Done);
        }
        if !self.started {
            self.started = true;
            return Ok(FrameStep::Push(self.clause.body()));
        }
        let done = match self.clause.condition {
            None => true,
            Some(condition) => ctx.test_condition(condition)?,
        };
        if done {
            self.finished = true;
            Ok(FrameStep::Done)
        } else {
            Ok(FrameStep::Push(self.clause.body()))
        }
    }
}

/// Binds the loop variable to each element of a precomputed list.
#[derive(Debug)]
pub struct ForEachFrame {
    owner: NeuronId,
    variable: NeuronId,
    items: Vec<Value>,
    next: usize,
    clause: Clause,
}

impl ForEachFrame {
    pub fn new(owner: NeuronId, variable: NeuronId, items: Vec<Value>, clause: Clause) -> Self {
        ForEachFrame {
            owner,
            variable,
            items,
            next: 0,
            clause,
        }
    }

    fn step(&mut self, ctx: &mut ExecContext<'_>) -> Result<FrameStep, RuntimeError> {
        let Some(item) = self.items.get(self.next).cloned() else {
            return Ok(FrameStep::Done);
        };
        self.next += 1;
        ctx.graph().set_values(self.variable, vec![item])?;
        Ok(FrameStep::Push(self.clause.body()))
    }
}

/// Binds the loop variable to each row pulled from a source.
pub struct QueryFrame {
    owner: NeuronId,
    variable: NeuronId,
    source: Arc<dyn RowSource>,
    cursor: Box<dyn RowCursor>,
    clause: Clause,
}

impl QueryFrame {
    pub fn new(
        owner: NeuronId,
        variable: NeuronId,
        source: Arc<dyn RowSource>,
        cursor: Box<dyn RowCursor>,
        clause: Clause,
    ) -> Self {
        QueryFrame {
            owner,
            variable,
            source,
            cursor,
            clause,
        }
    }

    /// A frame over the same source continuing from the same row.
    pub fn duplicate(&self) -> QueryFrame {
        QueryFrame {
            owner: self.owner,
            variable: self.variable,
            source: Arc::clone(&self.source),
            cursor: self.source.duplicate(self.cursor.as_ref()),
            clause: self.clause.clone(),
        }
    }

    fn step(&mut self, ctx: &mut ExecContext<'_>) -> Result<FrameStep, RuntimeError> {
        let Some(row) = self.cursor.next_row() else {
            return Ok(FrameStep::Done);
        };
        ctx.graph().set_values(self.variable, row.into_vec())?;
        Ok(FrameStep::Push(self.clause.body()))
    }
}

impl fmt::Debug for QueryFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryFrame")
            .field("owner", &self.owner)
            .field("variable", &self.variable)
            .field("clause", &self.clause)
            .finish_non_exhaustive()
    }
}
