//! Helper for producing well-formed expression subgraphs.
//!
//! Front ends that compile scripts into the graph must link every
//! expression with the meanings its WorkData expects. [`GraphBuilder`]
//! emits exactly those links. Methods that only create a neuron are
//! infallible; methods that link existing neurons fail if an operand does
//! not exist.

use synapse_core::{CoreError, ExpressionKind, Known, NeuronGraph, NeuronId, Prototype};

pub struct GraphBuilder<'g> {
    graph: &'g NeuronGraph,
}

impl<'g> GraphBuilder<'g> {
    pub fn new(graph: &'g NeuronGraph) -> Self {
        GraphBuilder { graph }
    }

    pub fn graph(&self) -> &'g NeuronGraph {
        self.graph
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    pub fn neuron(&self) -> NeuronId {
        self.graph.add(Prototype::Neuron)
    }

    pub fn int(&self, value: i64) -> NeuronId {
        self.graph.add(Prototype::Int(value))
    }

    pub fn double(&self, value: f64) -> NeuronId {
        self.graph.add(Prototype::Double(value))
    }

    pub fn text(&self, value: impl Into<String>) -> NeuronId {
        self.graph.add(Prototype::Text(value.into()))
    }

    pub fn variable(&self) -> NeuronId {
        self.graph.add(Prototype::Variable { by_ref: false })
    }

    /// A variable that stores a reference when assigned another variable.
    pub fn variable_by_ref(&self) -> NeuronId {
        self.graph.add(Prototype::Variable { by_ref: true })
    }

    pub fn cluster(&self, meaning: Known, children: Vec<NeuronId>) -> NeuronId {
        self.graph.add_cluster(meaning.id(), children)
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn expression(&self, kind: ExpressionKind, links: &[(Known, NeuronId)]) -> Result<NeuronId, CoreError> {
        let id = self.graph.add(Prototype::Expression(kind));
        for (meaning, target) in links {
            self.graph.add_link(id, *target, meaning.id())?;
        }
        Ok(id)
    }

    pub fn assignment(&self, left: NeuronId, right: NeuronId) -> Result<NeuronId, CoreError> {
        self.expression(
            ExpressionKind::Assignment,
            &[(Known::LeftPart, left), (Known::RightPart, right)],
        )
    }

    pub fn boolean(&self, left: NeuronId, operator: Known, right: NeuronId) -> Result<NeuronId, CoreError> {
        self.expression(
            ExpressionKind::Bool,
            &[
                (Known::LeftPart, left),
                (Known::Operator, operator.id()),
                (Known::RightPart, right),
            ],
        )
    }

    /// A BoolExpression with missing operands, as a malformed producer
    /// might emit.
    pub fn partial_boolean(
        &self,
        left: Option<NeuronId>,
        operator: Known,
        right: Option<NeuronId>,
    ) -> Result<NeuronId, CoreError> {
        let mut links = vec![(Known::Operator, operator.id())];
        links.extend(left.map(|l| (Known::LeftPart, l)));
        links.extend(right.map(|r| (Known::RightPart, r)));
        self.expression(ExpressionKind::Bool, &links)
    }

    pub fn statement(&self, instruction: NeuronId, args: Vec<NeuronId>) -> Result<NeuronId, CoreError> {
        self.call(ExpressionKind::Statement, instruction, args)
    }

    pub fn result_statement(&self, instruction: NeuronId, args: Vec<NeuronId>) -> Result<NeuronId, CoreError> {
        self.call(ExpressionKind::ResultStatement, instruction, args)
    }

    fn call(&self, kind: ExpressionKind, instruction: NeuronId, args: Vec<NeuronId>) -> Result<NeuronId, CoreError> {
        self.check_all(&args)?;
        let arguments = self.cluster(Known::Arguments, args);
        self.expression(
            kind,
            &[(Known::Instruction, instruction), (Known::Arguments, arguments)],
        )
    }

    pub fn by_ref(&self, argument: NeuronId) -> Result<NeuronId, CoreError> {
        self.expression(ExpressionKind::ByRef, &[(Known::Argument, argument)])
    }

    pub fn block(&self, statements: Vec<NeuronId>) -> Result<NeuronId, CoreError> {
        let statements = self.statements(statements)?;
        self.expression(ExpressionKind::Block, &[(Known::Statements, statements)])
    }

    /// A block that runs while holding whole-neuron locks on `neurons` and
    /// link locks on the `(from, to)` pairs in `links`.
    pub fn lock(
        &self,
        neurons: Vec<NeuronId>,
        links: Vec<NeuronId>,
        statements: Vec<NeuronId>,
    ) -> Result<NeuronId, CoreError> {
        self.check_all(&neurons)?;
        self.check_all(&links)?;
        let statements = self.statements(statements)?;
        let neurons = self.cluster(Known::NeuronsToLock, neurons);
        let links = self.cluster(Known::LinksToLock, links);
        self.expression(
            ExpressionKind::Lock,
            &[
                (Known::Statements, statements),
                (Known::NeuronsToLock, neurons),
                (Known::LinksToLock, links),
            ],
        )
    }

    /// A conditional part; `None` makes it an else clause.
    pub fn part(&self, condition: Option<NeuronId>, statements: Vec<NeuronId>) -> Result<NeuronId, CoreError> {
        let statements = self.statements(statements)?;
        let mut links = vec![(Known::Statements, statements)];
        if let Some(condition) = condition {
            links.push((Known::Condition, condition));
        }
        self.expression(ExpressionKind::ConditionalPart, &links)
    }

    pub fn conditional(&self, style: Known, parts: Vec<NeuronId>) -> Result<NeuronId, CoreError> {
        self.conditional_with(style, parts, None, None)
    }

    /// A conditional with the loop variable (ForEach and query loops) or
    /// the case item (Case styles).
    pub fn conditional_with(
        &self,
        style: Known,
        parts: Vec<NeuronId>,
        loop_item: Option<NeuronId>,
        case_item: Option<NeuronId>,
    ) -> Result<NeuronId, CoreError> {
        self.check_all(&parts)?;
        let conditions = self.cluster(Known::Conditions, parts);
        let mut links = vec![(Known::Conditions, conditions), (Known::LoopStyle, style.id())];
        if let Some(item) = loop_item {
            links.push((Known::LoopItem, item));
        }
        if let Some(item) = case_item {
            links.push((Known::CaseItem, item));
        }
        self.expression(ExpressionKind::Conditional, &links)
    }

    fn statements(&self, statements: Vec<NeuronId>) -> Result<NeuronId, CoreError> {
        self.check_all(&statements)?;
        Ok(self.cluster(Known::Statements, statements))
    }

    fn check_all(&self, ids: &[NeuronId]) -> Result<(), CoreError> {
        for &id in ids {
            self.graph.by_id(id)?;
        }
        Ok(())
    }
}
