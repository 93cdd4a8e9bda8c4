use std::{fmt::Debug, sync::Arc};

use crate::{
    evaluate::{Binding, SharedEvaluator, Value},
    graph::{AggregationKind, Datagraph, EdgeEnd, SubgraphRestriction, TypeCollection},
    math::OrderedSet,
    search::PathSearchError,
    Show,
};

use super::StateId;

/// The direction in which an edge may be traversed by an edge consuming transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    /// Only against the edge direction, i.e. through reversed incidences.
    In,
    /// Only along the edge direction, i.e. through normal incidences.
    Out,
    /// In both directions.
    Any,
}

impl Direction {
    /// Swaps `In` and `Out`, `Any` stays as it is.
    pub fn reversed(self) -> Self {
        match self {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
            Direction::Any => Direction::Any,
        }
    }

    /// Decides whether an incidence with the given orientation may be traversed.
    pub fn admits(self, normal: bool) -> bool {
        match self {
            Direction::In => !normal,
            Direction::Out => normal,
            Direction::Any => true,
        }
    }
}

impl Show for Direction {
    fn show(&self) -> String {
        match self {
            Direction::In => "<--",
            Direction::Out => "-->",
            Direction::Any => "<->",
        }
        .to_string()
    }
}

/// The part of an edge consuming transition that decides whether a concrete edge matches:
/// an allowed direction, a collection of edge types, an optional set of role names and an
/// optional predicate that is evaluated with the candidate edge bound.
pub struct EdgeSymbol<G: Datagraph> {
    direction: Direction,
    types: TypeCollection<G::Type>,
    roles: Option<OrderedSet<String>>,
    role_end: EdgeEnd,
    predicate: Option<SharedEvaluator<G>>,
}

impl<G: Datagraph> EdgeSymbol<G> {
    /// Matches every edge that can be traversed in `direction`.
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            types: TypeCollection::any(),
            roles: None,
            role_end: EdgeEnd::That,
            predicate: None,
        }
    }

    /// Restricts the edge types.
    pub fn with_types(mut self, types: TypeCollection<G::Type>) -> Self {
        self.types = types;
        self
    }

    /// Restricts the role at the far end of the edge to one of the given names.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    /// Requires the given predicate to evaluate to `true`.
    pub fn with_predicate(mut self, predicate: SharedEvaluator<G>) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// The allowed direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The allowed edge types.
    pub fn types(&self) -> &TypeCollection<G::Type> {
        &self.types
    }

    /// The end of the edge at which roles are checked.
    pub fn role_end(&self) -> EdgeEnd {
        self.role_end
    }

    fn reverse(&mut self) {
        self.direction = self.direction.reversed();
        self.role_end = self.role_end.opposite();
    }

    fn equal_symbol(&self, other: &Self) -> bool {
        self.direction == other.direction
            && self.types == other.types
            && self.roles == other.roles
            && self.role_end == other.role_end
            && same_evaluator(self.predicate.as_ref(), other.predicate.as_ref())
    }

    fn accepts(
        &self,
        graph: &G,
        vertex: G::Vertex,
        edge: G::Edge,
        subgraph: Option<&dyn SubgraphRestriction<G>>,
    ) -> Result<bool, PathSearchError> {
        if let Some(subgraph) = subgraph {
            if !subgraph.contains_edge(graph.normal_edge(edge)) {
                return Ok(false);
            }
        }
        if !self.direction.admits(graph.is_normal(edge)) {
            return Ok(false);
        }
        if !self.types.accepts(graph.edge_type(edge)) {
            return Ok(false);
        }
        if let Some(roles) = &self.roles {
            match graph.role(edge, self.role_end) {
                Some(role) if roles.contains(role) => {}
                _ => return Ok(false),
            }
        }
        match &self.predicate {
            Some(predicate) => expect_bool(
                "edge predicate",
                predicate.evaluate(graph, &Binding::edge(vertex, edge))?,
            ),
            None => Ok(true),
        }
    }

    fn label(&self) -> String {
        let mut out = self.direction.show();
        if !self.types.accepts_all() {
            out.push_str(&format!("{:?}", self.types));
        }
        if let Some(roles) = &self.roles {
            out.push_str(&format!(
                "{{{}}}",
                itertools::Itertools::join(&mut roles.iter().map(|r| format!("@{r}")), ", ")
            ));
        }
        if self.predicate.is_some() {
            out.push_str("&{..}");
        }
        out
    }
}

impl<G: Datagraph> Clone for EdgeSymbol<G> {
    fn clone(&self) -> Self {
        Self {
            direction: self.direction,
            types: self.types.clone(),
            roles: self.roles.clone(),
            role_end: self.role_end,
            predicate: self.predicate.clone(),
        }
    }
}

fn same_evaluator<G: Datagraph>(
    left: Option<&SharedEvaluator<G>>,
    right: Option<&SharedEvaluator<G>>,
) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(l), Some(r)) => Arc::ptr_eq(l, r),
        _ => false,
    }
}

fn expect_bool<G: Datagraph>(
    evaluator: &'static str,
    value: Value<G>,
) -> Result<bool, PathSearchError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(PathSearchError::unexpected(evaluator, "boolean", &other)),
    }
}

/// The different kinds of transitions. Edge consuming kinds move the search along an
/// incident edge, the remaining ones test the current vertex and stay on it.
pub enum TransitionKind<G: Datagraph> {
    /// Moves without consuming anything. Only exists in automata under construction.
    Epsilon,
    /// Matches an edge through its [`EdgeSymbol`].
    Simple(EdgeSymbol<G>),
    /// Matches exactly the edge that `edge` evaluates to, ignoring its orientation.
    Edge {
        /// Further restrictions on the edge.
        symbol: EdgeSymbol<G>,
        /// Evaluates to the edge that may be traversed.
        edge: SharedEvaluator<G>,
    },
    /// Matches an edge whose composition kind at `end` is shared or composite.
    Aggregation {
        /// The end that has to be the aggregating one.
        end: EdgeEnd,
        /// Further restrictions on the edge.
        symbol: EdgeSymbol<G>,
    },
    /// Tests that the current vertex equals or is contained in the evaluated value.
    IntermediateVertex(SharedEvaluator<G>),
    /// Tests that the predicate holds for the current vertex.
    BoolExpression(SharedEvaluator<G>),
    /// Tests the runtime type of the current vertex.
    VertexTypeRestriction(TypeCollection<G::Type>),
}

impl<G: Datagraph> TransitionKind<G> {
    /// Returns true for [`TransitionKind::Epsilon`].
    pub fn is_epsilon(&self) -> bool {
        matches!(self, TransitionKind::Epsilon)
    }

    /// Returns true if firing the transition traverses an edge.
    pub fn consumes_edge(&self) -> bool {
        matches!(
            self,
            TransitionKind::Simple(_) | TransitionKind::Edge { .. } | TransitionKind::Aggregation { .. }
        )
    }

    /// Decides whether the transition fires for the current `vertex` and the candidate
    /// `edge`. Edge consuming kinds never fire without an edge, the others ignore it.
    ///
    /// # Panics
    ///
    /// Panics when called on an epsilon transition, these must have been eliminated
    /// before an automaton is interpreted.
    pub fn accepts(
        &self,
        graph: &G,
        vertex: G::Vertex,
        edge: Option<G::Edge>,
        subgraph: Option<&dyn SubgraphRestriction<G>>,
    ) -> Result<bool, PathSearchError> {
        match self {
            TransitionKind::Epsilon => panic!(
                "epsilon transition asked to accept at {vertex:?}, it must not survive into an automaton that is interpreted"
            ),
            TransitionKind::Simple(symbol) => match edge {
                Some(edge) => symbol.accepts(graph, vertex, edge, subgraph),
                None => Ok(false),
            },
            TransitionKind::Edge {
                symbol,
                edge: pinned,
            } => {
                let Some(edge) = edge else {
                    return Ok(false);
                };
                if !symbol.accepts(graph, vertex, edge, subgraph)? {
                    return Ok(false);
                }
                match pinned.evaluate(graph, &Binding::edge(vertex, edge))? {
                    Value::Edge(pinned) => Ok(graph.normal_edge(pinned) == graph.normal_edge(edge)),
                    other => Err(PathSearchError::unexpected("edge expression", "edge", &other)),
                }
            }
            TransitionKind::Aggregation { end, symbol } => {
                let Some(edge) = edge else {
                    return Ok(false);
                };
                if graph.composition_kind(edge, *end) == AggregationKind::None {
                    return Ok(false);
                }
                symbol.accepts(graph, vertex, edge, subgraph)
            }
            TransitionKind::IntermediateVertex(evaluator) => {
                match evaluator.evaluate(graph, &Binding::vertex(vertex))? {
                    Value::Vertex(waypoint) => Ok(waypoint == vertex),
                    Value::Vertices(waypoints) => Ok(waypoints.contains(&vertex)),
                    other => Err(PathSearchError::unexpected(
                        "intermediate vertex expression",
                        "vertex or vertex collection",
                        &other,
                    )),
                }
            }
            TransitionKind::BoolExpression(predicate) => expect_bool(
                "vertex predicate",
                predicate.evaluate(graph, &Binding::vertex(vertex))?,
            ),
            TransitionKind::VertexTypeRestriction(types) => {
                Ok(types.accepts(graph.vertex_type(vertex)))
            }
        }
    }

    /// The vertex the search moves to when the transition fires.
    pub fn next_vertex(&self, graph: &G, vertex: G::Vertex, edge: Option<G::Edge>) -> G::Vertex {
        match (self.consumes_edge(), edge) {
            (true, Some(edge)) => graph.that_vertex(edge),
            _ => vertex,
        }
    }

    /// Compares only what the transitions match on. Evaluators are compared by identity.
    pub fn equal_symbol(&self, other: &Self) -> bool {
        match (self, other) {
            (TransitionKind::Epsilon, TransitionKind::Epsilon) => true,
            (TransitionKind::Simple(l), TransitionKind::Simple(r)) => l.equal_symbol(r),
            (
                TransitionKind::Edge { symbol: ls, edge: le },
                TransitionKind::Edge { symbol: rs, edge: re },
            ) => Arc::ptr_eq(le, re) && ls.equal_symbol(rs),
            (
                TransitionKind::Aggregation { end: le, symbol: ls },
                TransitionKind::Aggregation { end: re, symbol: rs },
            ) => le == re && ls.equal_symbol(rs),
            (TransitionKind::IntermediateVertex(l), TransitionKind::IntermediateVertex(r))
            | (TransitionKind::BoolExpression(l), TransitionKind::BoolExpression(r)) => {
                Arc::ptr_eq(l, r)
            }
            (
                TransitionKind::VertexTypeRestriction(l),
                TransitionKind::VertexTypeRestriction(r),
            ) => l == r,
            _ => false,
        }
    }

    /// Flips the direction semantics so that the transition matches the same edges when
    /// they are walked the other way round.
    pub fn reverse(&mut self) {
        match self {
            TransitionKind::Simple(symbol) | TransitionKind::Edge { symbol, .. } => symbol.reverse(),
            TransitionKind::Aggregation { end, symbol } => {
                *end = end.opposite();
                symbol.reverse();
            }
            TransitionKind::Epsilon
            | TransitionKind::IntermediateVertex(_)
            | TransitionKind::BoolExpression(_)
            | TransitionKind::VertexTypeRestriction(_) => {}
        }
    }

    /// The direction filter of edge consuming kinds.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            TransitionKind::Simple(symbol)
            | TransitionKind::Edge { symbol, .. }
            | TransitionKind::Aggregation { symbol, .. } => Some(symbol.direction()),
            _ => None,
        }
    }
}

impl<G: Datagraph> Clone for TransitionKind<G> {
    fn clone(&self) -> Self {
        match self {
            TransitionKind::Epsilon => TransitionKind::Epsilon,
            TransitionKind::Simple(symbol) => TransitionKind::Simple(symbol.clone()),
            TransitionKind::Edge { symbol, edge } => TransitionKind::Edge {
                symbol: symbol.clone(),
                edge: Arc::clone(edge),
            },
            TransitionKind::Aggregation { end, symbol } => TransitionKind::Aggregation {
                end: *end,
                symbol: symbol.clone(),
            },
            TransitionKind::IntermediateVertex(e) => TransitionKind::IntermediateVertex(Arc::clone(e)),
            TransitionKind::BoolExpression(e) => TransitionKind::BoolExpression(Arc::clone(e)),
            TransitionKind::VertexTypeRestriction(types) => {
                TransitionKind::VertexTypeRestriction(types.clone())
            }
        }
    }
}

impl<G: Datagraph> Show for TransitionKind<G> {
    fn show(&self) -> String {
        match self {
            TransitionKind::Epsilon => "ε".to_string(),
            TransitionKind::Simple(symbol) => symbol.label(),
            TransitionKind::Edge { symbol, .. } => format!("{}[edge]", symbol.label()),
            TransitionKind::Aggregation { end, symbol } => {
                let arrow = match end {
                    EdgeEnd::This => "<>--",
                    EdgeEnd::That => "--<>",
                };
                format!("{arrow}{}", &symbol.label()[3..])
            }
            TransitionKind::IntermediateVertex(_) => "[waypoint]".to_string(),
            TransitionKind::BoolExpression(_) => "&{..}".to_string(),
            TransitionKind::VertexTypeRestriction(types) => format!("&{types:?}"),
        }
    }
}

impl<G: Datagraph> Debug for TransitionKind<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.show())
    }
}

/// An arc between two states of a [`super::FiniteAutomaton`]. The start and end states
/// are back references into the arena of the automaton, which keeps the transition listed
/// in the out-list of its start and the in-list of its end state.
pub struct Transition<G: Datagraph> {
    pub(super) start: StateId,
    pub(super) end: StateId,
    pub(super) kind: TransitionKind<G>,
}

impl<G: Datagraph> Transition<G> {
    /// The state the transition leaves.
    pub fn start_state(&self) -> StateId {
        self.start
    }

    /// The state the transition enters.
    pub fn end_state(&self) -> StateId {
        self.end
    }

    /// What the transition matches on.
    pub fn kind(&self) -> &TransitionKind<G> {
        &self.kind
    }

    /// See [`TransitionKind::is_epsilon`].
    pub fn is_epsilon(&self) -> bool {
        self.kind.is_epsilon()
    }

    /// See [`TransitionKind::accepts`].
    pub fn accepts(
        &self,
        graph: &G,
        vertex: G::Vertex,
        edge: Option<G::Edge>,
        subgraph: Option<&dyn SubgraphRestriction<G>>,
    ) -> Result<bool, PathSearchError> {
        self.kind.accepts(graph, vertex, edge, subgraph)
    }

    /// See [`TransitionKind::next_vertex`].
    pub fn next_vertex(&self, graph: &G, vertex: G::Vertex, edge: Option<G::Edge>) -> G::Vertex {
        self.kind.next_vertex(graph, vertex, edge)
    }

    /// See [`TransitionKind::equal_symbol`].
    pub fn equal_symbol(&self, other: &Self) -> bool {
        self.kind.equal_symbol(&other.kind)
    }
}

impl<G: Datagraph> Clone for Transition<G> {
    fn clone(&self) -> Self {
        Self {
            start: self.start,
            end: self.end,
            kind: self.kind.clone(),
        }
    }
}

impl<G: Datagraph> Debug for Transition<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, {}, {:?})", self.start, self.kind.show(), self.end)
    }
}
