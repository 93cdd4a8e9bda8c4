//! Externally evaluated expressions that transitions consult while a search runs.
//!
//! The automaton does not know anything about the expression language of the query
//! that it was compiled from. Predicates, pinned edges and waypoint sets are handed to it
//! as opaque [`Evaluator`]s, which produce a [`Value`] for the current [`Binding`].
use std::{fmt::Debug, sync::Arc};

use thiserror::Error;

use crate::graph::Datagraph;

/// Error raised by an external evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("evaluation failed: {message}")]
pub struct EvaluationError {
    message: String,
}

impl EvaluationError {
    /// Creates a new error with the given message.
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message describing the failure.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The result of evaluating an expression.
pub enum Value<G: Datagraph> {
    /// A truth value, produced by predicates.
    Bool(bool),
    /// A single vertex.
    Vertex(G::Vertex),
    /// A single edge.
    Edge(G::Edge),
    /// A collection of vertices.
    Vertices(Vec<G::Vertex>),
    /// The undefined value.
    Null,
    /// Anything else, carried as a textual description for error reporting.
    Other(String),
}

impl<G: Datagraph> Value<G> {
    /// A short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Vertex(_) => "vertex",
            Value::Edge(_) => "edge",
            Value::Vertices(_) => "vertex collection",
            Value::Null => "null",
            Value::Other(_) => "other value",
        }
    }
}

impl<G: Datagraph> Clone for Value<G> {
    fn clone(&self) -> Self {
        match self {
            Value::Bool(b) => Value::Bool(*b),
            Value::Vertex(v) => Value::Vertex(*v),
            Value::Edge(e) => Value::Edge(*e),
            Value::Vertices(vs) => Value::Vertices(vs.clone()),
            Value::Null => Value::Null,
            Value::Other(s) => Value::Other(s.clone()),
        }
    }
}

impl<G: Datagraph> Debug for Value<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Vertex(v) => write!(f, "{v:?}"),
            Value::Edge(e) => write!(f, "{e:?}"),
            Value::Vertices(vs) => write!(f, "{vs:?}"),
            Value::Null => write!(f, "null"),
            Value::Other(s) => write!(f, "{s}"),
        }
    }
}

/// The variables an evaluator may refer to: the vertex the search currently sits on and,
/// for edge consuming transitions, the edge that is about to be traversed.
pub struct Binding<G: Datagraph> {
    /// The current vertex.
    pub vertex: G::Vertex,
    /// The candidate edge, `None` if the transition does not consume an edge.
    pub edge: Option<G::Edge>,
}

impl<G: Datagraph> Binding<G> {
    /// Binds only a vertex.
    pub fn vertex(vertex: G::Vertex) -> Self {
        Self { vertex, edge: None }
    }

    /// Binds a vertex together with a candidate edge.
    pub fn edge(vertex: G::Vertex, edge: G::Edge) -> Self {
        Self {
            vertex,
            edge: Some(edge),
        }
    }
}

impl<G: Datagraph> Debug for Binding<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.edge {
            Some(edge) => write!(f, "[{:?}, {:?}]", self.vertex, edge),
            None => write!(f, "[{:?}]", self.vertex),
        }
    }
}

/// An externally evaluated expression. Implementations must be shareable across threads,
/// because a built automaton may be interpreted by several searches concurrently.
pub trait Evaluator<G: Datagraph>: Send + Sync {
    /// Evaluates the expression on `graph` for the given binding.
    fn evaluate(&self, graph: &G, binding: &Binding<G>) -> Result<Value<G>, EvaluationError>;
}

impl<G, F> Evaluator<G> for F
where
    G: Datagraph,
    F: Fn(&G, &Binding<G>) -> Result<Value<G>, EvaluationError> + Send + Sync,
{
    fn evaluate(&self, graph: &G, binding: &Binding<G>) -> Result<Value<G>, EvaluationError> {
        self(graph, binding)
    }
}

/// An evaluator as it is stored in transitions. Two transitions refer to the same
/// expression only if they hold the same allocation.
pub type SharedEvaluator<G> = Arc<dyn Evaluator<G>>;

/// Wraps a closure into a [`SharedEvaluator`].
pub fn shared<G, F>(f: F) -> SharedEvaluator<G>
where
    G: Datagraph,
    F: Fn(&G, &Binding<G>) -> Result<Value<G>, EvaluationError> + Send + Sync + 'static,
{
    Arc::new(f)
}
