//! Library for evaluating regular path descriptions over typed datagraphs.
//!
//! A path description is a regular expression over traversal steps, for example "follow
//! an edge of type `A` forward, then any number of edges in either direction, and end on a
//! vertex of type `B`". Such a description is compiled bottom up into an [`Nfa`]: atomic
//! steps become two state automata and the operators of the description algebra (sequence,
//! alternative, option, iteration, exponentiation, transposition, waypoints and start/goal
//! restrictions) combine them, introducing epsilon transitions at the seams. The [`Nfa`] is
//! then reduced to a [`Dfa`] by eliminating the epsilon transitions and merging the
//! destinations of transitions that match on equal symbols.
//!
//! The resulting automaton is interpreted on a [`Datagraph`] by a [`PathSearch`], which walks
//! the graph breadth first over pairs of vertices and automaton states. It can compute
//! - the set of vertices reachable by a matching path ([`PathSearch::vertex_set`]),
//! - a [`PathSystem`], recording for every visited pair how it was reached, from which the
//!   matching paths can be reconstructed ([`PathSearch::path_system`]),
//! - a [`Slice`], the union of all matching paths that start in one of several criterion
//!   vertices ([`PathSearch::slice`]).
//!
//! Transitions may consult externally evaluated expressions (predicates, pinned edges or
//! waypoint sets), these are passed in as [`evaluate::Evaluator`]s. An automaton holds no
//! per-search state, so one automaton can be interpreted by several searches concurrently.
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The prelude is supposed to make using this package easier. Including everything, i.e.
/// `use path_automata::prelude::*;` should be enough to use the package.
pub mod prelude {
    pub use super::{
        automaton::{
            ConstructionError, Dfa, DfaCache, Direction, EdgeSymbol, FiniteAutomaton, Nfa,
            StateId, Transition, TransitionKind,
        },
        evaluate::{shared, Binding, EvaluationError, Evaluator, SharedEvaluator, Value},
        graph::{
            AggregationKind, Datagraph, EdgeEnd, SchemaType, SimpleGraph, SubgraphRestriction,
            TypeCollection,
        },
        math,
        search::{Path, PathSearch, PathSearchEntry, PathSearchError, PathSystem, Slice},
        Show,
    };
}

/// This module contains type aliases for the collections which are used throughout the crate.
pub mod math;

/// Defines the graph collaborator contract and a simple in-memory graph.
pub mod graph;
pub use graph::Datagraph;

/// Externally evaluated expressions consulted by transitions.
pub mod evaluate;

/// Defines finite automata, their construction from path descriptions and their reduction.
pub mod automaton;
pub use automaton::{Dfa, Nfa};

/// Interprets automata on datagraphs.
pub mod search;
pub use search::{PathSearch, PathSystem, Slice};

/// Implements the generation of random datagraphs and path descriptions.
#[cfg(feature = "random")]
pub mod random;

/// Helper trait which can be used to display states, transitions and such.
pub trait Show {
    /// Returns a human readable representation of `self`, for a state index that should be
    /// for example q0, q1, q2, ... and for a transition it should be the symbol it matches on.
    /// This is mainly used for debugging purposes.
    fn show(&self) -> String;
    /// Show a collection of the thing, for a collection of states this should be {q0, q1, q2, ...}.
    /// By default this is unimplemented.
    fn show_collection<'a, I>(_iter: I) -> String
    where
        Self: 'a,
        I: IntoIterator<Item = &'a Self>,
        I::IntoIter: DoubleEndedIterator,
    {
        unimplemented!("This operation makes no sense.")
    }
}

impl Show for bool {
    fn show(&self) -> String {
        match self {
            true => "+",
            false => "-",
        }
        .to_string()
    }
}
