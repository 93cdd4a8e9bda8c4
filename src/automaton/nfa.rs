use thiserror::Error;
use tracing::trace;

use crate::{
    evaluate::SharedEvaluator,
    graph::{Datagraph, EdgeEnd, TypeCollection},
    Show,
};

use super::{EdgeSymbol, FiniteAutomaton, TransitionKind};

/// Raised when a path description cannot be turned into an automaton. This always happens
/// before any datagraph is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// A sequence without any element.
    #[error("a sequential path description needs at least one element")]
    EmptySequence,
    /// An alternative without any branch.
    #[error("an alternative path description needs at least one branch")]
    EmptyAlternative,
    /// An iteration with an upper bound below its lower bound.
    #[error("invalid iteration bounds {{{min},{max}}}, the lower bound exceeds the upper bound")]
    InvalidBounds {
        /// The lower bound.
        min: usize,
        /// The upper bound.
        max: usize,
    },
}

/// A nondeterministic automaton for a path description. It is built bottom up: atomic
/// descriptions yield two state automata and every operator of the path description algebra
/// combines already built automata into a new one, freely introducing epsilon transitions
/// at the seams.
///
/// After every operator the initial and final states are well defined and every transition
/// is linked into the in- and out-lists of its states.
pub struct Nfa<G: Datagraph>(FiniteAutomaton<G>);

/// Distinguishes `p*` from `p+`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Iteration {
    /// Zero or more repetitions.
    ZeroOrMore,
    /// One or more repetitions.
    OneOrMore,
}

impl<G: Datagraph> Nfa<G> {
    /// An automaton with a single transition from its initial to its final state.
    pub fn atomic(kind: TransitionKind<G>) -> Self {
        let mut fa = FiniteAutomaton::new();
        let target = fa.add_state();
        fa.add_transition(fa.initial_state(), target, kind);
        fa.set_final(target, true);
        Self(fa)
    }

    /// Matches a single edge, e.g. `-->{Type}`.
    pub fn simple(symbol: EdgeSymbol<G>) -> Self {
        Self::atomic(TransitionKind::Simple(symbol))
    }

    /// Matches exactly the edge that `edge` evaluates to.
    pub fn edge(symbol: EdgeSymbol<G>, edge: SharedEvaluator<G>) -> Self {
        Self::atomic(TransitionKind::Edge { symbol, edge })
    }

    /// Matches an aggregation edge whose aggregating end is `end`, e.g. `<>--`.
    pub fn aggregation(end: EdgeEnd, symbol: EdgeSymbol<G>) -> Self {
        Self::atomic(TransitionKind::Aggregation { end, symbol })
    }

    /// Matches only the path of length zero.
    pub fn empty_path() -> Self {
        let mut fa = FiniteAutomaton::new();
        fa.set_final(fa.initial_state(), true);
        Self(fa)
    }

    /// Builds the automaton for the concatenation of all given descriptions.
    pub fn sequence<I: IntoIterator<Item = Self>>(parts: I) -> Result<Self, ConstructionError> {
        let mut parts = parts.into_iter();
        let first = parts.next().ok_or(ConstructionError::EmptySequence)?;
        Ok(parts.fold(first, Self::then))
    }

    /// Sequential composition: every final state of `self` reaches the initial state of
    /// `next` through an epsilon transition and stops being final.
    pub fn then(mut self, next: Self) -> Self {
        let former_finals = std::mem::take(&mut self.0.finals);
        let absorbed = self.0.absorb(next.0);
        for f in former_finals {
            self.0.add_transition(f, absorbed.initial, TransitionKind::Epsilon);
        }
        self.0.set_final_states(absorbed.finals);
        self
    }

    /// Builds the automaton accepting whatever one of the `branches` accepts. A fresh initial
    /// state fans out to the initial states of all branches and all of their final states
    /// fan in to a fresh shared final state.
    pub fn alternative<I: IntoIterator<Item = Self>>(branches: I) -> Result<Self, ConstructionError> {
        let mut branches = branches.into_iter().peekable();
        if branches.peek().is_none() {
            return Err(ConstructionError::EmptyAlternative);
        }
        let mut fa = FiniteAutomaton::new();
        let initial = fa.initial_state();
        let shared_final = fa.add_state();
        for branch in branches {
            let absorbed = fa.absorb(branch.0);
            fa.add_transition(initial, absorbed.initial, TransitionKind::Epsilon);
            for f in absorbed.finals {
                fa.add_transition(f, shared_final, TransitionKind::Epsilon);
            }
        }
        fa.set_final(shared_final, true);
        Ok(Self(fa))
    }

    /// `p?`: additionally accepts the empty path.
    pub fn optional(mut self) -> Self {
        let target = self.0.collapse_final_states();
        let initial = self.0.initial_state();
        self.0.add_transition(initial, target, TransitionKind::Epsilon);
        self
    }

    /// `p*` and `p+`: the final state loops back to the initial state, for `p*` the initial
    /// state additionally reaches the final state directly.
    pub fn iterated(mut self, iteration: Iteration) -> Self {
        let target = self.0.collapse_final_states();
        let initial = self.0.initial_state();
        self.0.add_transition(target, initial, TransitionKind::Epsilon);
        if iteration == Iteration::ZeroOrMore {
            self.0.add_transition(initial, target, TransitionKind::Epsilon);
        }
        self
    }

    /// `p*`
    pub fn star(self) -> Self {
        self.iterated(Iteration::ZeroOrMore)
    }

    /// `p+`
    pub fn plus(self) -> Self {
        self.iterated(Iteration::OneOrMore)
    }

    /// `p{n}`: `n` sequential copies of `self`. `p{0}` only matches the empty path.
    pub fn exponentiated(self, n: usize) -> Self {
        if n == 0 {
            return Self::empty_path();
        }
        let copies: Vec<_> = (1..n).map(|_| self.clone()).collect();
        copies.into_iter().fold(self, Self::then)
    }

    /// `p{min,max}`: `p{min}` followed by `max - min` optional copies.
    pub fn bounded(self, min: usize, max: usize) -> Result<Self, ConstructionError> {
        if min > max {
            return Err(ConstructionError::InvalidBounds { min, max });
        }
        let optional_tail: Vec<_> = (min..max).map(|_| self.clone().optional()).collect();
        Ok(optional_tail
            .into_iter()
            .fold(self.exponentiated(min), Self::then))
    }

    /// Transposes the automaton: every transition is reversed, the final state becomes the
    /// initial one and the former initial state the only final one. Several final states are
    /// first collapsed into one.
    pub fn transposed(mut self) -> Self {
        let new_initial = self.0.collapse_final_states();
        let ids: Vec<_> = self.0.transitions().map(|(id, _)| id).collect();
        for id in ids {
            self.0.reverse_transition(id);
        }
        let old_initial = self.0.initial_state();
        self.0.set_initial_state(new_initial);
        self.0.set_final_states([old_initial]);
        trace!(
            "transposed automaton, initial {} final {}",
            new_initial.show(),
            old_initial.show()
        );
        self
    }

    /// Splices `self` and `next` through a waypoint: the search has to pass a vertex that
    /// `waypoint` evaluates to (or that is contained in what it evaluates to).
    pub fn with_intermediate_vertex(mut self, waypoint: SharedEvaluator<G>, next: Self) -> Self {
        let junction = self.0.collapse_final_states();
        let absorbed = self.0.absorb(next.0);
        self.0.add_transition(
            junction,
            absorbed.initial,
            TransitionKind::IntermediateVertex(waypoint),
        );
        self.0.set_final_states(absorbed.finals);
        self
    }

    /// Requires the start vertex to have one of the given types.
    pub fn with_start_type_restriction(self, types: TypeCollection<G::Type>) -> Self {
        self.with_start_restriction(TransitionKind::VertexTypeRestriction(types))
    }

    /// Requires the start vertex to satisfy `predicate`.
    pub fn with_start_bool_restriction(self, predicate: SharedEvaluator<G>) -> Self {
        self.with_start_restriction(TransitionKind::BoolExpression(predicate))
    }

    /// Requires the goal vertex to have one of the given types.
    pub fn with_goal_type_restriction(self, types: TypeCollection<G::Type>) -> Self {
        self.with_goal_restriction(TransitionKind::VertexTypeRestriction(types))
    }

    /// Requires the goal vertex to satisfy `predicate`.
    pub fn with_goal_bool_restriction(self, predicate: SharedEvaluator<G>) -> Self {
        self.with_goal_restriction(TransitionKind::BoolExpression(predicate))
    }

    fn with_start_restriction(mut self, kind: TransitionKind<G>) -> Self {
        let old_initial = self.0.initial_state();
        let new_initial = self.0.add_state();
        self.0.add_transition(new_initial, old_initial, kind);
        self.0.set_initial_state(new_initial);
        self
    }

    fn with_goal_restriction(mut self, kind: TransitionKind<G>) -> Self {
        let old_final = self.0.collapse_final_states();
        let new_final = self.0.add_state();
        self.0.add_transition(old_final, new_final, kind);
        self.0.set_final_states([new_final]);
        self
    }

    /// The underlying automaton.
    pub fn automaton(&self) -> &FiniteAutomaton<G> {
        &self.0
    }

    /// Consumes `self` and returns the underlying automaton.
    pub fn into_automaton(self) -> FiniteAutomaton<G> {
        self.0
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.0.state_count()
    }
}

impl<G: Datagraph> From<FiniteAutomaton<G>> for Nfa<G> {
    fn from(value: FiniteAutomaton<G>) -> Self {
        Self(value)
    }
}

impl<G: Datagraph> Clone for Nfa<G> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<G: Datagraph> std::fmt::Debug for Nfa<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NFA\n{:?}", self.0)
    }
}
