use std::{collections::VecDeque, fmt::Debug};

use itertools::Itertools;
use tracing::trace;

use crate::{
    graph::Datagraph,
    math::{OrderedSet, Set},
    Show,
};

/// Defines the transitions of an automaton and what they match on.
pub mod transition;
pub use transition::{Direction, EdgeSymbol, Transition, TransitionKind};

/// Thompson style construction of nondeterministic automata from path descriptions.
pub mod nfa;
pub use nfa::{ConstructionError, Nfa};

/// Reduction of an [`Nfa`] to an epsilon free automaton suitable for searching.
#[allow(clippy::upper_case_acronyms)]
pub mod dfa;
pub use dfa::Dfa;

/// An explicit cache for automata that have already been built.
pub mod cache;
pub use cache::DfaCache;

/// Graphviz export and transition tables.
pub mod dot;

/// Handle of a state in the arena of a [`FiniteAutomaton`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(usize);

impl StateId {
    /// The position of the state in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl Debug for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "q{}", self.0)
    }
}

impl Show for StateId {
    fn show(&self) -> String {
        format!("q{}", self.0)
    }

    fn show_collection<'a, I>(iter: I) -> String
    where
        Self: 'a,
        I: IntoIterator<Item = &'a Self>,
        I::IntoIter: DoubleEndedIterator,
    {
        format!("{{{}}}", iter.into_iter().map(|q| q.show()).join(", "))
    }
}

/// Handle of a transition in the arena of a [`FiniteAutomaton`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TransitionId(usize);

/// A state of a [`FiniteAutomaton`]. It lists the transitions leaving and entering it in
/// the order in which they were linked. The number and the finality flag are only
/// meaningful after [`FiniteAutomaton::update_state_attributes`] ran.
#[derive(Clone, Debug, Default)]
pub struct State {
    number: usize,
    is_final: bool,
    out_transitions: Vec<TransitionId>,
    in_transitions: Vec<TransitionId>,
}

impl State {
    /// The dense number of the state.
    pub fn number(&self) -> usize {
        self.number
    }

    /// Whether the state is final.
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// The transitions leaving this state.
    pub fn out_transitions(&self) -> &[TransitionId] {
        &self.out_transitions
    }

    /// The transitions entering this state.
    pub fn in_transitions(&self) -> &[TransitionId] {
        &self.in_transitions
    }
}

/// A finite automaton over path descriptions, stored as an arena of [`State`]s and
/// [`Transition`]s that refer to each other through [`StateId`]s and [`TransitionId`]s.
///
/// Deleted transitions leave an empty slot behind, so handles stay stable while an
/// automaton is rewired. States are never deleted.
pub struct FiniteAutomaton<G: Datagraph> {
    states: Vec<State>,
    transitions: Vec<Option<Transition<G>>>,
    initial: StateId,
    finals: OrderedSet<StateId>,
}

/// The handles under which the initial and final states of an automaton are known after
/// it was absorbed into another one, see [`FiniteAutomaton::absorb`].
#[derive(Debug, Clone)]
pub struct Absorbed {
    /// The former initial state.
    pub initial: StateId,
    /// The former final states.
    pub finals: OrderedSet<StateId>,
}

impl<G: Datagraph> FiniteAutomaton<G> {
    /// Creates an automaton consisting of a single, non-final initial state.
    pub fn new() -> Self {
        Self {
            states: vec![State::default()],
            transitions: vec![],
            initial: StateId(0),
            finals: OrderedSet::new(),
        }
    }

    /// Adds a fresh state without any transitions.
    pub fn add_state(&mut self) -> StateId {
        let id = StateId(self.states.len());
        self.states.push(State::default());
        id
    }

    /// Returns the state with the given handle.
    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.0]
    }

    /// Iterates over all states together with their handles.
    pub fn states(&self) -> impl Iterator<Item = (StateId, &State)> + '_ {
        self.states.iter().enumerate().map(|(i, s)| (StateId(i), s))
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// The initial state.
    pub fn initial_state(&self) -> StateId {
        self.initial
    }

    /// Makes `state` the initial state.
    pub fn set_initial_state(&mut self, state: StateId) {
        self.initial = state;
    }

    /// The final states.
    pub fn final_states(&self) -> &OrderedSet<StateId> {
        &self.finals
    }

    /// Returns true if `state` is one of the final states.
    pub fn is_final(&self, state: StateId) -> bool {
        self.finals.contains(&state)
    }

    /// Adds `state` to or removes it from the final states.
    pub fn set_final(&mut self, state: StateId, is_final: bool) {
        if is_final {
            self.finals.insert(state);
        } else {
            self.finals.remove(&state);
        }
    }

    /// Replaces the set of final states.
    pub fn set_final_states<I: IntoIterator<Item = StateId>>(&mut self, finals: I) {
        self.finals = finals.into_iter().collect();
    }

    /// Adds a transition from `start` to `end` and links it into both states.
    pub fn add_transition(
        &mut self,
        start: StateId,
        end: StateId,
        kind: TransitionKind<G>,
    ) -> TransitionId {
        let id = TransitionId(self.transitions.len());
        self.states[start.0].out_transitions.push(id);
        self.states[end.0].in_transitions.push(id);
        self.transitions.push(Some(Transition { start, end, kind }));
        id
    }

    /// Returns the transition with the given handle.
    ///
    /// # Panics
    ///
    /// Panics if the transition was deleted.
    pub fn transition(&self, id: TransitionId) -> &Transition<G> {
        self.transitions[id.0]
            .as_ref()
            .unwrap_or_else(|| panic!("transition {id:?} was deleted"))
    }

    fn transition_mut(&mut self, id: TransitionId) -> &mut Transition<G> {
        self.transitions[id.0]
            .as_mut()
            .unwrap_or_else(|| panic!("transition {id:?} was deleted"))
    }

    /// Iterates over all live transitions together with their handles.
    pub fn transitions(&self) -> impl Iterator<Item = (TransitionId, &Transition<G>)> + '_ {
        self.transitions
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|t| (TransitionId(i), t)))
    }

    /// Number of live transitions.
    pub fn transition_count(&self) -> usize {
        self.transitions.iter().filter(|t| t.is_some()).count()
    }

    /// Iterates over the transitions leaving `state` in the order they were linked.
    pub fn out_transitions(&self, state: StateId) -> impl Iterator<Item = &Transition<G>> + '_ {
        self.states[state.0]
            .out_transitions
            .iter()
            .map(|&t| self.transition(t))
    }

    /// Iterates over the transitions entering `state` in the order they were linked.
    pub fn in_transitions(&self, state: StateId) -> impl Iterator<Item = &Transition<G>> + '_ {
        self.states[state.0]
            .in_transitions
            .iter()
            .map(|&t| self.transition(t))
    }

    /// Moves the start of `id` to `state`.
    pub fn set_start_state(&mut self, id: TransitionId, state: StateId) {
        let old = self.transition(id).start;
        self.states[old.0].out_transitions.retain(|&t| t != id);
        self.states[state.0].out_transitions.push(id);
        self.transition_mut(id).start = state;
    }

    /// Moves the end of `id` to `state`.
    pub fn set_end_state(&mut self, id: TransitionId, state: StateId) {
        let old = self.transition(id).end;
        self.states[old.0].in_transitions.retain(|&t| t != id);
        self.states[state.0].in_transitions.push(id);
        self.transition_mut(id).end = state;
    }

    /// Swaps start and end of `id` and reverses its direction semantics.
    pub fn reverse_transition(&mut self, id: TransitionId) {
        let (start, end) = {
            let t = self.transition(id);
            (t.start, t.end)
        };
        self.states[start.0].out_transitions.retain(|&t| t != id);
        self.states[end.0].in_transitions.retain(|&t| t != id);
        self.states[end.0].out_transitions.push(id);
        self.states[start.0].in_transitions.push(id);
        let t = self.transition_mut(id);
        t.start = end;
        t.end = start;
        t.kind.reverse();
    }

    /// Unlinks `id` from its states and removes it.
    pub fn delete_transition(&mut self, id: TransitionId) {
        let Some(t) = self.transitions[id.0].take() else {
            return;
        };
        self.states[t.start.0].out_transitions.retain(|&x| x != id);
        self.states[t.end.0].in_transitions.retain(|&x| x != id);
    }

    /// Creates a fresh transition that matches the same symbol as `id` but connects
    /// `start` with `end`.
    pub fn copy_transition(&mut self, id: TransitionId, start: StateId, end: StateId) -> TransitionId {
        let kind = self.transition(id).kind.clone();
        self.add_transition(start, end, kind)
    }

    /// Returns true if no epsilon transition is left.
    pub fn is_epsilon_free(&self) -> bool {
        self.transitions().all(|(_, t)| !t.is_epsilon())
    }

    /// Moves all states and transitions of `other` into `self`. The initial and final
    /// states of `self` are left untouched, the handles of those of `other` are returned.
    pub fn absorb(&mut self, other: FiniteAutomaton<G>) -> Absorbed {
        let state_offset = self.states.len();
        let transition_offset = self.transitions.len();
        let shift_state = |s: StateId| StateId(s.0 + state_offset);
        let shift_transition = |t: TransitionId| TransitionId(t.0 + transition_offset);

        self.states.extend(other.states.into_iter().map(|s| State {
            number: s.number,
            is_final: s.is_final,
            out_transitions: s.out_transitions.into_iter().map(shift_transition).collect(),
            in_transitions: s.in_transitions.into_iter().map(shift_transition).collect(),
        }));
        self.transitions
            .extend(other.transitions.into_iter().map(|t| {
                t.map(|t| Transition {
                    start: shift_state(t.start),
                    end: shift_state(t.end),
                    kind: t.kind,
                })
            }));

        Absorbed {
            initial: shift_state(other.initial),
            finals: other.finals.into_iter().map(shift_state).collect(),
        }
    }

    /// Makes sure there is exactly one final state. If there are several, a new state is
    /// created that all of them reach through an epsilon transition and becomes the only
    /// final state. Returns the final state.
    pub fn collapse_final_states(&mut self) -> StateId {
        if self.finals.len() == 1 {
            if let Some(&single) = self.finals.first() {
                return single;
            }
        }
        let collector = self.add_state();
        for f in std::mem::take(&mut self.finals) {
            self.add_transition(f, collector, TransitionKind::Epsilon);
        }
        self.finals.insert(collector);
        trace!("collapsed final states into {}", collector.show());
        collector
    }

    /// Computes the states that are reachable from the initial state, in breadth first
    /// order.
    pub fn reachable_states(&self) -> Vec<StateId> {
        let mut seen = Set::default();
        let mut queue = VecDeque::from([self.initial]);
        let mut order = vec![];
        seen.insert(self.initial);
        while let Some(q) = queue.pop_front() {
            order.push(q);
            for t in self.out_transitions(q) {
                if seen.insert(t.end) {
                    queue.push_back(t.end);
                }
            }
        }
        order
    }

    /// Assigns dense numbers to all states in creation order and sets their finality flag
    /// from membership in the final states.
    pub fn update_state_attributes(&mut self) {
        for (i, state) in self.states.iter_mut().enumerate() {
            state.number = i;
            state.is_final = self.finals.contains(&StateId(i));
        }
    }
}

impl<G: Datagraph> Default for FiniteAutomaton<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Datagraph> Clone for FiniteAutomaton<G> {
    fn clone(&self) -> Self {
        Self {
            states: self.states.clone(),
            transitions: self.transitions.clone(),
            initial: self.initial,
            finals: self.finals.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SimpleGraph;

    fn out() -> TransitionKind<SimpleGraph> {
        TransitionKind::Simple(EdgeSymbol::new(Direction::Out))
    }

    fn linked_consistently(fa: &FiniteAutomaton<SimpleGraph>) -> bool {
        fa.transitions().all(|(id, t)| {
            fa.state(t.start_state()).out_transitions().contains(&id)
                && fa.state(t.end_state()).in_transitions().contains(&id)
        }) && fa.states().all(|(q, s)| {
            s.out_transitions()
                .iter()
                .all(|&t| fa.transition(t).start_state() == q)
                && s.in_transitions()
                    .iter()
                    .all(|&t| fa.transition(t).end_state() == q)
        })
    }

    #[test]
    fn linking_primitives_keep_lists_in_sync() {
        let mut fa = FiniteAutomaton::<SimpleGraph>::new();
        let q0 = fa.initial_state();
        let q1 = fa.add_state();
        let q2 = fa.add_state();
        let t = fa.add_transition(q0, q1, out());
        let u = fa.add_transition(q1, q2, TransitionKind::Epsilon);
        assert!(linked_consistently(&fa));

        fa.set_start_state(t, q2);
        fa.set_end_state(u, q0);
        assert!(linked_consistently(&fa));
        assert!(fa.state(q0).out_transitions().is_empty());

        fa.reverse_transition(t);
        assert_eq!(fa.transition(t).start_state(), q1);
        assert_eq!(fa.transition(t).end_state(), q2);
        assert_eq!(fa.transition(t).kind().direction(), Some(Direction::In));
        assert!(linked_consistently(&fa));

        let copy = fa.copy_transition(t, q0, q0);
        assert!(fa.transition(copy).equal_symbol(fa.transition(t)));
        fa.delete_transition(u);
        assert_eq!(fa.transition_count(), 2);
        assert!(fa.is_epsilon_free());
        assert!(linked_consistently(&fa));
    }

    #[test]
    fn absorb_shifts_handles() {
        let mut left = FiniteAutomaton::<SimpleGraph>::new();
        let l1 = left.add_state();
        left.add_transition(left.initial_state(), l1, out());
        left.set_final(l1, true);

        let mut right = FiniteAutomaton::<SimpleGraph>::new();
        let r1 = right.add_state();
        right.add_transition(right.initial_state(), r1, out());
        right.set_final(r1, true);

        let absorbed = left.absorb(right);
        assert_eq!(absorbed.initial, StateId(2));
        assert_eq!(absorbed.finals.iter().copied().collect::<Vec<_>>(), vec![StateId(3)]);
        assert_eq!(left.state_count(), 4);
        assert_eq!(left.transition_count(), 2);
        assert!(linked_consistently(&left));
        assert_eq!(left.final_states().len(), 1, "finals of self are untouched");
    }

    #[test]
    fn numbering_is_dense_and_finality_matches() {
        let mut fa = FiniteAutomaton::<SimpleGraph>::new();
        let a = fa.add_state();
        let b = fa.add_state();
        fa.set_final(a, true);
        fa.set_final(b, true);
        let collector = fa.collapse_final_states();
        fa.update_state_attributes();

        let numbers: Vec<_> = fa.states().map(|(_, s)| s.number()).collect();
        assert_eq!(numbers, (0..fa.state_count()).collect::<Vec<_>>());
        for (q, s) in fa.states() {
            assert_eq!(s.is_final(), q == collector);
        }
    }
}
