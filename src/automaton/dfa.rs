use std::collections::VecDeque;

use itertools::Itertools;
use tracing::{debug, trace};

use crate::{
    graph::Datagraph,
    math::{Bijection, OrderedSet},
    Show,
};

use super::{FiniteAutomaton, Nfa, StateId, TransitionKind};

/// An epsilon free automaton obtained from an [`Nfa`], this is what path searches
/// interpret.
///
/// It is not deterministic in the classical sense: several transitions leaving the same
/// state may accept the same concrete edge, because acceptance can depend on predicates
/// that are opaque at construction time. Only transitions with equal symbols are merged.
pub struct Dfa<G: Datagraph>(FiniteAutomaton<G>);

impl<G: Datagraph> Dfa<G> {
    /// Eliminates all epsilon transitions of `nfa`, merges the destinations of transitions
    /// with equal symbols and finally numbers the states densely.
    pub fn from_nfa(nfa: Nfa<G>) -> Self {
        let mut fa = nfa.into_automaton();
        let nfa_states = fa.state_count();
        fa.remove_epsilon_transitions();
        let mut merged = fa.merge_equal_symbols();
        merged.update_state_attributes();
        debug_assert!(merged.is_epsilon_free());
        debug!(
            "built automaton with {} states and {} transitions from {} nondeterministic states",
            merged.state_count(),
            merged.transition_count(),
            nfa_states
        );
        Self(merged)
    }

    /// The underlying automaton.
    pub fn automaton(&self) -> &FiniteAutomaton<G> {
        &self.0
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.0.state_count()
    }

    /// Builds the automaton that accepts the same paths walked backwards. Used for
    /// searching from the end of a path towards its start.
    pub fn reversed(&self) -> Self {
        Self::from_nfa(Nfa::from(self.0.clone()).transposed())
    }
}

impl<G: Datagraph> FiniteAutomaton<G> {
    /// Removes every epsilon transition. For each state `x`, the non-epsilon transitions of
    /// every state `y` that `x` reaches through epsilon transitions are copied to start at
    /// `x`, and `x` becomes final if some such `y` is final. This is the fixed point of
    /// repeatedly replacing an epsilon transition `x -> y` by copies of the transitions
    /// leaving `y`.
    pub fn remove_epsilon_transitions(&mut self) {
        let states: Vec<StateId> = self.states().map(|(q, _)| q).collect();
        let mut copies = vec![];
        for &x in &states {
            let closure = self.epsilon_closure(x);
            trace!("epsilon closure of {} is {}", x.show(), StateId::show_collection(&closure));
            for &y in closure.iter().filter(|&&y| y != x) {
                if self.is_final(y) {
                    self.set_final(x, true);
                }
                for &t in self.state(y).out_transitions() {
                    let transition = self.transition(t);
                    if !transition.is_epsilon() {
                        copies.push((x, transition.end_state(), transition.kind().clone()));
                    }
                }
            }
        }

        let epsilons = self
            .transitions()
            .filter(|(_, t)| t.is_epsilon())
            .map(|(id, _)| id)
            .collect_vec();
        trace!(
            "replacing {} epsilon transitions by {} copies",
            epsilons.len(),
            copies.len()
        );
        for id in epsilons {
            self.delete_transition(id);
        }
        for (start, end, kind) in copies {
            self.add_transition(start, end, kind);
        }
    }

    fn epsilon_closure(&self, state: StateId) -> OrderedSet<StateId> {
        let mut closure = OrderedSet::from([state]);
        let mut queue = VecDeque::from([state]);
        while let Some(q) = queue.pop_front() {
            for t in self.out_transitions(q).filter(|t| t.is_epsilon()) {
                if closure.insert(t.end_state()) {
                    queue.push_back(t.end_state());
                }
            }
        }
        closure
    }

    /// Subset construction over an epsilon free automaton. Composite states stand for sets
    /// of states of `self` and are processed in discovery order. The transitions leaving a
    /// composite state are grouped by symbol equality, and each group leads to the composite
    /// state representing the union of its destinations. A composite state is final if it
    /// contains a final state.
    fn merge_equal_symbols(&self) -> FiniteAutomaton<G> {
        let mut merged = FiniteAutomaton::new();
        let mut composites: Bijection<OrderedSet<StateId>, StateId> = Bijection::new();
        let mut queue = VecDeque::new();

        let initial = merged.initial_state();
        let initial_set = OrderedSet::from([self.initial]);
        merged.set_final(initial, self.is_final(self.initial));
        composites.insert(initial_set, initial);
        queue.push_back(initial);

        while let Some(current) = queue.pop_front() {
            let Some(members) = composites.get_by_right(&current).cloned() else {
                continue;
            };

            let mut groups: Vec<(TransitionKind<G>, OrderedSet<StateId>)> = vec![];
            for t in members.iter().flat_map(|&q| self.out_transitions(q)) {
                debug_assert!(!t.is_epsilon(), "epsilon transitions must be removed first");
                match groups.iter_mut().find(|(kind, _)| kind.equal_symbol(t.kind())) {
                    Some((_, targets)) => {
                        targets.insert(t.end_state());
                    }
                    None => groups.push((t.kind().clone(), OrderedSet::from([t.end_state()]))),
                }
            }

            for (kind, targets) in groups {
                let target = match composites.get_by_left(&targets) {
                    Some(&existing) => existing,
                    None => {
                        let created = merged.add_state();
                        let is_final = targets.iter().any(|&q| self.is_final(q));
                        merged.set_final(created, is_final);
                        trace!(
                            "composite state {} represents {}",
                            created.show(),
                            StateId::show_collection(&targets)
                        );
                        composites.insert(targets, created);
                        queue.push_back(created);
                        created
                    }
                };
                merged.add_transition(current, target, kind);
            }
        }

        merged
    }
}

impl<G: Datagraph> Clone for Dfa<G> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<G: Datagraph> std::fmt::Debug for Dfa<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DFA\n{:?}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        automaton::{Direction, EdgeSymbol},
        graph::{SimpleGraph, TypeCollection},
    };

    fn typed(graph: &mut SimpleGraph, name: &str) -> Nfa<SimpleGraph> {
        let ty = graph.define_type(name, &[]);
        Nfa::simple(EdgeSymbol::new(Direction::Out).with_types(TypeCollection::allowing([ty])))
    }

    #[test_log::test]
    fn epsilon_freedom_and_dense_numbering() {
        let mut graph = SimpleGraph::new();
        let nfa = Nfa::sequence([
            typed(&mut graph, "A").star(),
            Nfa::alternative([typed(&mut graph, "B"), typed(&mut graph, "C").plus()]).unwrap(),
            typed(&mut graph, "D").optional(),
        ])
        .unwrap()
        .transposed();
        let dfa = Dfa::from_nfa(nfa);
        let fa = dfa.automaton();

        assert!(fa.is_epsilon_free());
        assert!(fa.transitions().all(|(_, t)| !t.is_epsilon()));
        let mut numbers = fa.states().map(|(_, s)| s.number()).collect_vec();
        numbers.sort();
        assert_eq!(numbers, (0..fa.state_count()).collect_vec());
        for (q, s) in fa.states() {
            assert_eq!(s.is_final(), fa.is_final(q));
        }
    }

    #[test]
    fn finality_propagates_backwards_along_epsilons() {
        let mut graph = SimpleGraph::new();
        let nfa = Nfa::sequence([typed(&mut graph, "A"), typed(&mut graph, "B").star()]).unwrap();
        let mut fa = nfa.into_automaton();

        let epsilon_into_final: Vec<(StateId, StateId)> = fa
            .transitions()
            .filter(|(_, t)| t.is_epsilon() && fa.is_final(t.end_state()))
            .map(|(_, t)| (t.start_state(), t.end_state()))
            .collect();
        assert!(!epsilon_into_final.is_empty());

        fa.remove_epsilon_transitions();
        assert!(fa.is_epsilon_free());
        for (x, _) in epsilon_into_final {
            assert!(fa.is_final(x), "{x:?} reaches a final state through epsilon");
        }
    }

    #[test]
    fn equal_symbols_are_merged() {
        let mut graph = SimpleGraph::new();
        let a = graph.define_type("A", &[]);
        let symbol = || EdgeSymbol::new(Direction::Out).with_types(TypeCollection::allowing([a.clone()]));
        let nfa: Nfa<SimpleGraph> =
            Nfa::alternative([Nfa::simple(symbol()), Nfa::simple(symbol())]).unwrap();
        let nfa_states = nfa.state_count();

        let dfa = Dfa::from_nfa(nfa);
        let fa = dfa.automaton();
        assert!(fa.state_count() < nfa_states);
        assert_eq!(fa.state_count(), 2);
        assert_eq!(fa.out_transitions(fa.initial_state()).count(), 1);
        assert_eq!(fa.final_states().len(), 1);
    }

    #[test]
    fn different_symbols_stay_apart() {
        let mut graph = SimpleGraph::new();
        let nfa = Nfa::alternative([typed(&mut graph, "A"), typed(&mut graph, "B")]).unwrap();
        let dfa = Dfa::from_nfa(nfa);
        let fa = dfa.automaton();
        assert_eq!(fa.out_transitions(fa.initial_state()).count(), 2);
        assert_eq!(fa.state_count(), 3);
    }

    #[test]
    fn reversal_twice_preserves_directions() {
        let mut graph = SimpleGraph::new();
        let dfa = Dfa::from_nfa(typed(&mut graph, "A").then(typed(&mut graph, "B")));
        let reversed = dfa.reversed();
        assert!(reversed
            .automaton()
            .transitions()
            .all(|(_, t)| t.kind().direction() == Some(Direction::In)));
        let twice = reversed.reversed();
        assert_eq!(twice.state_count(), dfa.state_count());
        assert!(twice
            .automaton()
            .transitions()
            .all(|(_, t)| t.kind().direction() == Some(Direction::Out)));
    }
}
