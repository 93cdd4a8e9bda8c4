//! Interpreters that walk a [`Datagraph`] guided by a [`Dfa`].
//!
//! Every search explores pairs of a vertex and an automaton state breadth first, starting
//! with the root vertex in the initial state. From such a pair, the edge consuming
//! transitions of the state are tried on every incident edge of the vertex, after that
//! the transitions that only test the vertex are tried once. A pair is explored at most
//! once per search, so the same vertex may be revisited in a different state.
use std::{collections::VecDeque, ops::ControlFlow};

use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    automaton::{Dfa, FiniteAutomaton, StateId, Transition},
    evaluate::{EvaluationError, Value},
    graph::{Datagraph, SubgraphRestriction},
    math::OrderedSet,
    Show,
};

/// Markers that remember which pairs of state and vertex were seen already.
pub mod marker;
use marker::VisitedMarker;

/// Path systems and the paths that can be reconstructed from them.
pub mod path_system;
pub use path_system::{Path, PathSearchEntry, PathSystem};

/// The union of all matching paths starting in a set of criterion vertices.
pub mod slice;
pub use slice::Slice;

/// Failures that abort a search. They always stem from the external evaluators that
/// transitions consult, the traversal itself cannot fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathSearchError {
    /// An evaluator reported a failure.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    /// An evaluator produced a value of the wrong kind.
    #[error("{evaluator} produced {found} where a {expected} was expected")]
    UnexpectedValue {
        /// What was evaluated.
        evaluator: &'static str,
        /// The kind of value the transition needs.
        expected: &'static str,
        /// Description of the value that was produced instead.
        found: String,
    },
}

impl PathSearchError {
    /// Builds an [`PathSearchError::UnexpectedValue`] for the given value.
    pub fn unexpected<G: Datagraph>(
        evaluator: &'static str,
        expected: &'static str,
        found: &Value<G>,
    ) -> Self {
        PathSearchError::UnexpectedValue {
            evaluator,
            expected,
            found: format!("{} {:?}", found.kind(), found),
        }
    }
}

/// Interprets a [`Dfa`] on a graph. The search borrows both and keeps no state between
/// calls, all bookkeeping lives in the markers created by each call.
pub struct PathSearch<'a, G: Datagraph> {
    graph: &'a G,
    dfa: &'a Dfa<G>,
    subgraph: Option<&'a dyn SubgraphRestriction<G>>,
}

impl<'a, G: Datagraph> PathSearch<'a, G> {
    /// Creates a search for `dfa` on the whole `graph`.
    pub fn new(graph: &'a G, dfa: &'a Dfa<G>) -> Self {
        Self {
            graph,
            dfa,
            subgraph: None,
        }
    }

    /// Confines edge consuming transitions to the edges contained in `subgraph`.
    pub fn with_subgraph(mut self, subgraph: &'a dyn SubgraphRestriction<G>) -> Self {
        self.subgraph = Some(subgraph);
        self
    }

    /// The graph that is searched.
    pub fn graph(&self) -> &'a G {
        self.graph
    }

    /// The automaton that guides the search.
    pub fn dfa(&self) -> &'a Dfa<G> {
        self.dfa
    }

    /// Computes all vertices that are the end of a matching path starting at `root`.
    pub fn vertex_set(&self, root: G::Vertex) -> Result<OrderedSet<G::Vertex>, PathSearchError> {
        self.collect_vertices(self.dfa.automaton(), root)
    }

    /// Computes all vertices that are the start of a matching path ending at `root`. The
    /// automaton is reversed first, which is done anew on every call.
    pub fn backward_vertex_set(
        &self,
        root: G::Vertex,
    ) -> Result<OrderedSet<G::Vertex>, PathSearchError> {
        let reversed = self.dfa.reversed();
        self.collect_vertices(reversed.automaton(), root)
    }

    /// Decides whether a matching path leads from `start` to `target`. The search stops as
    /// soon as `target` is visited in a final state.
    pub fn is_reachable(
        &self,
        start: G::Vertex,
        target: G::Vertex,
    ) -> Result<bool, PathSearchError> {
        let mut found = false;
        self.explore(self.dfa.automaton(), start, |vertex| {
            if vertex == target {
                found = true;
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(found)
    }

    /// Computes the path system rooted at `root`: one entry for every pair of vertex and
    /// state that is reachable, recording how it was reached first.
    pub fn path_system(
        &self,
        root: G::Vertex,
    ) -> Result<PathSystem<G::Vertex, G::Edge>, PathSearchError> {
        let fa = self.dfa.automaton();
        let initial = fa.initial_state();
        let mut system = PathSystem::new(root, fa.state(initial).number(), fa.is_final(initial));
        let mut queue = VecDeque::from([(0, initial)]);

        while let Some((current, state)) = queue.pop_front() {
            let vertex = system.entry_at(current).vertex();
            trace!("path system visits {vertex:?} in {}", state.show());
            for (transition, edge, next) in moves(self.graph, fa, state, vertex) {
                let target = transition.end_state();
                let number = fa.state(target).number();
                if system.entry(number, next).is_some() {
                    continue;
                }
                if transition.accepts(self.graph, vertex, edge, self.subgraph)? {
                    let normal = edge.map(|e| self.graph.normal_edge(e));
                    let recorded =
                        system.record(current, next, number, fa.is_final(target), edge, normal);
                    queue.push_back((recorded, target));
                }
            }
        }

        debug!(
            "path system rooted at {root:?} has {} entries and {} leaves",
            system.len(),
            system.leaves().count()
        );
        Ok(system)
    }

    /// Returns a shortest matching path from `start` to `target`, if there is one.
    pub fn extract_path(
        &self,
        start: G::Vertex,
        target: G::Vertex,
    ) -> Result<Option<Path<G::Vertex, G::Edge>>, PathSearchError> {
        Ok(self.path_system(start)?.extract_path(target))
    }

    fn collect_vertices(
        &self,
        fa: &FiniteAutomaton<G>,
        root: G::Vertex,
    ) -> Result<OrderedSet<G::Vertex>, PathSearchError> {
        let mut result = OrderedSet::new();
        let visited = self.explore(fa, root, |vertex| {
            result.insert(vertex);
            ControlFlow::Continue(())
        })?;
        debug!(
            "vertex set search from {root:?} visited {visited} pairs and found {} vertices",
            result.len()
        );
        Ok(result)
    }

    /// Breadth first traversal that only remembers which pairs were visited. `on_final`
    /// is called for every pair in a final state and may stop the traversal. Returns the
    /// number of pairs that were taken from the queue.
    fn explore<F>(
        &self,
        fa: &FiniteAutomaton<G>,
        root: G::Vertex,
        mut on_final: F,
    ) -> Result<usize, PathSearchError>
    where
        F: FnMut(G::Vertex) -> ControlFlow<()>,
    {
        let mut marker = VisitedMarker::new(fa.state_count(), self.graph.vertex_capacity());
        let initial = fa.initial_state();
        marker.mark(fa.state(initial).number(), self.graph.vertex_index(root));
        let mut queue = VecDeque::from([(initial, root)]);
        let mut visited = 0;

        while let Some((state, vertex)) = queue.pop_front() {
            visited += 1;
            trace!("visiting {vertex:?} in {}", state.show());
            if fa.is_final(state) && on_final(vertex).is_break() {
                break;
            }
            for (transition, edge, next) in moves(self.graph, fa, state, vertex) {
                let target = transition.end_state();
                let number = fa.state(target).number();
                let index = self.graph.vertex_index(next);
                if marker.is_marked(number, index) {
                    continue;
                }
                if transition.accepts(self.graph, vertex, edge, self.subgraph)? {
                    marker.mark(number, index);
                    queue.push_back((target, next));
                }
            }
        }
        Ok(visited)
    }
}

/// Enumerates the candidate moves out of `state` at `vertex` in the order in which they are
/// tried: first every edge consuming transition for every incident edge, then every
/// transition that stays on the vertex. Each move carries the vertex it would lead to.
fn moves<'s, G: Datagraph>(
    graph: &'s G,
    fa: &'s FiniteAutomaton<G>,
    state: StateId,
    vertex: G::Vertex,
) -> impl Iterator<Item = (&'s Transition<G>, Option<G::Edge>, G::Vertex)> + 's {
    let consuming = graph.incident_edges(vertex).flat_map(move |edge| {
        fa.out_transitions(state)
            .filter(|t| t.kind().consumes_edge())
            .map(move |t| (t, Some(edge), t.next_vertex(graph, vertex, Some(edge))))
    });
    let staying = fa
        .out_transitions(state)
        .filter(|t| !t.kind().consumes_edge())
        .map(move |t| (t, None, vertex));
    consuming.chain(staying)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        automaton::{Direction, EdgeSymbol, Nfa},
        evaluate::shared,
        graph::{Incidence, SimpleGraph, TypeCollection, VertexId},
        math::Set,
    };

    /// `v1 -A-> v2 -> v3 -> v4` and `v1 -B-> v5`.
    pub(crate) fn chain() -> (SimpleGraph, Vec<VertexId>, Vec<Incidence>) {
        let mut graph = SimpleGraph::new();
        let node = graph.define_type("Node", &[]);
        let a = graph.define_type("A", &[]);
        let b = graph.define_type("B", &[]);
        let link = graph.define_type("Link", &[]);
        let v = (0..5).map(|_| graph.add_vertex(&node)).collect::<Vec<_>>();
        let e = vec![
            graph.add_edge(&a, v[0], v[1]),
            graph.add_edge(&link, v[1], v[2]),
            graph.add_edge(&link, v[2], v[3]),
            graph.add_edge(&b, v[0], v[4]),
        ];
        (graph, v, e)
    }

    /// `-->{A} -->*`
    pub(crate) fn a_then_anything(graph: &SimpleGraph) -> Dfa<SimpleGraph> {
        let a = graph.element_type("A").unwrap();
        let nfa = Nfa::sequence([
            Nfa::simple(EdgeSymbol::new(Direction::Out).with_types(TypeCollection::allowing([a]))),
            Nfa::simple(EdgeSymbol::new(Direction::Out)).star(),
        ])
        .unwrap();
        Dfa::from_nfa(nfa)
    }

    #[test_log::test]
    fn forward_vertex_set_follows_the_pattern() {
        let (graph, v, _) = chain();
        let dfa = a_then_anything(&graph);
        let search = PathSearch::new(&graph, &dfa);

        let found = search.vertex_set(v[0]).unwrap();
        assert_eq!(found, OrderedSet::from([v[1], v[2], v[3]]));
        assert!(!found.contains(&v[4]));
        assert_eq!(search.vertex_set(v[0]).unwrap(), found, "searching is idempotent");

        assert!(search.vertex_set(v[4]).unwrap().is_empty());
    }

    #[test]
    fn backward_vertex_set_uses_the_reversed_automaton() {
        let (graph, v, _) = chain();
        let dfa = a_then_anything(&graph);
        let search = PathSearch::new(&graph, &dfa);
        assert_eq!(search.backward_vertex_set(v[3]).unwrap(), OrderedSet::from([v[0]]));
        assert_eq!(search.backward_vertex_set(v[1]).unwrap(), OrderedSet::from([v[0]]));
        assert!(search.backward_vertex_set(v[4]).unwrap().is_empty());
    }

    #[test]
    fn reachability_stops_early() {
        let (graph, v, _) = chain();
        let dfa = a_then_anything(&graph);
        let search = PathSearch::new(&graph, &dfa);
        assert!(search.is_reachable(v[0], v[3]).unwrap());
        assert!(!search.is_reachable(v[0], v[4]).unwrap());
        assert!(!search.is_reachable(v[0], v[0]).unwrap());
    }

    #[test]
    fn subgraph_restriction_confines_edges() {
        let (graph, v, e) = chain();
        let dfa = a_then_anything(&graph);
        let restriction: Set<Incidence> = [e[0], e[1]].into_iter().collect();
        let search = PathSearch::new(&graph, &dfa).with_subgraph(&restriction);
        assert_eq!(search.vertex_set(v[0]).unwrap(), OrderedSet::from([v[1], v[2]]));
    }

    #[test]
    fn evaluator_failures_abort_the_search() {
        let (graph, v, _) = chain();
        let failing = Nfa::<SimpleGraph>::simple(EdgeSymbol::new(Direction::Out))
            .with_goal_bool_restriction(shared(|_, _| Err(EvaluationError::new("boom"))));
        let dfa = Dfa::from_nfa(failing);
        let search = PathSearch::new(&graph, &dfa);
        assert_eq!(
            search.vertex_set(v[0]).unwrap_err(),
            PathSearchError::Evaluation(EvaluationError::new("boom"))
        );

        let wrong = Nfa::<SimpleGraph>::simple(EdgeSymbol::new(Direction::Out))
            .with_goal_bool_restriction(shared(|_, _| Ok(Value::Null)));
        let dfa = Dfa::from_nfa(wrong);
        let err = PathSearch::new(&graph, &dfa).path_system(v[0]).unwrap_err();
        assert!(matches!(
            err,
            PathSearchError::UnexpectedValue {
                expected: "boolean",
                ..
            }
        ));
    }

    #[test_log::test]
    fn vertex_tests_run_once_per_visit() {
        use std::sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        };

        let mut graph = SimpleGraph::new();
        let node = graph.define_type("Node", &[]);
        let link = graph.define_type("Link", &[]);
        let [root, left, right, sink] = [(); 4].map(|_| graph.add_vertex(&node));
        for target in [left, right] {
            graph.add_edge(&link, root, target);
            graph.add_edge(&link, target, sink);
            graph.add_edge(&link, target, sink);
            graph.add_edge(&link, sink, target);
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let nfa = Nfa::<SimpleGraph>::simple(EdgeSymbol::new(Direction::Out))
            .with_goal_bool_restriction(shared(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Bool(true))
            }));
        let dfa = Dfa::from_nfa(nfa);
        let search = PathSearch::new(&graph, &dfa);

        assert_eq!(search.vertex_set(root).unwrap(), OrderedSet::from([left, right]));
        assert_eq!(calls.load(Ordering::SeqCst), 2, "left and right have four edges each");

        calls.store(0, Ordering::SeqCst);
        assert_eq!(search.path_system(root).unwrap().leaves().count(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn one_automaton_serves_concurrent_searches() {
        fn shareable<T: Send + Sync>(_: &T) {}

        let (graph, v, _) = chain();
        let dfa = a_then_anything(&graph);
        shareable(&dfa);
        let expected = PathSearch::new(&graph, &dfa).vertex_set(v[0]).unwrap();

        let results = std::thread::scope(|scope| {
            let workers = (0..4)
                .map(|_| scope.spawn(|| PathSearch::new(&graph, &dfa).vertex_set(v[0])))
                .collect::<Vec<_>>();
            workers
                .into_iter()
                .map(|worker| worker.join().unwrap().unwrap())
                .collect::<Vec<_>>()
        });
        assert!(results.iter().all(|found| found == &expected));
    }

    #[test]
    fn extracted_paths_are_shortest() {
        let (graph, v, e) = chain();
        let dfa = a_then_anything(&graph);
        let search = PathSearch::new(&graph, &dfa);

        let path = search.extract_path(v[0], v[3]).unwrap().unwrap();
        assert_eq!(path.vertices(), &[v[0], v[1], v[2], v[3]]);
        assert_eq!(path.edges(), &[e[0], e[1], e[2]]);
        assert!(search.extract_path(v[0], v[4]).unwrap().is_none());
    }
}
