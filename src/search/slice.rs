use std::{collections::VecDeque, fmt::Debug, hash::Hash};

use tracing::{debug, trace};

use crate::{
    graph::Datagraph,
    math::{Map, OrderedSet, Set},
    Show,
};

use super::{
    marker::StateMarker, moves, path_system::reconstruct, Path, PathSearch, PathSearchEntry,
    PathSearchError,
};

/// The union of all matching paths that start in one of the criterion vertices.
///
/// Unlike a [`super::PathSystem`], a slice keeps one entry per pair of vertex and state for
/// every edge through which the pair was reached, so it contains every edge that lies on
/// some matching path. Entries that lead to no leaf are not part of the slice.
#[derive(Debug, Clone)]
pub struct Slice<V, E> {
    roots: OrderedSet<V>,
    entries: Vec<PathSearchEntry<V, E>>,
    index: StateMarker<V, Map<Option<E>, usize>>,
    leaves: Vec<usize>,
    members: OrderedSet<usize>,
}

impl<V, E> Slice<V, E>
where
    V: Copy + Eq + Hash + Ord + Debug,
    E: Copy + Eq + Hash + Ord + Debug,
{
    fn new(state_count: usize) -> Self {
        Self {
            roots: OrderedSet::new(),
            entries: vec![],
            index: StateMarker::new(state_count),
            leaves: vec![],
            members: OrderedSet::new(),
        }
    }

    fn contains_key(&self, state_number: usize, vertex: V, edge: Option<E>) -> bool {
        self.index
            .get(state_number, &vertex)
            .is_some_and(|by_edge| by_edge.contains_key(&edge))
    }

    fn push(&mut self, entry: PathSearchEntry<V, E>) -> usize {
        let position = self.entries.len();
        self.index
            .get_or_default(entry.state_number(), entry.vertex())
            .insert(entry.edge_to_parent(), position);
        if entry.state_is_final() {
            self.leaves.push(position);
        }
        self.entries.push(entry);
        position
    }

    fn positions_of(&self, state_number: usize, vertex: V) -> Vec<usize> {
        self.index
            .get(state_number, &vertex)
            .map(|by_edge| by_edge.values().copied().collect())
            .unwrap_or_default()
    }

    /// Keeps exactly the entries from which a leaf can be reached, walking from the leaves
    /// towards the roots. Each pair of state and vertex is queued at most once.
    fn retain_contributing(&mut self) {
        let mut queued: Set<(usize, V)> = Set::default();
        let mut queue = VecDeque::new();
        for &leaf in &self.leaves {
            let key = (self.entries[leaf].state_number(), self.entries[leaf].vertex());
            if queued.insert(key) {
                queue.push_back(key);
            }
        }

        while let Some((state_number, vertex)) = queue.pop_front() {
            for position in self.positions_of(state_number, vertex) {
                self.members.insert(position);
                let entry = &self.entries[position];
                if let (Some(parent_state), Some(parent_vertex)) =
                    (entry.parent_state_number(), entry.parent_vertex())
                {
                    if queued.insert((parent_state, parent_vertex)) {
                        queue.push_back((parent_state, parent_vertex));
                    }
                }
            }
        }
    }

    /// The criterion vertices the slice was computed for.
    pub fn roots(&self) -> &OrderedSet<V> {
        &self.roots
    }

    /// The entries in a final state, each is the end of a matching path.
    pub fn leaves(&self) -> impl Iterator<Item = &PathSearchEntry<V, E>> + '_ {
        self.leaves.iter().map(|&position| &self.entries[position])
    }

    /// All entries of the slice.
    pub fn entries(&self) -> impl Iterator<Item = &PathSearchEntry<V, E>> + '_ {
        self.members.iter().map(|&position| &self.entries[position])
    }

    /// The entries of the slice at `vertex`, in any state.
    pub fn entries_of(&self, vertex: V) -> impl Iterator<Item = &PathSearchEntry<V, E>> + '_ {
        self.entries().filter(move |entry| entry.vertex() == vertex)
    }

    /// The vertices on some matching path.
    pub fn vertices(&self) -> OrderedSet<V> {
        self.entries().map(|entry| entry.vertex()).collect()
    }

    /// The normalized edges on some matching path.
    pub fn edges(&self) -> OrderedSet<E> {
        self.entries().filter_map(|entry| entry.normal_edge()).collect()
    }

    /// Returns true if `vertex` lies on some matching path.
    pub fn contains_vertex(&self, vertex: V) -> bool {
        self.entries().any(|entry| entry.vertex() == vertex)
    }

    /// Returns true if the (normalized) `edge` lies on some matching path.
    pub fn contains_edge(&self, edge: E) -> bool {
        self.entries().any(|entry| entry.normal_edge() == Some(edge))
    }

    /// One path for every leaf, following the parent through which each entry was reached.
    pub fn extract_paths(&self) -> Vec<Path<V, E>> {
        self.leaves
            .iter()
            .map(|&position| reconstruct(&self.entries, position))
            .collect()
    }

    /// Returns true if no matching path starts in a criterion vertex.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

impl<'a, G: Datagraph> PathSearch<'a, G> {
    /// Computes the slice for the given criterion vertices. All of them are explored
    /// together, starting in the initial state.
    pub fn slice<I>(&self, criteria: I) -> Result<Slice<G::Vertex, G::Edge>, PathSearchError>
    where
        I: IntoIterator<Item = G::Vertex>,
    {
        let fa = self.dfa.automaton();
        let initial = fa.initial_state();
        let initial_number = fa.state(initial).number();
        let mut slice = Slice::new(fa.state_count());
        let mut expanded: Set<(usize, G::Vertex)> = Set::default();
        let mut queue = VecDeque::new();

        for root in criteria {
            slice.roots.insert(root);
            if slice.contains_key(initial_number, root, None) {
                continue;
            }
            let position = slice.entries.len();
            slice.push(PathSearchEntry::root(
                position,
                root,
                initial_number,
                fa.is_final(initial),
            ));
            expanded.insert((initial_number, root));
            queue.push_back((position, initial));
        }

        while let Some((current, state)) = queue.pop_front() {
            let vertex = slice.entries[current].vertex();
            trace!("slice visits {vertex:?} in {}", state.show());
            for (transition, edge, next) in moves(self.graph, fa, state, vertex) {
                let target = transition.end_state();
                let number = fa.state(target).number();
                if slice.contains_key(number, next, edge) {
                    continue;
                }
                if !transition.accepts(self.graph, vertex, edge, self.subgraph)? {
                    continue;
                }
                let entry = PathSearchEntry::child(
                    slice.entries.len(),
                    &slice.entries[current],
                    next,
                    number,
                    fa.is_final(target),
                    edge,
                    edge.map(|e| self.graph.normal_edge(e)),
                );
                let position = slice.push(entry);
                if expanded.insert((number, next)) {
                    queue.push_back((position, target));
                }
            }
        }

        slice.retain_contributing();
        debug!(
            "slice for {} criteria keeps {} of {} entries",
            slice.roots.len(),
            slice.members.len(),
            slice.entries.len()
        );
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        automaton::{Dfa, Direction, EdgeSymbol, Nfa},
        graph::SimpleGraph,
        math::OrderedSet,
        search::{
            tests::{a_then_anything, chain},
            PathSearch,
        },
    };

    #[test_log::test]
    fn every_edge_on_a_matching_path_is_kept() {
        let mut graph = SimpleGraph::new();
        let node = graph.define_type("Node", &[]);
        let link = graph.define_type("Link", &[]);
        let [a, b, c, d, dead_end] = [(); 5].map(|_| graph.add_vertex(&node));
        let ab = graph.add_edge(&link, a, b);
        let ac = graph.add_edge(&link, a, c);
        let bd = graph.add_edge(&link, b, d);
        let cd = graph.add_edge(&link, c, d);
        let to_dead_end = graph.add_edge(&link, a, dead_end);

        let dfa = Dfa::from_nfa(
            Nfa::<SimpleGraph>::simple(EdgeSymbol::new(Direction::Out))
                .then(Nfa::simple(EdgeSymbol::new(Direction::Out))),
        );
        let slice = PathSearch::new(&graph, &dfa).slice([a]).unwrap();

        assert!(!slice.is_empty());
        assert_eq!(slice.entries_of(d).count(), 2, "one entry per incoming edge");
        assert_eq!(slice.vertices(), OrderedSet::from([a, b, c, d]));
        assert_eq!(slice.edges(), OrderedSet::from([ab, ac, bd, cd]));
        assert!(!slice.contains_vertex(dead_end));
        assert!(!slice.contains_edge(to_dead_end));
        assert_eq!(slice.leaves().count(), 2);
        for path in slice.extract_paths() {
            assert_eq!((path.start_vertex(), path.end_vertex()), (a, d));
        }
    }

    #[test]
    fn entries_can_be_counted_per_vertex() {
        let mut graph = SimpleGraph::new();
        let node = graph.define_type("Node", &[]);
        let link = graph.define_type("Link", &[]);
        let hub = graph.add_vertex(&node);
        let spokes = [(); 6].map(|_| graph.add_vertex(&node));
        for &spoke in &spokes {
            graph.add_edge(&link, hub, spoke);
            graph.add_edge(&link, spoke, hub);
        }

        let dfa =
            Dfa::from_nfa(Nfa::<SimpleGraph>::simple(EdgeSymbol::new(Direction::Out)).plus());
        let slice = PathSearch::new(&graph, &dfa).slice([hub]).unwrap();

        let total = slice.entries().count();
        assert!(total > 7);
        let per_vertex = std::iter::once(hub)
            .chain(spokes)
            .map(|v| slice.entries_of(v).count())
            .sum::<usize>();
        assert_eq!(per_vertex, total);
        let at_hub = slice.entries_of(hub).count();
        assert!(at_hub >= 7, "the root and one entry per returning edge");
        assert_eq!(
            slice.entries().filter(|e| e.vertex() != hub).count(),
            total - at_hub
        );
    }

    #[test]
    fn several_criteria_are_explored_together() {
        let (graph, v, e) = chain();
        let dfa = a_then_anything(&graph);
        let search = PathSearch::new(&graph, &dfa);

        let slice = search.slice([v[0], v[2], v[0]]).unwrap();
        assert_eq!(slice.roots(), &OrderedSet::from([v[0], v[2]]));
        assert_eq!(slice.vertices(), OrderedSet::from([v[0], v[1], v[2], v[3]]));
        assert_eq!(slice.edges(), OrderedSet::from([e[0], e[1], e[2]]));
        assert!(!slice.contains_vertex(v[4]));

        let nothing = search.slice([v[4]]).unwrap();
        assert!(nothing.is_empty());
        assert_eq!(nothing.entries().count(), 0);
    }
}
