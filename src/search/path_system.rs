use std::{fmt::Debug, hash::Hash};

use itertools::Itertools;

use crate::math::OrderedSet;

use super::marker::StateMarker;

/// Records that `vertex` was visited in the state with number `state_number` and how the
/// search got there. Root entries have no parent, entries reached through a transition
/// that consumes no edge have a parent but no edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSearchEntry<V, E> {
    index: usize,
    vertex: V,
    state_number: usize,
    state_is_final: bool,
    parent: Option<usize>,
    parent_vertex: Option<V>,
    parent_state_number: Option<usize>,
    edge_to_parent: Option<E>,
    normal_edge: Option<E>,
    distance_from_root: usize,
}

impl<V: Copy, E: Copy> PathSearchEntry<V, E> {
    pub(super) fn root(index: usize, vertex: V, state_number: usize, state_is_final: bool) -> Self {
        Self {
            index,
            vertex,
            state_number,
            state_is_final,
            parent: None,
            parent_vertex: None,
            parent_state_number: None,
            edge_to_parent: None,
            normal_edge: None,
            distance_from_root: 0,
        }
    }

    pub(super) fn child(
        index: usize,
        parent: &Self,
        vertex: V,
        state_number: usize,
        state_is_final: bool,
        edge: Option<E>,
        normal_edge: Option<E>,
    ) -> Self {
        Self {
            index,
            vertex,
            state_number,
            state_is_final,
            parent: Some(parent.index),
            parent_vertex: Some(parent.vertex),
            parent_state_number: Some(parent.state_number),
            edge_to_parent: edge,
            normal_edge,
            distance_from_root: parent.distance_from_root + 1,
        }
    }

    /// The visited vertex.
    pub fn vertex(&self) -> V {
        self.vertex
    }

    /// The number of the state the vertex was visited in.
    pub fn state_number(&self) -> usize {
        self.state_number
    }

    /// Whether that state is final.
    pub fn state_is_final(&self) -> bool {
        self.state_is_final
    }

    /// The vertex the search came from, `None` for a root.
    pub fn parent_vertex(&self) -> Option<V> {
        self.parent_vertex
    }

    /// The state number the search came from, `None` for a root.
    pub fn parent_state_number(&self) -> Option<usize> {
        self.parent_state_number
    }

    /// The edge that was traversed from the parent, oriented as it was traversed. `None`
    /// for roots and for moves that stay on the vertex.
    pub fn edge_to_parent(&self) -> Option<E> {
        self.edge_to_parent
    }

    /// Number of moves from the root, including moves that consume no edge.
    pub fn distance_from_root(&self) -> usize {
        self.distance_from_root
    }

    /// Returns true if the entry has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub(super) fn normal_edge(&self) -> Option<E> {
        self.normal_edge
    }
}

/// Follows the parents of the entry at `index` back to its root.
pub(super) fn reconstruct<V: Copy, E: Copy>(
    entries: &[PathSearchEntry<V, E>],
    index: usize,
) -> Path<V, E> {
    let mut vertices = vec![entries[index].vertex];
    let mut edges = vec![];
    let mut normal_edges = vec![];
    let mut current = &entries[index];
    while let Some(parent) = current.parent {
        if let (Some(edge), Some(normal)) = (current.edge_to_parent, current.normal_edge) {
            edges.push(edge);
            normal_edges.push(normal);
            vertices.push(entries[parent].vertex);
        }
        current = &entries[parent];
    }
    vertices.reverse();
    edges.reverse();
    normal_edges.reverse();
    Path {
        vertices,
        edges,
        normal_edges,
    }
}

/// The result of a path system search: every pair of vertex and state that is reachable
/// from the root, each with the entry through which it was reached first. Entries in a
/// final state are the leaves, a path to each of them can be reconstructed.
#[derive(Debug, Clone)]
pub struct PathSystem<V, E> {
    root: V,
    entries: Vec<PathSearchEntry<V, E>>,
    index: StateMarker<V, usize>,
    leaves: Vec<usize>,
}

impl<V, E> PathSystem<V, E>
where
    V: Copy + Eq + Hash + Ord + Debug,
    E: Copy + Eq + Hash + Ord + Debug,
{
    pub(super) fn new(root: V, state_number: usize, state_is_final: bool) -> Self {
        let mut system = Self {
            root,
            entries: vec![],
            index: StateMarker::new(state_number + 1),
            leaves: vec![],
        };
        system.push(PathSearchEntry::root(0, root, state_number, state_is_final));
        system
    }

    pub(super) fn record(
        &mut self,
        parent: usize,
        vertex: V,
        state_number: usize,
        state_is_final: bool,
        edge: Option<E>,
        normal_edge: Option<E>,
    ) -> usize {
        let entry = PathSearchEntry::child(
            self.entries.len(),
            &self.entries[parent],
            vertex,
            state_number,
            state_is_final,
            edge,
            normal_edge,
        );
        self.push(entry)
    }

    fn push(&mut self, entry: PathSearchEntry<V, E>) -> usize {
        let position = entry.index;
        debug_assert_eq!(position, self.entries.len());
        self.index.insert(entry.state_number, entry.vertex, position);
        if entry.state_is_final {
            self.leaves.push(position);
        }
        self.entries.push(entry);
        position
    }

    pub(super) fn entry_at(&self, index: usize) -> &PathSearchEntry<V, E> {
        &self.entries[index]
    }

    /// The vertex the search started at.
    pub fn root(&self) -> V {
        self.root
    }

    /// The entry for `vertex` visited in the state with number `state_number`.
    pub fn entry(&self, state_number: usize, vertex: V) -> Option<&PathSearchEntry<V, E>> {
        self.index
            .get(state_number, &vertex)
            .map(|&index| &self.entries[index])
    }

    /// All entries in the order they were discovered.
    pub fn entries(&self) -> impl Iterator<Item = &PathSearchEntry<V, E>> + '_ {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false, the root has an entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries that were visited in a final state, in the order they were discovered.
    pub fn leaves(&self) -> impl Iterator<Item = &PathSearchEntry<V, E>> + '_ {
        self.leaves.iter().map(|&index| &self.entries[index])
    }

    /// Returns true if `vertex` was visited in a final state.
    pub fn is_leaf(&self, vertex: V) -> bool {
        self.leaves().any(|entry| entry.vertex == vertex)
    }

    /// Returns true if `vertex` was visited in any state.
    pub fn contains_vertex(&self, vertex: V) -> bool {
        self.entries.iter().any(|entry| entry.vertex == vertex)
    }

    /// Returns true if the (normalized) `edge` was traversed.
    pub fn contains_edge(&self, edge: E) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.normal_edge == Some(edge))
    }

    /// All visited vertices.
    pub fn vertices(&self) -> OrderedSet<V> {
        self.entries.iter().map(|entry| entry.vertex).collect()
    }

    /// The smallest distance at which `vertex` was visited in a final state.
    pub fn distance(&self, vertex: V) -> Option<usize> {
        self.leaves()
            .filter(|entry| entry.vertex == vertex)
            .map(|entry| entry.distance_from_root)
            .min()
    }

    /// A shortest path from the root to `vertex` that ends in a final state.
    pub fn extract_path(&self, vertex: V) -> Option<Path<V, E>> {
        self.leaves()
            .filter(|entry| entry.vertex == vertex)
            .min_by_key(|entry| entry.distance_from_root)
            .map(|entry| self.extract_path_from(entry))
    }

    /// The path from the root to the given entry of this path system.
    pub fn extract_path_from(&self, entry: &PathSearchEntry<V, E>) -> Path<V, E> {
        reconstruct(&self.entries, entry.index)
    }

    /// One path for every leaf.
    pub fn extract_paths(&self) -> Vec<Path<V, E>> {
        self.leaves
            .iter()
            .map(|&index| reconstruct(&self.entries, index))
            .collect()
    }

    /// The largest distance of any entry from the root.
    pub fn depth(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.distance_from_root)
            .max()
            .unwrap_or_default()
    }
}

/// A path through the graph, an alternating sequence of vertices and the edges between
/// them. Edges are oriented as they were traversed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path<V, E> {
    vertices: Vec<V>,
    edges: Vec<E>,
    normal_edges: Vec<E>,
}

impl<V: Copy + Eq, E: Copy + Eq + Hash> Path<V, E> {
    /// The first vertex.
    pub fn start_vertex(&self) -> V {
        self.vertices[0]
    }

    /// The last vertex.
    pub fn end_vertex(&self) -> V {
        self.vertices[self.vertices.len() - 1]
    }

    /// Number of edges.
    pub fn length(&self) -> usize {
        self.edges.len()
    }

    /// The vertices from start to end.
    pub fn vertices(&self) -> &[V] {
        &self.vertices
    }

    /// The edges from start to end.
    pub fn edges(&self) -> &[E] {
        &self.edges
    }

    /// Returns true if the path passes `vertex`.
    pub fn contains_vertex(&self, vertex: V) -> bool {
        self.vertices.contains(&vertex)
    }

    /// Returns true if the path traverses the (normalized) `edge` in either direction.
    pub fn contains_edge(&self, edge: E) -> bool {
        self.normal_edges.contains(&edge)
    }

    /// Returns true if no edge is traversed twice.
    pub fn is_trail(&self) -> bool {
        self.normal_edges.iter().all_unique()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        automaton::{Dfa, Direction, EdgeSymbol, Nfa},
        evaluate::{shared, Value},
        graph::SimpleGraph,
        search::{
            tests::{a_then_anything, chain},
            PathSearch,
        },
    };

    #[test_log::test]
    fn leaves_lead_back_to_the_root() {
        let (graph, v, e) = chain();
        let dfa = a_then_anything(&graph);
        let system = PathSearch::new(&graph, &dfa).path_system(v[0]).unwrap();

        assert_eq!(system.root(), v[0]);
        assert_eq!(
            system.leaves().map(|entry| entry.vertex()).collect::<Vec<_>>(),
            vec![v[1], v[2], v[3]]
        );
        for leaf in system.leaves() {
            let mut current = leaf;
            let mut steps = 0;
            while let (Some(vertex), Some(state)) =
                (current.parent_vertex(), current.parent_state_number())
            {
                current = system.entry(state, vertex).unwrap();
                steps += 1;
                assert!(steps <= system.len());
            }
            assert!(current.is_root());
            assert_eq!(current.vertex(), system.root());
            assert_eq!(steps, leaf.distance_from_root());
        }

        assert!(system.is_leaf(v[3]));
        assert!(!system.is_leaf(v[0]));
        assert!(!system.contains_vertex(v[4]));
        assert!(system.contains_edge(e[2]));
        assert!(!system.contains_edge(e[3]));
        assert_eq!(system.distance(v[3]), Some(3));
        assert_eq!(system.depth(), 3);
        assert_eq!(system.extract_paths().len(), 3);

        let path = system.extract_path(v[3]).unwrap();
        assert_eq!((path.start_vertex(), path.end_vertex()), (v[0], v[3]));
        assert_eq!(path.length(), 3);
        assert!(path.is_trail());
        assert!(path.contains_edge(e[1]));
        assert!(!path.contains_vertex(v[4]));
    }

    #[test]
    fn moves_without_edges_count_as_distance_but_not_as_steps() {
        let mut graph = SimpleGraph::new();
        let node = graph.define_type("Node", &[]);
        let link = graph.define_type("Link", &[]);
        let a = graph.add_vertex(&node);
        let b = graph.add_vertex(&node);
        let c = graph.add_vertex(&node);
        let d = graph.add_vertex(&node);
        graph.add_edge(&link, a, b);
        graph.add_edge(&link, a, c);
        graph.add_edge(&link, b, d);
        graph.add_edge(&link, c, d);

        let nfa = Nfa::simple(EdgeSymbol::new(Direction::Out)).with_intermediate_vertex(
            shared(move |_, _| Ok(Value::Vertex(b))),
            Nfa::simple(EdgeSymbol::new(Direction::Out)),
        );
        let dfa = Dfa::from_nfa(nfa);
        let system = PathSearch::new(&graph, &dfa).path_system(a).unwrap();

        assert_eq!(system.distance(d), Some(3));
        let path = system.extract_path(d).unwrap();
        assert_eq!(path.vertices(), &[a, b, d]);
        assert_eq!(path.length(), 2);
        assert!(system.extract_path(c).is_none());
    }

    #[test]
    fn a_final_root_is_a_leaf_with_an_empty_path() {
        let (graph, v, _) = chain();
        let dfa = Dfa::from_nfa(Nfa::<SimpleGraph>::simple(EdgeSymbol::new(Direction::Any)).star());
        let system = PathSearch::new(&graph, &dfa).path_system(v[2]).unwrap();
        assert!(system.is_leaf(v[2]));
        let path = system.extract_path(v[2]).unwrap();
        assert_eq!(path.length(), 0);
        assert_eq!(path.start_vertex(), path.end_vertex());
        assert_eq!(system.vertices().len(), 5);
    }
}
