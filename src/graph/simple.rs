use std::{fmt::Debug, hash::Hash, sync::Arc};

use crate::math::Map;

use super::{AggregationKind, Datagraph, EdgeEnd, SchemaType};

/// Index of a vertex in a [`SimpleGraph`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexId(u32);

impl VertexId {
    /// Returns the position of the vertex in its graph.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Debug for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// An oriented occurrence of an edge of a [`SimpleGraph`]. The normal incidence belongs
/// to the start vertex (alpha) of the edge, the reversed one to its end vertex (omega).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Incidence {
    edge: u32,
    normal: bool,
}

impl Incidence {
    /// Index of the underlying edge.
    pub fn edge_index(self) -> usize {
        self.edge as usize
    }

    /// Returns true if this is the occurrence at the start vertex.
    pub fn is_normal(self) -> bool {
        self.normal
    }

    /// The occurrence of the same edge at its other end.
    pub fn reversed(self) -> Self {
        Self {
            edge: self.edge,
            normal: !self.normal,
        }
    }

    /// The occurrence of the same edge at its start vertex.
    pub fn normalized(self) -> Self {
        Self {
            edge: self.edge,
            normal: true,
        }
    }
}

impl Debug for Incidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}e{}", if self.normal { "+" } else { "-" }, self.edge)
    }
}

struct TypeInfo {
    name: String,
    supertypes: Vec<ElementType>,
}

/// A named type in the schema of a [`SimpleGraph`]. Types are compared by name, subtyping
/// follows the declared supertypes transitively.
#[derive(Clone)]
pub struct ElementType(Arc<TypeInfo>);

impl ElementType {
    /// The name of the type.
    pub fn name(&self) -> &str {
        &self.0.name
    }
}

impl PartialEq for ElementType {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl Eq for ElementType {}

impl PartialOrd for ElementType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ElementType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.name.cmp(&other.0.name)
    }
}

impl Hash for ElementType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.name.hash(state)
    }
}

impl Debug for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

impl SchemaType for ElementType {
    fn is_subtype_of(&self, other: &Self) -> bool {
        self == other || self.0.supertypes.iter().any(|s| s.is_subtype_of(other))
    }
}

struct VertexData {
    ty: ElementType,
    incidences: Vec<Incidence>,
}

struct EdgeData {
    ty: ElementType,
    alpha: VertexId,
    omega: VertexId,
    // indexed by 0 for the alpha end and 1 for the omega end
    kinds: [AggregationKind; 2],
    roles: [Option<String>; 2],
}

/// A simple in-memory datagraph. Vertices and edges are stored in vectors and never
/// removed, every vertex keeps its incidences in insertion order.
#[derive(Default)]
pub struct SimpleGraph {
    types: Map<String, ElementType>,
    vertices: Vec<VertexData>,
    edges: Vec<EdgeData>,
}

impl SimpleGraph {
    /// Creates an empty graph with an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a type with the given supertypes and returns it. Supertypes that have not
    /// been declared yet are declared as types without supertypes. Declaring a name twice
    /// returns the existing type.
    pub fn define_type(&mut self, name: &str, supertypes: &[&str]) -> ElementType {
        if let Some(existing) = self.types.get(name) {
            return existing.clone();
        }
        let supertypes = supertypes
            .iter()
            .map(|s| self.define_type(s, &[]))
            .collect();
        let ty = ElementType(Arc::new(TypeInfo {
            name: name.to_string(),
            supertypes,
        }));
        self.types.insert(name.to_string(), ty.clone());
        ty
    }

    /// Looks up a declared type by its name.
    pub fn element_type(&self, name: &str) -> Option<ElementType> {
        self.types.get(name).cloned()
    }

    /// Adds a vertex of type `ty`.
    pub fn add_vertex(&mut self, ty: &ElementType) -> VertexId {
        let id = VertexId(handle(self.vertices.len(), "vertices"));
        self.vertices.push(VertexData {
            ty: ty.clone(),
            incidences: vec![],
        });
        id
    }

    /// Adds an edge of type `ty` from `alpha` to `omega` and returns its normal incidence.
    pub fn add_edge(&mut self, ty: &ElementType, alpha: VertexId, omega: VertexId) -> Incidence {
        assert!(
            alpha.index() < self.vertices.len() && omega.index() < self.vertices.len(),
            "cannot connect {alpha:?} and {omega:?}, there are only {} vertices",
            self.vertices.len()
        );
        let edge = handle(self.edges.len(), "edges");
        self.edges.push(EdgeData {
            ty: ty.clone(),
            alpha,
            omega,
            kinds: [AggregationKind::None; 2],
            roles: [None, None],
        });
        let normal = Incidence { edge, normal: true };
        self.vertices[alpha.index()].incidences.push(normal);
        self.vertices[omega.index()].incidences.push(normal.reversed());
        normal
    }

    /// Sets the composition kind at the given end of `edge`, relative to the incidence.
    pub fn set_composition_kind(&mut self, edge: Incidence, end: EdgeEnd, kind: AggregationKind) {
        let slot = Self::end_slot(edge, end);
        self.edges[edge.edge_index()].kinds[slot] = kind;
    }

    /// Sets the role name at the given end of `edge`, relative to the incidence.
    pub fn set_role(&mut self, edge: Incidence, end: EdgeEnd, role: &str) {
        let slot = Self::end_slot(edge, end);
        self.edges[edge.edge_index()].roles[slot] = Some(role.to_string());
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Iterates over all vertices in insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.vertices.len()).map(|i| VertexId(handle(i, "vertices")))
    }

    /// Iterates over the normal incidences of all edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = Incidence> + '_ {
        (0..self.edges.len()).map(|i| Incidence {
            edge: handle(i, "edges"),
            normal: true,
        })
    }

    /// The start vertex of `edge`, independent of the orientation.
    pub fn alpha(&self, edge: Incidence) -> VertexId {
        self.edges[edge.edge_index()].alpha
    }

    /// The end vertex of `edge`, independent of the orientation.
    pub fn omega(&self, edge: Incidence) -> VertexId {
        self.edges[edge.edge_index()].omega
    }

    fn end_slot(edge: Incidence, end: EdgeEnd) -> usize {
        match (end, edge.normal) {
            (EdgeEnd::This, true) | (EdgeEnd::That, false) => 0,
            (EdgeEnd::This, false) | (EdgeEnd::That, true) => 1,
        }
    }
}

impl Datagraph for SimpleGraph {
    type Vertex = VertexId;
    type Edge = Incidence;
    type Type = ElementType;

    fn incident_edges(&self, vertex: VertexId) -> impl Iterator<Item = Incidence> + '_ {
        self.vertices[vertex.index()].incidences.iter().copied()
    }

    fn this_vertex(&self, edge: Incidence) -> VertexId {
        if edge.normal {
            self.alpha(edge)
        } else {
            self.omega(edge)
        }
    }

    fn that_vertex(&self, edge: Incidence) -> VertexId {
        if edge.normal {
            self.omega(edge)
        } else {
            self.alpha(edge)
        }
    }

    fn is_normal(&self, edge: Incidence) -> bool {
        edge.normal
    }

    fn normal_edge(&self, edge: Incidence) -> Incidence {
        edge.normalized()
    }

    fn vertex_type(&self, vertex: VertexId) -> &ElementType {
        &self.vertices[vertex.index()].ty
    }

    fn edge_type(&self, edge: Incidence) -> &ElementType {
        &self.edges[edge.edge_index()].ty
    }

    fn composition_kind(&self, edge: Incidence, end: EdgeEnd) -> AggregationKind {
        self.edges[edge.edge_index()].kinds[Self::end_slot(edge, end)]
    }

    fn role(&self, edge: Incidence, end: EdgeEnd) -> Option<&str> {
        self.edges[edge.edge_index()].roles[Self::end_slot(edge, end)].as_deref()
    }

    fn vertex_index(&self, vertex: VertexId) -> usize {
        vertex.index()
    }

    fn vertex_capacity(&self) -> usize {
        self.vertices.len()
    }
}

/// Converts an arena position into a handle. The graph holds at most `u32::MAX + 1`
/// vertices and as many edges.
fn handle(position: usize, what: &str) -> u32 {
    u32::try_from(position).unwrap_or_else(|_| {
        panic!("a graph cannot hold more than {} {what}", u64::from(u32::MAX) + 1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    #[test]
    fn handles_cover_the_whole_u32_range() {
        assert_eq!(handle(0, "vertices"), 0);
        assert_eq!(handle(u32::MAX as usize, "edges"), u32::MAX);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic(expected = "a graph cannot hold more than 4294967296 edges")]
    fn positions_beyond_u32_are_rejected() {
        handle(u32::MAX as usize + 1, "edges");
    }

    #[test]
    fn incidences_and_ends() {
        let mut graph = SimpleGraph::new();
        let node = graph.define_type("Node", &[]);
        let link = graph.define_type("Link", &[]);
        let a = graph.add_vertex(&node);
        let b = graph.add_vertex(&node);
        let e = graph.add_edge(&link, a, b);
        graph.set_composition_kind(e, EdgeEnd::This, AggregationKind::Composite);
        graph.set_role(e, EdgeEnd::That, "part");

        assert_eq!(graph.incident_edges(a).collect_vec(), vec![e]);
        assert_eq!(graph.incident_edges(b).collect_vec(), vec![e.reversed()]);
        assert_eq!(graph.that_vertex(e), b);
        assert_eq!(graph.that_vertex(e.reversed()), a);
        assert_eq!(graph.this_vertex(e.reversed()), b);

        let back = e.reversed();
        assert_eq!(
            graph.composition_kind(back, EdgeEnd::That),
            AggregationKind::Composite
        );
        assert_eq!(graph.composition_kind(back, EdgeEnd::This), AggregationKind::None);
        assert_eq!(graph.role(back, EdgeEnd::This), Some("part"));
        assert_eq!(graph.normal_edge(back), e);
    }

    #[test]
    fn subtyping_is_transitive() {
        let mut graph = SimpleGraph::new();
        let top = graph.define_type("Top", &[]);
        let mid = graph.define_type("Mid", &["Top"]);
        let low = graph.define_type("Low", &["Mid"]);
        assert!(low.is_subtype_of(&top));
        assert!(low.is_subtype_of(&mid));
        assert!(!top.is_subtype_of(&low));
        assert_eq!(graph.element_type("Mid"), Some(mid));
    }
}
