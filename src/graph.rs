//! The contract a datagraph has to fulfill so that automata can be interpreted on it.
//!
//! The path search never touches a concrete graph representation directly. Instead it
//! talks to an implementation of [`Datagraph`], which exposes the incidences of a vertex
//! together with the little bit of schema information that transitions need: the runtime
//! type of vertices and edges, roles and composition kinds at the ends of an edge.
use std::{collections::BTreeSet, fmt::Debug, hash::Hash};

use crate::math::Set;

/// An in-memory implementation of [`Datagraph`].
pub mod simple;
pub use simple::{ElementType, Incidence, SimpleGraph, VertexId};

/// Identifies one of the two ends of an edge, relative to the incidence through which
/// the edge is looked at. `This` is the end at the vertex the incidence belongs to,
/// `That` is the far end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeEnd {
    /// The end at the current vertex.
    This,
    /// The far end of the edge.
    That,
}

impl EdgeEnd {
    /// Returns the opposite end.
    pub fn opposite(self) -> Self {
        match self {
            EdgeEnd::This => EdgeEnd::That,
            EdgeEnd::That => EdgeEnd::This,
        }
    }
}

/// Whether an edge end represents ownership, reference sharing or a plain association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum AggregationKind {
    /// Plain association.
    #[default]
    None,
    /// The vertex at this end references the other one in a shared manner.
    Shared,
    /// The vertex at this end owns the other one.
    Composite,
}

/// A runtime type of a graph element, arranged in some subtype hierarchy. Types are stored
/// in transitions, so they have to be shareable between threads like evaluators.
pub trait SchemaType: Clone + Ord + Hash + Debug + Send + Sync {
    /// Returns true if `self` equals `other` or is a (transitive) subtype of it.
    fn is_subtype_of(&self, other: &Self) -> bool;
}

/// A graph whose vertices and edges carry runtime types and which can enumerate the
/// incidences of each vertex.
///
/// The associated type [`Datagraph::Edge`] does not stand for a physical edge but for an
/// oriented occurrence of it. An edge from `a` to `b` is seen as a *normal* incidence when
/// iterating the incidences of `a` and as a reversed one when iterating those of `b`.
/// [`Datagraph::normal_edge`] maps both occurrences to the same value.
pub trait Datagraph {
    /// Handle of a vertex.
    type Vertex: Copy + Eq + Hash + Ord + Debug;
    /// Handle of an oriented edge occurrence.
    type Edge: Copy + Eq + Hash + Ord + Debug;
    /// Runtime type of vertices and edges.
    type Type: SchemaType;

    /// Returns the incidences of `vertex` in the order in which they should be explored.
    fn incident_edges(&self, vertex: Self::Vertex) -> impl Iterator<Item = Self::Edge> + '_;

    /// The vertex the incidence `edge` belongs to.
    fn this_vertex(&self, edge: Self::Edge) -> Self::Vertex;

    /// The far endpoint of `edge`.
    fn that_vertex(&self, edge: Self::Edge) -> Self::Vertex;

    /// Returns true if `edge` is seen from its start vertex.
    fn is_normal(&self, edge: Self::Edge) -> bool;

    /// The direction independent representative of `edge`.
    fn normal_edge(&self, edge: Self::Edge) -> Self::Edge;

    /// The runtime type of `vertex`.
    fn vertex_type(&self, vertex: Self::Vertex) -> &Self::Type;

    /// The runtime type of `edge`.
    fn edge_type(&self, edge: Self::Edge) -> &Self::Type;

    /// The composition kind at the given `end` of `edge`.
    fn composition_kind(&self, edge: Self::Edge, end: EdgeEnd) -> AggregationKind;

    /// The role name at the given `end` of `edge`, if there is one.
    fn role(&self, edge: Self::Edge, end: EdgeEnd) -> Option<&str>;

    /// A dense, non-negative index of `vertex`. Used by bitset backed markers.
    fn vertex_index(&self, vertex: Self::Vertex) -> usize;

    /// An upper bound on [`Datagraph::vertex_index`], used to presize markers. Markers
    /// grow on demand, so returning `0` is always correct.
    fn vertex_capacity(&self) -> usize {
        0
    }
}

/// Restricts a search to a part of the datagraph. Edge consuming transitions only fire on
/// edges that are contained in the restriction.
pub trait SubgraphRestriction<G: Datagraph> {
    /// Returns true if the (normalized) `edge` belongs to the subgraph.
    fn contains_edge(&self, edge: G::Edge) -> bool;
}

impl<G: Datagraph> SubgraphRestriction<G> for Set<G::Edge> {
    fn contains_edge(&self, edge: G::Edge) -> bool {
        self.contains(&edge)
    }
}

/// A collection of types that is used to decide whether an element with a given runtime
/// type is acceptable. It consists of an allowed and a forbidden set: a type is accepted
/// if it is a subtype of no forbidden type and, unless the allowed set is empty, a subtype
/// of at least one allowed type.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeCollection<T: Ord> {
    allowed: BTreeSet<T>,
    forbidden: BTreeSet<T>,
}

impl<T: Ord> Default for TypeCollection<T> {
    fn default() -> Self {
        Self {
            allowed: BTreeSet::new(),
            forbidden: BTreeSet::new(),
        }
    }
}

impl<T: SchemaType> TypeCollection<T> {
    /// A collection that accepts every type.
    pub fn any() -> Self {
        Self::default()
    }

    /// An allow-list, accepting exactly the given types and their subtypes.
    pub fn allowing<I: IntoIterator<Item = T>>(types: I) -> Self {
        Self {
            allowed: types.into_iter().collect(),
            forbidden: BTreeSet::new(),
        }
    }

    /// A deny-list, accepting everything except the given types and their subtypes.
    pub fn forbidding<I: IntoIterator<Item = T>>(types: I) -> Self {
        Self {
            allowed: BTreeSet::new(),
            forbidden: types.into_iter().collect(),
        }
    }

    /// Additionally forbids the given types.
    pub fn and_forbidding<I: IntoIterator<Item = T>>(mut self, types: I) -> Self {
        self.forbidden.extend(types);
        self
    }

    /// Returns true if no restriction is imposed.
    pub fn accepts_all(&self) -> bool {
        self.allowed.is_empty() && self.forbidden.is_empty()
    }

    /// Decides whether an element of type `ty` is accepted.
    pub fn accepts(&self, ty: &T) -> bool {
        if self.forbidden.iter().any(|f| ty.is_subtype_of(f)) {
            return false;
        }
        self.allowed.is_empty() || self.allowed.iter().any(|a| ty.is_subtype_of(a))
    }

    /// The allowed types.
    pub fn allowed(&self) -> impl Iterator<Item = &T> + '_ {
        self.allowed.iter()
    }

    /// The forbidden types.
    pub fn forbidden(&self) -> impl Iterator<Item = &T> + '_ {
        self.forbidden.iter()
    }
}

impl<T: Ord + Debug> Debug for TypeCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.allowed.is_empty() && self.forbidden.is_empty() {
            return write!(f, "{{*}}");
        }
        write!(f, "{{")?;
        let mut first = true;
        for ty in &self.allowed {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{ty:?}")?;
            first = false;
        }
        for ty in &self.forbidden {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "^{ty:?}")?;
            first = false;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_collection_semantics() {
        let mut graph = SimpleGraph::new();
        let base = graph.define_type("Base", &[]);
        let derived = graph.define_type("Derived", &["Base"]);
        let other = graph.define_type("Other", &[]);

        let allow = TypeCollection::allowing([base.clone()]);
        assert!(allow.accepts(&base));
        assert!(allow.accepts(&derived));
        assert!(!allow.accepts(&other));

        let deny = TypeCollection::forbidding([base.clone()]);
        assert!(!deny.accepts(&derived));
        assert!(deny.accepts(&other));

        let mixed = TypeCollection::allowing([base.clone()]).and_forbidding([derived.clone()]);
        assert!(mixed.accepts(&base));
        assert!(!mixed.accepts(&derived));

        assert!(TypeCollection::<ElementType>::any().accepts(&other));
        assert_eq!(
            TypeCollection::allowing([base.clone(), other.clone()]),
            TypeCollection::allowing([other, base]),
            "equality is structural"
        );
    }
}
