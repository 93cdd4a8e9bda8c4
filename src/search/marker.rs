use std::hash::Hash;

use bit_set::BitSet;

use crate::math::Map;

/// Remembers which pairs of state number and vertex index were visited. There is one
/// bitset per state, both the number of states and the bitsets grow on demand.
#[derive(Debug, Clone, Default)]
pub struct VisitedMarker {
    states: Vec<BitSet>,
}

impl VisitedMarker {
    /// Creates a marker for `state_count` states, each presized for `vertex_capacity`
    /// vertex indices.
    pub fn new(state_count: usize, vertex_capacity: usize) -> Self {
        Self {
            states: (0..state_count)
                .map(|_| BitSet::with_capacity(vertex_capacity))
                .collect(),
        }
    }

    /// Returns true if `index` was marked for `state`.
    pub fn is_marked(&self, state: usize, index: usize) -> bool {
        self.states
            .get(state)
            .is_some_and(|vertices| vertices.contains(index))
    }

    /// Marks `index` for `state`, returns true if it was not marked before.
    pub fn mark(&mut self, state: usize, index: usize) -> bool {
        if state >= self.states.len() {
            self.states.resize_with(state + 1, BitSet::new);
        }
        self.states[state].insert(index)
    }

    /// Total number of marked pairs.
    pub fn len(&self) -> usize {
        self.states.iter().map(BitSet::len).sum()
    }

    /// Returns true if nothing is marked.
    pub fn is_empty(&self) -> bool {
        self.states.iter().all(BitSet::is_empty)
    }
}

/// Attaches a value to pairs of state number and key, typically a vertex. Lookups go
/// through the state number first, so the per-state maps stay small.
#[derive(Debug, Clone)]
pub struct StateMarker<K, T> {
    states: Vec<Map<K, T>>,
}

impl<K: Eq + Hash, T> StateMarker<K, T> {
    /// Creates a marker for `state_count` states, more states are added on demand.
    pub fn new(state_count: usize) -> Self {
        Self {
            states: (0..state_count).map(|_| Map::default()).collect(),
        }
    }

    /// The value attached to `key` in `state`.
    pub fn get(&self, state: usize, key: &K) -> Option<&T> {
        self.states.get(state).and_then(|values| values.get(key))
    }

    /// Returns true if a value is attached to `key` in `state`.
    pub fn contains(&self, state: usize, key: &K) -> bool {
        self.get(state, key).is_some()
    }

    /// Attaches `value` to `key` in `state` and returns the value that was attached before.
    pub fn insert(&mut self, state: usize, key: K, value: T) -> Option<T> {
        self.values_mut(state).insert(key, value)
    }

    /// The value attached to `key` in `state`, attaching the default value first if there
    /// is none.
    pub fn get_or_default(&mut self, state: usize, key: K) -> &mut T
    where
        T: Default,
    {
        self.values_mut(state).entry(key).or_default()
    }

    /// Total number of values.
    pub fn len(&self) -> usize {
        self.states.iter().map(Map::len).sum()
    }

    /// Returns true if no value is attached to anything.
    pub fn is_empty(&self) -> bool {
        self.states.iter().all(Map::is_empty)
    }

    fn values_mut(&mut self, state: usize) -> &mut Map<K, T> {
        if state >= self.states.len() {
            self.states.resize_with(state + 1, Map::default);
        }
        &mut self.states[state]
    }
}
