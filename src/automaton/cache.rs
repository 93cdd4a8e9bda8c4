use std::sync::Arc;

use tracing::{debug, trace};

use crate::{graph::Datagraph, math::Map};

use super::{ConstructionError, Dfa, Nfa};

/// Keeps automata that were already built, keyed by the text of the path description they
/// were built from. The cache is an ordinary value that is handed to whoever constructs
/// automata, there is no process wide instance.
pub struct DfaCache<G: Datagraph> {
    entries: Map<String, Arc<Dfa<G>>>,
    hits: usize,
    misses: usize,
}

impl<G: Datagraph> Default for DfaCache<G> {
    fn default() -> Self {
        Self {
            entries: Map::default(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<G: Datagraph> DfaCache<G> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the automaton stored under `key`, building and storing it first if there is
    /// none. A failing `build` leaves the cache untouched.
    pub fn get_or_build<F>(&mut self, key: &str, build: F) -> Result<Arc<Dfa<G>>, ConstructionError>
    where
        F: FnOnce() -> Result<Nfa<G>, ConstructionError>,
    {
        if let Some(dfa) = self.entries.get(key) {
            self.hits += 1;
            trace!("automaton cache hit for \"{key}\"");
            return Ok(Arc::clone(dfa));
        }
        self.misses += 1;
        let dfa = Arc::new(Dfa::from_nfa(build()?));
        debug!(
            "cached automaton for \"{key}\" with {} states",
            dfa.state_count()
        );
        self.entries.insert(key.to_string(), Arc::clone(&dfa));
        Ok(dfa)
    }

    /// Returns the automaton stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<Arc<Dfa<G>>> {
        self.entries.get(key).cloned()
    }

    /// Number of cached automata.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of lookups that were answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Number of lookups that required building an automaton.
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Drops all cached automata.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        automaton::{Direction, EdgeSymbol},
        graph::SimpleGraph,
    };

    #[test]
    fn builds_once_per_key() {
        let mut cache = DfaCache::<SimpleGraph>::new();
        let mut builds = 0;
        for _ in 0..3 {
            let dfa = cache
                .get_or_build("-->*", || {
                    builds += 1;
                    Ok(Nfa::simple(EdgeSymbol::new(Direction::Out)).star())
                })
                .unwrap();
            assert_eq!(dfa.state_count(), 2);
        }
        assert_eq!(builds, 1);
        assert_eq!((cache.hits(), cache.misses()), (2, 1));
        assert!(cache.get("-->*").is_some());

        let failed = cache.get_or_build("()", || Nfa::sequence([]));
        assert_eq!(failed.unwrap_err(), ConstructionError::EmptySequence);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
