use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::clock::Clock;

struct Entry<V> {
    value: V,
    created_at: Instant,
}

/// Time-windowed cache of fetched sheets, keyed by source identifier.
///
/// Entries older than `ttl` are dropped on every access. When `max_entries`
/// is reached the oldest entry makes room for the new one.
pub struct FetchCache<V, C> {
    ttl: Duration,
    max_entries: usize,
    clock: C,
    entries: HashMap<String, Entry<V>>,
}

impl<V: Clone, C: Clock> FetchCache<V, C> {
    pub fn new(ttl: Duration, max_entries: usize, clock: C) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            clock,
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<V> {
        self.evict_expired();
        self.entries.get(key).map(|e| e.value.clone())
    }

    pub fn insert(&mut self, key: String, value: V) {
        self.evict_expired();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            if let Some(victim) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&victim);
            }
        }
        let created_at = self.clock.now();
        self.entries.insert(key, Entry { value, created_at });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_expired(&mut self) {
        let now = self.clock.now();
        let ttl = self.ttl;
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.created_at) < ttl);
    }
}
