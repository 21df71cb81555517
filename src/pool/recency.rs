//! Recency tracking and LRU victim selection
//!
//! Every access stamps the key with a strictly increasing tick. Ticks are
//! indexed in a `BTreeMap`, so the least recently used key is always the
//! first entry: victim lookup and refresh are O(log n) and never tie.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// Last access of one resident key
#[derive(Debug, Clone)]
pub struct RecencyEntry {
    pub key: String,
    pub last_accessed: Instant,
    tick: u64,
}

/// Destination key → last access, ordered for eviction
#[derive(Debug, Default)]
pub struct RecencyTracker {
    entries: HashMap<String, RecencyEntry>,
    order: BTreeMap<u64, String>,
    next_tick: u64,
}

impl RecencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as used now, inserting it if it is not tracked yet
    pub fn touch(&mut self, key: &str) {
        let tick = self.next_tick;
        self.next_tick += 1;
        let last_accessed = Instant::now();

        match self.entries.get_mut(key) {
            Some(entry) => {
                self.order.remove(&entry.tick);
                entry.tick = tick;
                entry.last_accessed = last_accessed;
            }
            None => {
                self.entries.insert(
                    key.to_string(),
                    RecencyEntry {
                        key: key.to_string(),
                        last_accessed,
                        tick,
                    },
                );
            }
        }
        self.order.insert(tick, key.to_string());
    }

    /// The least recently used key. Does not mutate.
    pub fn select_victim(&self) -> Option<&str> {
        self.order.first_key_value().map(|(_, key)| key.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<RecencyEntry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.tick);
        Some(entry)
    }

    pub fn get(&self, key: &str) -> Option<&RecencyEntry> {
        self.entries.get(key)
    }

    /// Keys from most to least recently used
    pub fn keys_by_recency(&self) -> Vec<String> {
        self.order.values().rev().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
