//! Resident connections keyed by destination

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::utils::now;

/// A connection resident in the pool
#[derive(Debug)]
pub struct ConnectionRecord<C> {
    key: String,
    handle: Arc<C>,
    opened_at: DateTime<Utc>,
}

impl<C> ConnectionRecord<C> {
    pub fn new(key: &str, handle: Arc<C>) -> Self {
        Self {
            key: key.to_string(),
            handle,
            opened_at: now(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn handle(&self) -> &Arc<C> {
        &self.handle
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn into_handle(self) -> Arc<C> {
        self.handle
    }
}

/// Destination key → resident connection
#[derive(Debug)]
pub struct ConnectionStore<C> {
    records: HashMap<String, ConnectionRecord<C>>,
}

impl<C> ConnectionStore<C> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: HashMap::with_capacity(capacity),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConnectionRecord<C>> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Insert a record, returning the one it displaced, if any
    pub fn insert(&mut self, record: ConnectionRecord<C>) -> Option<ConnectionRecord<C>> {
        self.records.insert(record.key.clone(), record)
    }

    pub fn remove(&mut self, key: &str) -> Option<ConnectionRecord<C>> {
        self.records.remove(key)
    }

    /// Remove and return every record
    pub fn drain(&mut self) -> Vec<ConnectionRecord<C>> {
        self.records.drain().map(|(_, record)| record).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
