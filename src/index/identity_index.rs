//! Identity Index - canonical pointer per identity key
//!
//! Maps identity key → the most recently ingested measurement holding it.
//! `upsert` leaves older physical copies in the shards; this map is what
//! decides which copy is live when a query asks for deduplication.

use std::collections::HashMap;
use std::sync::Arc;

use crate::storage::types::Measurement;

/// Identity key → canonical measurement
#[derive(Debug, Default)]
pub struct IdentityIndex {
    ids: HashMap<String, Arc<Measurement>>,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if any of the keys is already taken
    pub fn contains_any(&self, keys: &[String]) -> bool {
        keys.iter().any(|k| self.ids.contains_key(k))
    }

    /// Point every key at this measurement, replacing previous owners
    pub fn claim(&mut self, keys: &[String], measurement: &Arc<Measurement>) {
        for key in keys {
            self.ids.insert(key.clone(), Arc::clone(measurement));
        }
    }

    /// The canonical measurement for a key
    pub fn get(&self, key: &str) -> Option<&Arc<Measurement>> {
        self.ids.get(key)
    }

    /// Whether this exact physical measurement is canonical for at least one
    /// of its identity keys
    pub fn is_canonical(&self, measurement: &Arc<Measurement>) -> bool {
        measurement
            .identity_keys()
            .iter()
            .any(|k| matches!(self.ids.get(k), Some(c) if Arc::ptr_eq(c, measurement)))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
