//! Tag Index - inverted index over measurement indices
//!
//! Maps series → index key → index value → hour bucket → sorted shard, so
//! that several series can use the same index name without clashing.
//!
//! # Example
//! ```ignore
//! // Query: environment where location=kitchen
//! let buckets = tag_index.find("environment", "location", "kitchen")?;
//! // buckets = {"2024-04-30_13": [...], "2024-04-30_14": [...]}
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::index::{sort_shard, Buckets, Placement};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::Measurement;

/// index value → buckets
type ValueIndex = HashMap<String, Buckets>;

/// Inverted index for index-based queries
#[derive(Debug, Default)]
pub struct TagIndex {
    /// series → index key → index value → bucket → shard
    index: HashMap<String, HashMap<String, ValueIndex>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a measurement under every one of its indices
    pub fn add(&mut self, measurement: &Arc<Measurement>, bucket: &str, placement: Placement) {
        let keys = self.index.entry(measurement.name.clone()).or_default();

        for (key, value) in &measurement.indices {
            let shard = keys
                .entry(key.clone())
                .or_default()
                .entry(value.clone())
                .or_default()
                .entry(bucket.to_string())
                .or_default();

            placement.place(shard, Arc::clone(measurement));
        }
    }

    /// Find the buckets holding a series' measurements for one index value
    ///
    /// An unknown series or index key is an error; an unknown value is not,
    /// and yields `None`.
    pub fn find(&self, name: &str, key: &str, value: &str) -> StorageResult<Option<&Buckets>> {
        let keys = self
            .index
            .get(name)
            .ok_or_else(|| StorageError::NoSuchMeasurement(name.to_string()))?;

        let values = keys
            .get(key)
            .ok_or_else(|| StorageError::NoSuchIndex(key.to_string()))?;

        Ok(values.get(value))
    }

    /// All index keys known for a series
    pub fn get_keys(&self, name: &str) -> Vec<String> {
        self.index
            .get(name)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// All values seen for an index key of a series
    pub fn get_values(&self, name: &str, key: &str) -> Vec<String> {
        self.index
            .get(name)
            .and_then(|keys| keys.get(key))
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Sort every shard
    pub fn sort_all(&mut self) {
        for shard in self
            .index
            .values_mut()
            .flat_map(|keys| keys.values_mut())
            .flat_map(|values| values.values_mut())
            .flat_map(|buckets| buckets.values_mut())
        {
            sort_shard(shard);
        }
    }

    /// Number of shards across all series, keys and values
    pub fn shard_count(&self) -> usize {
        self.index
            .values()
            .flat_map(|keys| keys.values())
            .flat_map(|values| values.values())
            .map(|buckets| buckets.len())
            .sum()
    }
}
