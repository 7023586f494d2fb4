//! Index Manager - Coordinates all Hourglass indexes
//!
//! Provides a unified interface to:
//! - TimeIndex (series → hour → shard, for whole-series queries)
//! - TagIndex (series → index → value → hour → shard, for index queries)
//! - IdentityIndex (identity key → canonical measurement)
//! - FieldIndex (series → field → kind)
//!
//! These structures are only consistent with one another as a whole: an
//! identity entry and the shards holding the same record must agree. The
//! manager is therefore mutated as one unit, under the engine's write lock.
//!
//! # Query Path
//!
//! ```text
//! Query: "environment where location=kitchen, deduplicated, last 2 hours"
//!
//! 1. TagIndex: buckets for environment/location/kitchen
//! 2. TimeWindow: drop buckets outside [now-2h, now], trim the edges
//! 3. Order buckets by first timestamp, flatten
//! 4. IdentityIndex: keep only canonical physical records
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use crate::index::{
    Buckets, FieldIndex, IdentityIndex, IndexStats, Placement, TagIndex, TimeIndex,
};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::range::QueryOptions;
use crate::storage::types::{FieldKind, Measurement};

/// Coordinates all index types
#[derive(Debug, Default)]
pub struct IndexManager {
    time_index: TimeIndex,
    tag_index: TagIndex,
    identity_index: IdentityIndex,
    field_index: FieldIndex,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Update Methods ====================

    /// Add a measurement to every structure
    ///
    /// No duplicate check happens here: every identity key is pointed at
    /// this measurement, replacing any previous owner.
    pub fn add(
        &mut self,
        measurement: Arc<Measurement>,
        identity_keys: &[String],
        fields: HashMap<String, FieldKind>,
        placement: Placement,
    ) {
        let bucket = measurement.bucket_key();

        self.time_index.add(&measurement, &bucket, placement);
        self.tag_index.add(&measurement, &bucket, placement);
        self.identity_index.claim(identity_keys, &measurement);
        self.field_index.merge(&measurement.name, fields);
    }

    /// Check if any identity key is already held by a stored measurement
    pub fn has_identity(&self, identity_keys: &[String]) -> bool {
        self.identity_index.contains_any(identity_keys)
    }

    /// Sort every shard in bulk
    pub fn sort_all(&mut self) {
        self.time_index.sort_all();
        self.tag_index.sort_all();
    }

    // ==================== Query Methods ====================

    /// All measurements of a series, in timestamp order
    pub fn find_series(
        &self,
        name: &str,
        options: Option<&QueryOptions>,
    ) -> StorageResult<Vec<Arc<Measurement>>> {
        let buckets = self
            .time_index
            .buckets(name)
            .ok_or_else(|| StorageError::NoSuchMeasurement(name.to_string()))?;

        Ok(self.select(buckets, options))
    }

    /// Measurements of a series carrying one index value, in timestamp order
    pub fn find_by_index(
        &self,
        name: &str,
        key: &str,
        value: &str,
        options: Option<&QueryOptions>,
    ) -> StorageResult<Vec<Arc<Measurement>>> {
        match self.tag_index.find(name, key, value)? {
            Some(buckets) => Ok(self.select(buckets, options)),
            None => Ok(Vec::new()),
        }
    }

    /// Prune, order and flatten a set of buckets, deduplicating on request
    fn select(
        &self,
        buckets: &Buckets,
        options: Option<&QueryOptions>,
    ) -> Vec<Arc<Measurement>> {
        let window = options.map(QueryOptions::window);

        let mut shards: Vec<Cow<'_, [Arc<Measurement>]>> = buckets
            .values()
            .map(|shard| match window {
                Some(window) => Cow::Owned(window.prune(shard)),
                None => Cow::Borrowed(shard.as_slice()),
            })
            .filter(|shard| !shard.is_empty())
            .collect();

        // Buckets never overlap, so ordering them by first element is enough
        shards.sort_by_key(|shard| shard[0].when);

        let mut results: Vec<Arc<Measurement>> =
            shards.iter().flat_map(|s| s.iter().cloned()).collect();

        if options.is_some_and(|o| o.deduplicate) {
            results.retain(|m| self.identity_index.is_canonical(m));
        }

        results
    }

    /// Field names of a series, sorted
    pub fn field_names(&self, name: &str) -> StorageResult<Vec<String>> {
        self.field_index
            .field_names(name)
            .ok_or_else(|| StorageError::NoSuchMeasurement(name.to_string()))
    }

    /// Canonical measurement for an identity key
    pub fn canonical(&self, identity_key: &str) -> Option<&Arc<Measurement>> {
        self.identity_index.get(identity_key)
    }

    /// All known series names
    pub fn series_names(&self) -> Vec<String> {
        self.time_index.series_names()
    }

    /// All index keys of a series
    pub fn index_keys(&self, name: &str) -> Vec<String> {
        self.tag_index.get_keys(name)
    }

    /// All values of an index key of a series
    pub fn index_values(&self, name: &str, key: &str) -> Vec<String> {
        self.tag_index.get_values(name, key)
    }

    // ==================== Stats Methods ====================

    /// Get statistics about all indexes
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            series: self.time_index.series_count(),
            measurements: self.time_index.measurement_count(),
            time_shards: self.time_index.shard_count(),
            index_shards: self.tag_index.shard_count(),
            identities: self.identity_index.len(),
        }
    }
}
