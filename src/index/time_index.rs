//! Time Index - series → hour bucket → sorted shard
//!
//! Writes can arrive in any order, but shards must stay sorted. Keying each
//! shard by hour keeps them small, so slotting one measurement in never means
//! sorting a whole series.

use std::collections::HashMap;
use std::sync::Arc;

use crate::index::{sort_shard, Buckets, Placement};
use crate::storage::types::Measurement;

/// Per-series, per-hour shards of measurements
#[derive(Debug, Default)]
pub struct TimeIndex {
    /// series name → bucket → shard
    series: HashMap<String, Buckets>,
}

impl TimeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a measurement to its series' bucket
    pub fn add(&mut self, measurement: &Arc<Measurement>, bucket: &str, placement: Placement) {
        let shard = self
            .series
            .entry(measurement.name.clone())
            .or_default()
            .entry(bucket.to_string())
            .or_default();

        placement.place(shard, Arc::clone(measurement));
    }

    /// All buckets of a series
    pub fn buckets(&self, name: &str) -> Option<&Buckets> {
        self.series.get(name)
    }

    /// Check if a series has been seen
    pub fn has_series(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    /// All known series names
    pub fn series_names(&self) -> Vec<String> {
        self.series.keys().cloned().collect()
    }

    /// Sort every shard
    pub fn sort_all(&mut self) {
        for shard in self.series.values_mut().flat_map(|b| b.values_mut()) {
            sort_shard(shard);
        }
    }

    /// Number of series
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Number of shards across all series
    pub fn shard_count(&self) -> usize {
        self.series.values().map(|b| b.len()).sum()
    }

    /// Number of physical measurements
    pub fn measurement_count(&self) -> usize {
        self.series
            .values()
            .flat_map(|b| b.values())
            .map(|s| s.len())
            .sum()
    }
}
