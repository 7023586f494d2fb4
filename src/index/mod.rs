//! Hourglass Index Structures
//!
//! All data lives in memory, sharded so that keeping it sorted stays cheap:
//!
//! - **TimeIndex**: series → hour bucket → sorted shard
//! - **TagIndex**: series → index key → index value → hour bucket → sorted shard
//! - **IdentityIndex**: identity key → canonical (most recent) measurement
//! - **FieldIndex**: series → field name → field kind
//!
//! # Architecture
//!
//! ```text
//! Query: "environment where location=kitchen, last 2 hours"
//!        ↓
//! TagIndex: shards for environment/location/kitchen → {2024-04-30_13, 2024-04-30_14, ...}
//!        ↓
//! TimeWindow: reject shards entirely outside the window by first/last element
//!        ↓
//! Order shards by first timestamp, flatten → already sorted result
//! ```
//!
//! Every shard holds `Arc`s to the same physical measurements, so a record
//! indexed N ways is stored once.

mod field_index;
mod identity_index;
mod manager;
mod tag_index;
mod time_index;

pub use field_index::FieldIndex;
pub use identity_index::IdentityIndex;
pub use manager::IndexManager;
pub use tag_index::TagIndex;
pub use time_index::TimeIndex;

use std::collections::HashMap;
use std::sync::Arc;

use crate::storage::types::Measurement;

/// A sequence of measurements kept sorted by timestamp
pub type Shard = Vec<Arc<Measurement>>;

/// Hour bucket → shard
pub type Buckets = HashMap<String, Shard>;

/// Where a new measurement goes within its shard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Insert at its sorted position, keeping the shard sorted
    Sorted,
    /// Push to the end; the caller must sort afterwards
    Append,
}

impl Placement {
    fn place(self, shard: &mut Shard, measurement: Arc<Measurement>) {
        match self {
            Placement::Sorted => {
                // after any equal timestamps, so arrival order is kept
                let pos = shard.partition_point(|m| m.when <= measurement.when);
                shard.insert(pos, measurement);
            }
            Placement::Append => shard.push(measurement),
        }
    }
}

/// Stable sort of a shard by timestamp
fn sort_shard(shard: &mut Shard) {
    shard.sort_by_key(|m| m.when);
}

/// Statistics about index usage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of distinct series names
    pub series: usize,
    /// Number of physical measurements held in time shards
    pub measurements: usize,
    /// Number of time shards
    pub time_shards: usize,
    /// Number of index shards
    pub index_shards: usize,
    /// Number of identity keys
    pub identities: usize,
}
