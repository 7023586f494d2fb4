//! Time window selection for queries
//!
//! `QueryOptions` describes which slice of a series a caller wants; it is
//! resolved into a concrete, inclusive `TimeWindow` which then prunes the
//! engine's shards. Shards are always sorted by timestamp, so a whole shard
//! can be rejected by looking at its first and last element only.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::storage::types::Measurement;

/// Options accepted by the query operations
///
/// - `from`: earliest timestamp to return, inclusive. Unset means the
///   beginning of time. Ignored when `since` is set.
/// - `to`: latest timestamp to return, inclusive. Unset means now.
/// - `since`: return the `since` preceding `to` (or now). Overrides `from`.
/// - `deduplicate`: drop physical copies left behind by `upsert` that are no
///   longer the canonical record for any of their identity keys. This has a
///   cost proportional to the result size, so it is off by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub since: Option<Duration>,
    pub deduplicate: bool,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn since(mut self, since: Duration) -> Self {
        self.since = Some(since);
        self
    }

    pub fn deduplicate(mut self, deduplicate: bool) -> Self {
        self.deduplicate = deduplicate;
        self
    }

    /// Resolve these options against the current time
    pub fn window(&self) -> TimeWindow {
        self.window_at(Utc::now())
    }

    /// Resolve these options against an explicit "now"
    pub fn window_at(&self, now: DateTime<Utc>) -> TimeWindow {
        let to = self.to.unwrap_or(now);

        match self.since {
            Some(since) if since > Duration::zero() => TimeWindow {
                from: to
                    .checked_sub_signed(since)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
                to,
            },
            _ => TimeWindow {
                from: self.from.unwrap_or(DateTime::<Utc>::MIN_UTC),
                to,
            },
        }
    }
}

/// Concrete time window, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    /// Check if a timestamp falls within this window
    pub fn contains(&self, when: DateTime<Utc>) -> bool {
        when >= self.from && when <= self.to
    }

    /// Select the measurements of a sorted shard that fall in this window
    ///
    /// The shard is rejected without a scan when its first element is after
    /// `to` or its last element is before `from`. Order is preserved.
    pub fn prune(&self, shard: &[Arc<Measurement>]) -> Vec<Arc<Measurement>> {
        let (Some(first), Some(last)) = (shard.first(), shard.last()) else {
            return Vec::new();
        };

        if first.when > self.to || last.when < self.from {
            return Vec::new();
        }

        shard
            .iter()
            .filter(|m| self.contains(m.when))
            .cloned()
            .collect()
    }
}
