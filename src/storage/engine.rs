//! Hourglass Storage Engine
//!
//! The main storage engine orchestrates all components:
//! - Write path: Measurement → validate → identity check → indexes → buffer → log
//! - Read path: Query → shards → time window → order → deduplicate
//!
//! All state sits behind one Tokio `RwLock`. Writes (`insert`, `upsert`,
//! `flush`, `close`) hold it exclusively; reads share it. The indexes, the
//! flush buffer and the log are only consistent with each other as a whole,
//! so they are never locked separately.
//!
//! There is no background flush task. The flush policy is checked at the end
//! of every write, so a store that stops receiving writes keeps its buffer in
//! memory until the next write or `close`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::index::{IndexManager, IndexStats, Placement};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::export::TableLayout;
use crate::storage::range::QueryOptions;
use crate::storage::types::Measurement;
use crate::storage::wal::{WalSyncMode, WriteAheadLog};

/// Configuration for the storage engine
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the log file
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Flush once this many measurements are buffered (default: 1000)
    #[serde(default = "default_flush_max_size")]
    pub flush_max_size: usize,
    /// Flush once this long has passed since the last flush, in milliseconds
    /// (default: one hour)
    #[serde(default = "default_flush_max_duration_ms")]
    pub flush_max_duration_ms: u64,
    /// Log sync strategy
    #[serde(default)]
    pub sync_mode: WalSyncMode,
}

fn default_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("hourglass").join("hourglass.log"))
        .unwrap_or_else(|| PathBuf::from("./hourglass.log"))
}

fn default_flush_max_size() -> usize {
    1_000
}

fn default_flush_max_duration_ms() -> u64 {
    60 * 60 * 1000 // 1 hour
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            flush_max_size: default_flush_max_size(),
            flush_max_duration_ms: default_flush_max_duration_ms(),
            sync_mode: WalSyncMode::default(),
        }
    }
}

impl StorageConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Builder: set the buffer size that triggers a flush
    pub fn flush_max_size(mut self, size: usize) -> Self {
        self.flush_max_size = size;
        self
    }

    /// Builder: set the time since last flush that triggers a flush
    pub fn flush_max_duration(mut self, duration: Duration) -> Self {
        self.flush_max_duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Builder: set the log sync strategy
    pub fn sync_mode(mut self, mode: WalSyncMode) -> Self {
        self.sync_mode = mode;
        self
    }

    /// Time since last flush that triggers a flush
    pub fn max_flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_max_duration_ms)
    }
}

/// Internal state for the storage engine
struct EngineState {
    /// In-memory shards, identities and fields
    index: IndexManager,
    /// Durable log; `None` once the store is closed
    wal: Option<WriteAheadLog>,
    /// Measurements accepted but not yet written to the log
    buffer: Vec<Arc<Measurement>>,
    /// When the buffer was last written out
    last_flush: Instant,
}

impl EngineState {
    fn wal(&mut self) -> StorageResult<&mut WriteAheadLog> {
        self.wal.as_mut().ok_or(StorageError::Closed)
    }

    /// Write the buffer to the log
    ///
    /// On failure the buffer is kept and the log is cut back to its previous
    /// length, so a later flush writes the same records once.
    fn flush(&mut self) -> StorageResult<()> {
        let buffered = self.buffer.len();
        tracing::info!(buffer_length = buffered, "Flushing to disk");

        let wal = self.wal.as_mut().ok_or(StorageError::Closed)?;
        wal.append_batch(&self.buffer)?;

        self.buffer.clear();
        self.last_flush = Instant::now();

        Ok(())
    }
}

/// The main Hourglass storage engine
pub struct StorageEngine {
    /// Configuration
    config: StorageConfig,
    /// Everything mutable, behind one lock
    state: RwLock<EngineState>,
}

impl StorageEngine {
    /// Open a store, creating its log file if it doesn't already exist
    ///
    /// The whole log is replayed into memory before this returns. Fails when
    /// the file can't be opened for reading and appending, or when any line
    /// of it isn't a valid measurement; no engine is returned in either case.
    pub async fn open(config: StorageConfig) -> StorageResult<Self> {
        tracing::info!(
            stage = "boot",
            file = %config.path.display(),
            "Opening store from disk"
        );

        let mut wal = WriteAheadLog::open(&config.path, config.sync_mode)?;
        let mut index = IndexManager::new();

        // No duplicate check on replay; later lines take over identities
        let count = wal.recover(|line, mut measurement| {
            measurement.validate().map_err(|e| corrupt(line, e))?;
            let fields = measurement.classify_fields().map_err(|e| corrupt(line, e))?;
            let keys = measurement.identity_keys();

            index.add(Arc::new(measurement), &keys, fields, Placement::Append);
            Ok(())
        })?;

        // Replay appends unsorted
        index.sort_all();

        let stats = index.stats();
        tracing::info!(
            stage = "boot",
            measurements = count,
            series = stats.series,
            time_shards = stats.time_shards,
            index_shards = stats.index_shards,
            "Measurements loaded"
        );

        Ok(Self {
            config,
            state: RwLock::new(EngineState {
                index,
                wal: Some(wal),
                buffer: Vec::new(),
                last_flush: Instant::now(),
            }),
        })
    }

    /// Insert a measurement, rejecting it if any of its identity keys exist
    ///
    /// Validates the measurement, checks for duplicates, adds it to every
    /// index and the flush buffer, then flushes if the buffer is full or
    /// hasn't been written for a while. Nothing is changed when an error is
    /// returned before the flush.
    ///
    /// An error from the flush itself means the measurement was accepted: it
    /// is queryable and stays buffered for the next flush, but isn't on disk
    /// yet. Inserting it again fails with `DuplicateMeasurement`; call
    /// `flush` to retry persisting it.
    pub async fn insert(&self, measurement: Measurement) -> StorageResult<()> {
        self.ingest(measurement, true).await
    }

    /// Insert a measurement, replacing any existing one with the same identity
    ///
    /// The previous physical record stays in its shards; it is only dropped
    /// from results by queries that ask for deduplication. A flush error
    /// means the same as for `insert`.
    pub async fn upsert(&self, measurement: Measurement) -> StorageResult<()> {
        self.ingest(measurement, false).await
    }

    async fn ingest(&self, mut measurement: Measurement, reject_duplicates: bool) -> StorageResult<()> {
        measurement.validate()?;
        let fields = measurement.classify_fields()?;
        let keys = measurement.identity_keys();

        let mut state = self.state.write().await;
        state.wal()?;

        if reject_duplicates && state.index.has_identity(&keys) {
            return Err(StorageError::DuplicateMeasurement);
        }

        let measurement = Arc::new(measurement);
        state
            .index
            .add(Arc::clone(&measurement), &keys, fields, Placement::Sorted);
        state.buffer.push(measurement);

        if self.should_flush(&state) {
            state.flush()?;
        }

        Ok(())
    }

    fn should_flush(&self, state: &EngineState) -> bool {
        state.buffer.len() >= self.config.flush_max_size
            || state.last_flush.elapsed() >= self.config.max_flush_interval()
    }

    /// Force flush the write buffer to the log
    pub async fn flush(&self) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.flush()
    }

    /// Flush, sync and release the log file
    ///
    /// Queries keep working on the in-memory data afterwards; writes fail
    /// with `StorageError::Closed`. Closing twice is a no-op.
    pub async fn close(&self) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state.wal.is_none() {
            return Ok(());
        }

        state.flush()?;
        state.wal()?.sync()?;
        state.wal = None;

        tracing::info!(file = %self.config.path.display(), "Store closed");
        Ok(())
    }

    /// Check if the store has been closed
    pub async fn is_closed(&self) -> bool {
        self.state.read().await.wal.is_none()
    }

    /// All measurements of a series, in timestamp order
    ///
    /// With `options`, only measurements within the resolved time window are
    /// returned, deduplicated on request. `None` skips the window entirely,
    /// so unlike `Some(&QueryOptions::default())`, whose window ends now, it
    /// also returns measurements timestamped in the future.
    pub async fn query_all(
        &self,
        name: &str,
        options: Option<&QueryOptions>,
    ) -> StorageResult<Vec<Arc<Measurement>>> {
        let state = self.state.read().await;
        state.index.find_series(name, options)
    }

    /// Measurements of a series with a specific index value, in timestamp order
    ///
    /// Fails for an unknown series or index key. An index value that was never
    /// seen is not an error and returns nothing.
    pub async fn query_all_by_index(
        &self,
        name: &str,
        index: &str,
        value: &str,
        options: Option<&QueryOptions>,
    ) -> StorageResult<Vec<Arc<Measurement>>> {
        let state = self.state.read().await;
        state.index.find_by_index(name, index, value, options)
    }

    /// Every field name (dimensions, indices, labels) seen for a series
    pub async fn query_fields(&self, name: &str) -> StorageResult<Vec<String>> {
        let state = self.state.read().await;
        state.index.field_names(name)
    }

    /// Tabular column layout for a series
    ///
    /// `timestamp`, `measure`, then every field ever seen, sorted.
    pub async fn columns(&self, name: &str) -> StorageResult<Vec<String>> {
        let state = self.state.read().await;
        let layout = TableLayout::new(state.index.field_names(name)?);
        Ok(layout.columns().to_vec())
    }

    /// Query a series and render it as CSV
    ///
    /// Can be expensive for large result sets; everything is built in memory.
    pub async fn export_csv(
        &self,
        name: &str,
        options: Option<&QueryOptions>,
    ) -> StorageResult<String> {
        let state = self.state.read().await;
        let measurements = state.index.find_series(name, options)?;
        let layout = TableLayout::new(state.index.field_names(name)?);
        drop(state);

        let mut out = Vec::new();
        layout.write_csv(&mut out, &measurements)?;

        String::from_utf8(out).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// All known series names, sorted
    pub async fn series(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut names = state.index.series_names();
        names.sort();
        names
    }

    /// Index keys of a series, sorted
    pub async fn index_keys(&self, name: &str) -> Vec<String> {
        let state = self.state.read().await;
        let mut keys = state.index.index_keys(name);
        keys.sort();
        keys
    }

    /// Values seen for an index key of a series, sorted
    pub async fn index_values(&self, name: &str, index: &str) -> Vec<String> {
        let state = self.state.read().await;
        let mut values = state.index.index_values(name, index);
        values.sort();
        values
    }

    /// Get storage statistics
    pub async fn stats(&self) -> StorageStats {
        let state = self.state.read().await;

        StorageStats {
            index: state.index.stats(),
            buffered: state.buffer.len(),
            log_entries: state.wal.as_ref().map(|w| w.entry_count()).unwrap_or(0),
            since_last_flush: state.last_flush.elapsed(),
        }
    }

    /// Get the log file path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Get the engine configuration
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

fn corrupt(line: usize, err: StorageError) -> StorageError {
    StorageError::Corruption {
        line,
        reason: err.to_string(),
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub index: IndexStats,
    pub buffered: usize,
    pub log_entries: u64,
    pub since_last_flush: Duration,
}

impl std::fmt::Display for StorageStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Series: {}, Measurements: {}, Identities: {}, Buffered: {}, Logged: {}, Last flush: {:.1}s ago",
            self.index.series,
            self.index.measurements,
            self.index.identities,
            self.buffered,
            self.log_entries,
            self.since_last_flush.as_secs_f64()
        )
    }
}
