//! # Hourglass
//!
//! An embeddable, in-memory timeseries store, made durable by an append-only
//! log that is replayed on open.
//!
//! ## Features
//!
//! - **Hour sharding**: every series is split into hourly shards kept sorted
//!   by timestamp, so inserts stay cheap and range queries skip whole shards
//! - **Searchable indices**: string indices get their own shards per value
//! - **Deduplication**: strict `insert` rejects repeated identities, `upsert`
//!   replaces them and queries can ask for only the latest copy
//! - **Durability**: buffered writes to a line-oriented log, flushed by size
//!   or age, replayed in full on open
//!
//! ## Modules
//!
//! - [`storage`]: Engine, measurement types, the log and export
//! - [`index`]: Index structures for efficient queries
//! - [`config`]: File and environment configuration, logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hourglass::storage::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = hourglass::Config::load_default();
//!     config.logging.init()?;
//!
//!     // Initialize storage
//!     let engine = StorageEngine::open(config.storage).await?;
//!
//!     // Write a measurement
//!     engine
//!         .insert(
//!             Measurement::new("environment")
//!                 .dimension("temperature", 19.5)
//!                 .dimension("humidity", 48.0)
//!                 .index("location", "living room")
//!                 .label("firmware", "v1.0.1"),
//!         )
//!         .await?;
//!
//!     // Query the last day, latest copies only
//!     let options = QueryOptions::new()
//!         .since(chrono::Duration::days(1))
//!         .deduplicate(true);
//!     let readings = engine.query_all("environment", Some(&options)).await?;
//!
//!     println!("Found {} readings", readings.len());
//!     println!("{}", engine.stats().await);
//!
//!     // Graceful shutdown
//!     engine.close().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod index;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{
    FieldKind, Measurement, QueryOptions, StorageConfig, StorageEngine, StorageError,
    StorageResult, StorageStats, TimeWindow,
};

pub use index::{IndexManager, IndexStats};

pub use config::{generate_default_config, Config, ConfigError, LoggingConfig};
