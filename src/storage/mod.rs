//! Hourglass Storage Engine
//!
//! This module provides the core timeseries storage functionality:
//!
//! - **types**: Core data structures (Measurement, FieldKind)
//! - **range**: Query options and time windows
//! - **wal**: Append-only log for durability
//! - **export**: Tabular column layout and CSV rendering
//! - **engine**: Main storage engine orchestrating all components
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   Measurement → validate → identity check → shards → buffer → log (on flush)
//!
//! Read Path:
//!   Query → shards → prune by window → order → deduplicate → results
//!
//! Open:
//!   log → decode each line → shards (append) → sort every shard once
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use hourglass::storage::{Measurement, QueryOptions, StorageConfig, StorageEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Open (or create) a store
//!     let engine = StorageEngine::open(StorageConfig::new("./environment.log")).await?;
//!
//!     // Write data
//!     engine
//!         .insert(
//!             Measurement::new("environment")
//!                 .dimension("temperature", 21.5)
//!                 .index("location", "kitchen"),
//!         )
//!         .await?;
//!
//!     // Query the last two hours of the kitchen
//!     let options = QueryOptions::new().since(chrono::Duration::hours(2));
//!     let kitchen = engine
//!         .query_all_by_index("environment", "location", "kitchen", Some(&options))
//!         .await?;
//!
//!     println!("{} readings", kitchen.len());
//!
//!     engine.close().await?;
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod export;
pub mod range;
pub mod types;
pub mod wal;

// Re-export commonly used types
pub use engine::{StorageConfig, StorageEngine, StorageStats};
pub use error::{StorageError, StorageResult};
pub use export::{TableLayout, MEASURE_COLUMN, TIMESTAMP_COLUMN};
pub use range::{QueryOptions, TimeWindow};
pub use types::{FieldKind, Measurement, DEFAULT_INDEX_NAME};
pub use wal::{encode_line, WalSyncMode, WriteAheadLog};
