//! Storage engine error types
//!
//! Defines all errors that can occur in the storage layer.

use thiserror::Error;

/// Errors that can occur in the storage engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// Measurement name was empty
    #[error("Measurement name must not be empty")]
    EmptyName,

    /// Measurement carried no numeric dimensions
    #[error("Measurement has no dimensions")]
    NoDimensions,

    /// A dimension was NaN or infinite, which the log can't represent
    #[error("Dimension is not a finite number: {0}")]
    NonFiniteDimension(String),

    /// The same field name was used by more than one of dimensions, indices and labels
    #[error("Field name in use by more than one of dimensions, indices and labels: {0}")]
    FieldNameCollision(String),

    /// A measurement with the same name, index and timestamp already exists
    #[error("Measurement and index combination already exist for this timestamp")]
    DuplicateMeasurement,

    /// Requested measurement name has never been stored
    #[error("Unknown measurement: {0}")]
    NoSuchMeasurement(String),

    /// Requested index does not exist for the measurement
    #[error("Unknown index: {0}")]
    NoSuchIndex(String),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A log line could not be decoded into a valid measurement
    #[error("Corrupt log at line {line}: {reason}")]
    Corruption { line: usize, reason: String },

    /// The store has been closed and no longer accepts writes
    #[error("Store is closed")]
    Closed,
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for StorageError {
    fn from(err: base64::DecodeError) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for StorageError {
    fn from(err: csv::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
