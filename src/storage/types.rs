//! Core data types for the Hourglass storage engine
//!
//! This module defines the record type stored by the engine and everything
//! derived from it:
//! - `Measurement`: a single timestamped record
//! - `FieldKind`: classification of a measurement's field names
//! - identity keys and hour buckets used for deduplication and sharding

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::storage::error::{StorageError, StorageResult};

/// Index injected into measurements that arrive without one, so that every
/// record carries at least one identity-bearing index.
pub const DEFAULT_INDEX_NAME: &str = "_default_index";

/// Hour bucket format. Lexical order matches chronological order.
const BUCKET_FORMAT: &str = "%Y-%m-%d_%H";

/// A single timestamped record
///
/// A measurement belongs to the series named by `name` and carries one or
/// more numeric dimensions, plus optional string metadata. Indices are
/// searchable; labels are stored but never looked up.
///
/// Measurements are deduplicated by identity key: one key per index entry,
/// derived from the name, that index's key and value, and the timestamp to
/// the nanosecond. Two records sharing all of these collide, so indexing on
/// something unique to the producer (a sensor ID, a hostname) is advisable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Measurement {
    /// When the measurement was taken
    pub when: DateTime<Utc>,
    /// Series name
    pub name: String,
    /// Numeric values
    #[serde(default)]
    pub dimensions: HashMap<String, f64>,
    /// Descriptive, non-searchable metadata
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Searchable metadata
    #[serde(default)]
    pub indices: HashMap<String, String>,
}

impl Measurement {
    /// Create an empty measurement for a series, timestamped now
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            name: name.into(),
            dimensions: HashMap::new(),
            labels: HashMap::new(),
            indices: HashMap::new(),
        }
    }

    /// Builder method: set timestamp
    pub fn at(mut self, when: DateTime<Utc>) -> Self {
        self.when = when;
        self
    }

    /// Builder method: add a dimension
    pub fn dimension(mut self, key: impl Into<String>, value: f64) -> Self {
        self.dimensions.insert(key.into(), value);
        self
    }

    /// Builder method: add an index
    pub fn index(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.indices.insert(key.into(), value.into());
        self
    }

    /// Builder method: add a label
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Check the measurement is storable
    ///
    /// Fails when the name is empty, there are no dimensions, or a dimension
    /// is NaN or infinite (JSON has no encoding for those). A measurement
    /// without indices gets `_default_index` set to its own name; this only
    /// exists to make deduplication possible and can otherwise be ignored.
    pub fn validate(&mut self) -> StorageResult<()> {
        if self.name.is_empty() {
            return Err(StorageError::EmptyName);
        }

        if self.dimensions.is_empty() {
            return Err(StorageError::NoDimensions);
        }

        if let Some((key, _)) = self.dimensions.iter().find(|(_, v)| !v.is_finite()) {
            return Err(StorageError::NonFiniteDimension(key.clone()));
        }

        if self.indices.is_empty() {
            self.indices
                .insert(DEFAULT_INDEX_NAME.to_string(), self.name.clone());
        }

        Ok(())
    }

    /// Map every field name to the category it belongs to
    ///
    /// Errors with `FieldNameCollision` when a name is used in more than one
    /// of dimensions, indices and labels.
    pub fn classify_fields(&self) -> StorageResult<HashMap<String, FieldKind>> {
        let mut fields = HashMap::with_capacity(
            self.dimensions.len() + self.indices.len() + self.labels.len(),
        );

        for key in self.dimensions.keys() {
            fields.insert(key.clone(), FieldKind::Dimension);
        }

        let rest = self
            .indices
            .keys()
            .map(|k| (k, FieldKind::Index))
            .chain(self.labels.keys().map(|k| (k, FieldKind::Label)));

        for (key, kind) in rest {
            if fields.insert(key.clone(), kind).is_some() {
                return Err(StorageError::FieldNameCollision(key.clone()));
            }
        }

        Ok(fields)
    }

    /// Hour bucket this measurement is sharded into
    pub fn bucket_key(&self) -> String {
        self.when.format(BUCKET_FORMAT).to_string()
    }

    /// Identity keys, one per index entry
    ///
    /// Each key is `name NUL index_key NUL index_value NUL timestamp NUL`,
    /// base64 encoded, where the timestamp is the epoch seconds (8 bytes BE)
    /// followed by the subsecond nanoseconds (4 bytes BE).
    pub fn identity_keys(&self) -> Vec<String> {
        let mut stamp = [0u8; 12];
        stamp[..8].copy_from_slice(&self.when.timestamp().to_be_bytes());
        stamp[8..].copy_from_slice(&self.when.timestamp_subsec_nanos().to_be_bytes());

        self.indices
            .iter()
            .map(|(key, value)| {
                let mut raw =
                    Vec::with_capacity(self.name.len() + key.len() + value.len() + stamp.len() + 4);
                raw.extend_from_slice(self.name.as_bytes());
                raw.push(0);
                raw.extend_from_slice(key.as_bytes());
                raw.push(0);
                raw.extend_from_slice(value.as_bytes());
                raw.push(0);
                raw.extend_from_slice(&stamp);
                raw.push(0);

                STANDARD.encode(raw)
            })
            .collect()
    }

    /// The value of a named field rendered as text, if this record has it
    ///
    /// Dimensions use the shortest representation that round-trips.
    pub fn field_value(&self, field: &str) -> Option<String> {
        if let Some(v) = self.dimensions.get(field) {
            return Some(v.to_string());
        }

        self.indices
            .get(field)
            .or_else(|| self.labels.get(field))
            .cloned()
    }
}

/// Category a field name belongs to within a series
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Numeric value
    Dimension,
    /// Searchable string
    Index,
    /// Non-searchable string
    Label,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Dimension => write!(f, "dimension"),
            FieldKind::Index => write!(f, "index"),
            FieldKind::Label => write!(f, "label"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Measurement {
        Measurement::new("environmental_monitoring")
            .at(Utc.with_ymd_and_hms(2024, 4, 30, 14, 45, 0).unwrap())
            .dimension("temperature", 19.23)
            .label("sensor_version", "v1.0.1")
            .index("location", "living room")
    }

    #[test]
    fn test_validate() {
        let mut empty_name = Measurement::new("").dimension("x", 1.0);
        assert!(matches!(empty_name.validate(), Err(StorageError::EmptyName)));

        let mut no_dims = Measurement::new("my measurement");
        assert!(matches!(no_dims.validate(), Err(StorageError::NoDimensions)));

        let mut m = sample();
        m.validate().unwrap();
        assert_eq!(m.indices.len(), 1);
    }

    #[test]
    fn test_validate_rejects_non_finite_dimensions() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut m = Measurement::new("m")
                .dimension("ok", 1.0)
                .dimension("v", bad);
            match m.validate() {
                Err(StorageError::NonFiniteDimension(field)) => assert_eq!(field, "v"),
                other => panic!("expected non-finite rejection, got {:?}", other),
            }
        }

        let mut extreme = Measurement::new("m").dimension("v", f64::MAX);
        extreme.validate().unwrap();
    }

    #[test]
    fn test_validate_injects_default_index() {
        let mut m = Measurement::new("counters").dimension("count", 100.0);
        m.validate().unwrap();

        assert_eq!(
            m.indices.get(DEFAULT_INDEX_NAME).map(String::as_str),
            Some("counters")
        );
    }

    #[test]
    fn test_classify_fields() {
        let fields = sample().classify_fields().unwrap();

        assert_eq!(fields.len(), 3);
        assert_eq!(fields["temperature"], FieldKind::Dimension);
        assert_eq!(fields["location"], FieldKind::Index);
        assert_eq!(fields["sensor_version"], FieldKind::Label);
    }

    #[test]
    fn test_classify_fields_collision() {
        let m = sample().label("location", "also the living room");
        match m.classify_fields() {
            Err(StorageError::FieldNameCollision(field)) => assert_eq!(field, "location"),
            other => panic!("expected collision, got {:?}", other),
        }

        let m = sample().index("temperature", "hot");
        assert!(matches!(
            m.classify_fields(),
            Err(StorageError::FieldNameCollision(_))
        ));
    }

    #[test]
    fn test_bucket_key() {
        let m = sample();
        assert_eq!(m.bucket_key(), "2024-04-30_14");

        let later = sample().at(Utc.with_ymd_and_hms(2024, 4, 30, 14, 59, 59).unwrap());
        assert_eq!(m.bucket_key(), later.bucket_key());

        let next = sample().at(Utc.with_ymd_and_hms(2024, 4, 30, 15, 0, 0).unwrap());
        assert!(next.bucket_key() > m.bucket_key());
    }

    #[test]
    fn test_identity_keys() {
        let m = sample().index("sensor", "abc123");
        let keys = m.identity_keys();
        assert_eq!(keys.len(), 2);
        assert_ne!(keys[0], keys[1]);

        // Same identity regardless of dimensions and labels
        let mut other = sample().index("sensor", "abc123");
        other.dimensions.insert("temperature".into(), 99.0);
        other.labels.clear();
        let mut a = keys.clone();
        let mut b = other.identity_keys();
        a.sort();
        b.sort();
        assert_eq!(a, b);

        // One nanosecond apart is a different identity
        let shifted = sample().at(m.when + chrono::Duration::nanoseconds(1));
        assert!(!keys.contains(&shifted.identity_keys()[0]));
    }

    #[test]
    fn test_field_value() {
        let m = sample();
        assert_eq!(m.field_value("temperature").as_deref(), Some("19.23"));
        assert_eq!(m.field_value("location").as_deref(), Some("living room"));
        assert_eq!(m.field_value("sensor_version").as_deref(), Some("v1.0.1"));
        assert_eq!(m.field_value("humidity"), None);
    }

    #[test]
    fn test_measurement_serialization() {
        let m = sample();
        let json = serde_json::to_string(&m).unwrap();
        let restored: Measurement = serde_json::from_str(&json).unwrap();

        assert_eq!(m, restored);
    }
}
