//! Field Index - the additive set of fields seen per series
//!
//! Stored as series → field → kind rather than a list, so recording a
//! measurement's fields never needs to deduplicate.

use std::collections::HashMap;

use crate::storage::types::FieldKind;

/// Union of every field ever seen, per series
#[derive(Debug, Default)]
pub struct FieldIndex {
    fields: HashMap<String, HashMap<String, FieldKind>>,
}

impl FieldIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a measurement's classified fields into its series
    pub fn merge(&mut self, name: &str, fields: HashMap<String, FieldKind>) {
        self.fields.entry(name.to_string()).or_default().extend(fields);
    }

    /// Field kinds of a series
    pub fn get(&self, name: &str) -> Option<&HashMap<String, FieldKind>> {
        self.fields.get(name)
    }

    /// Field names of a series, sorted
    pub fn field_names(&self, name: &str) -> Option<Vec<String>> {
        self.fields.get(name).map(|fields| {
            let mut names: Vec<String> = fields.keys().cloned().collect();
            names.sort();
            names
        })
    }

    /// Number of series with registered fields
    pub fn series_count(&self) -> usize {
        self.fields.len()
    }
}
