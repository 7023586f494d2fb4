//! Tabular export
//!
//! Flattens a series into rows under a fixed column layout: `timestamp`,
//! `measure`, then every field the series has ever carried, sorted. A row
//! leaves a cell empty when its measurement doesn't have that field.

use chrono::SecondsFormat;
use std::io::Write;
use std::sync::Arc;

use crate::storage::error::StorageResult;
use crate::storage::types::Measurement;

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const MEASURE_COLUMN: &str = "measure";

/// Column layout for one series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    columns: Vec<String>,
}

impl TableLayout {
    /// Build a layout from a series' field names
    pub fn new(mut fields: Vec<String>) -> Self {
        fields.sort();

        let mut columns = Vec::with_capacity(fields.len() + 2);
        columns.push(TIMESTAMP_COLUMN.to_string());
        columns.push(MEASURE_COLUMN.to_string());
        columns.extend(fields);

        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Render one measurement as a row
    ///
    /// Timestamps are RFC 3339 in UTC, to the second.
    pub fn row(&self, measurement: &Measurement) -> Vec<String> {
        let mut row = Vec::with_capacity(self.columns.len());
        row.push(
            measurement
                .when
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        row.push(measurement.name.clone());

        for field in &self.columns[2..] {
            row.push(measurement.field_value(field).unwrap_or_default());
        }

        row
    }

    /// Write a header and one row per measurement as CSV
    pub fn write_csv<W: Write>(
        &self,
        writer: W,
        measurements: &[Arc<Measurement>],
    ) -> StorageResult<()> {
        let mut csv = csv::Writer::from_writer(writer);

        csv.write_record(&self.columns)?;
        for m in measurements {
            csv.write_record(self.row(m))?;
        }

        csv.flush()?;
        Ok(())
    }
}
