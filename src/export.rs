//! CSV export of aggregated consumption.
//!
//! Format: a `Date/Time,Consumption (kWh)` header followed by one row per
//! bucket, each line terminated by `\n`.

use crate::error::{PecoError, Result};
use crate::report::{ConsumptionBucket, TimeRange};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

pub const LABEL_COLUMN: &str = "Date/Time";
pub const CONSUMPTION_COLUMN: &str = "Consumption (kWh)";

#[derive(Debug, Serialize, Deserialize)]
struct ReportRow {
    #[serde(rename = "Date/Time")]
    label: String,
    #[serde(rename = "Consumption (kWh)")]
    consumption: f64,
}

fn writer_builder() -> csv::WriterBuilder {
    let mut builder = csv::WriterBuilder::new();
    builder.has_headers(false).terminator(csv::Terminator::Any(b'\n'));
    builder
}

fn write_rows<W: io::Write>(mut writer: csv::Writer<W>, buckets: &[ConsumptionBucket]) -> Result<W> {
    writer.write_record([LABEL_COLUMN, CONSUMPTION_COLUMN])?;
    for bucket in buckets {
        writer.serialize(ReportRow {
            label: bucket.label.clone(),
            consumption: bucket.consumption,
        })?;
    }
    writer
        .into_inner()
        .map_err(|e| PecoError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))
}

/// Render buckets as CSV text.
pub fn to_csv_string(buckets: &[ConsumptionBucket]) -> Result<String> {
    let bytes = write_rows(writer_builder().from_writer(Vec::new()), buckets)?;
    String::from_utf8(bytes).map_err(|e| PecoError::MalformedReport {
        line: 0,
        message: e.to_string(),
    })
}

/// Parse CSV text produced by [`to_csv_string`].
pub fn parse_csv(text: &str) -> Result<Vec<ConsumptionBucket>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let columns: Vec<&str> = headers.iter().collect();
    if columns != [LABEL_COLUMN, CONSUMPTION_COLUMN] {
        return Err(PecoError::MalformedReport {
            line: 1,
            message: format!("unexpected header: {}", columns.join(",")),
        });
    }

    let mut buckets = Vec::new();
    for result in reader.deserialize::<ReportRow>() {
        let row = result?;
        buckets.push(ConsumptionBucket::new(row.label, row.consumption));
    }
    Ok(buckets)
}

/// Write `energy_report_<range>.csv` into `dir` and return its path.
pub fn write_report(
    dir: impl AsRef<Path>,
    range: TimeRange,
    buckets: &[ConsumptionBucket],
) -> Result<PathBuf> {
    let path = dir.as_ref().join(range.file_name());
    write_rows(writer_builder().from_path(&path)?, buckets)?;
    info!("Exported {} rows to {}", buckets.len(), path.display());
    Ok(path)
}

/// Read a report written by [`write_report`].
pub fn read_report(path: impl AsRef<Path>) -> Result<Vec<ConsumptionBucket>> {
    let text = std::fs::read_to_string(path)?;
    parse_csv(&text)
}
