//! Output writers for the fused dataset and the run summary.
//!
//! Fused rows are flattened into a stable record layout shared by the
//! JSON-lines and CSV encodings.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;
use wave_common::{FusedDataset, FusedRow};

use crate::config::OutputFormat;
use crate::error::Result;
use crate::summary::RunSummary;

/// Column order of the CSV encoding.
pub const CSV_COLUMNS: [&str; 17] = [
    "cell_row",
    "cell_col",
    "latitude",
    "longitude",
    "window_start",
    "window_end",
    "mean",
    "min",
    "max",
    "stddev",
    "count",
    "record_count",
    "suspect_count",
    "gap_filled",
    "gap_fraction",
    "selected_source",
    "provenance",
];

/// One output record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow<'a> {
    pub cell_row: u32,
    pub cell_col: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub stddev: Option<f64>,
    pub count: u64,
    pub record_count: u64,
    pub suspect_count: u64,
    pub gap_filled: bool,
    pub gap_fraction: f64,
    pub selected_source: &'a str,
    pub provenance: Vec<&'a str>,
}

impl<'a> From<&'a FusedRow> for OutputRow<'a> {
    fn from(row: &'a FusedRow) -> Self {
        let stat = &row.stat;
        Self {
            cell_row: stat.cell.row,
            cell_col: stat.cell.col,
            latitude: stat.cell.latitude,
            longitude: stat.cell.longitude,
            window_start: stat.bucket.start,
            window_end: stat.bucket.end,
            mean: stat.mean,
            min: stat.min,
            max: stat.max,
            stddev: stat.stddev,
            count: stat.count,
            record_count: stat.record_count,
            suspect_count: stat.suspect_count,
            gap_filled: stat.gap_filled,
            gap_fraction: stat.gap_fraction,
            selected_source: row.selected_source.as_str(),
            provenance: row.provenance.iter().map(|s| s.as_str()).collect(),
        }
    }
}

/// Write the fused dataset, creating parent directories. Returns the
/// number of rows written.
pub fn write_dataset(dataset: &FusedDataset, path: &Path, format: OutputFormat) -> Result<usize> {
    let mut out = BufWriter::new(create(path)?);
    match format {
        OutputFormat::Jsonl => write_jsonl(dataset, &mut out)?,
        OutputFormat::Csv => write_csv(dataset, &mut out)?,
    }
    out.flush()?;

    info!(path = %path.display(), rows = dataset.len(), format = ?format, "Wrote fused dataset");
    Ok(dataset.len())
}

/// Write the run summary as pretty JSON.
pub fn write_summary(summary: &RunSummary, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(create(path)?);
    serde_json::to_writer_pretty(&mut out, summary)?;
    out.write_all(b"\n")?;
    out.flush()?;
    info!(path = %path.display(), "Wrote run summary");
    Ok(())
}

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

pub fn write_jsonl<W: Write>(dataset: &FusedDataset, out: &mut W) -> Result<()> {
    for row in dataset.iter() {
        serde_json::to_writer(&mut *out, &OutputRow::from(row))?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

pub fn write_csv<W: Write>(dataset: &FusedDataset, out: &mut W) -> Result<()> {
    writeln!(out, "{}", CSV_COLUMNS.join(","))?;
    for row in dataset.iter() {
        let r = OutputRow::from(row);
        let fields = [
            r.cell_row.to_string(),
            r.cell_col.to_string(),
            r.latitude.to_string(),
            r.longitude.to_string(),
            r.window_start.to_rfc3339_opts(SecondsFormat::Secs, true),
            r.window_end.to_rfc3339_opts(SecondsFormat::Secs, true),
            optional(r.mean),
            optional(r.min),
            optional(r.max),
            optional(r.stddev),
            r.count.to_string(),
            r.record_count.to_string(),
            r.suspect_count.to_string(),
            r.gap_filled.to_string(),
            r.gap_fraction.to_string(),
            csv_field(r.selected_source),
            csv_field(&r.provenance.join(";")),
        ];
        writeln!(out, "{}", fields.join(","))?;
    }
    Ok(())
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
