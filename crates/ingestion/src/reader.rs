//! Raw record readers.
//!
//! Turns the byte-level input of a source into a lazy sequence of
//! [`RawRecord`]s. Supported layouts:
//!
//! - JSON lines (`.jsonl`, `.ndjson`): one object per line with
//!   `timestamp`, `latitude`, `longitude`, `values` and `units`. Variables
//!   may also appear as top-level keys.
//! - CSV (`.csv`): header row with `timestamp`, optional `latitude` and
//!   `longitude` columns and one column per variable.
//! - NDBC standard meteorological text (`.txt`): `#`-prefixed header and
//!   unit lines, whitespace separated, time split over `YY MM DD hh mm`.
//!
//! Any of these may be gzip-compressed (`.gz`).

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader, Split};
use std::path::{Path, PathBuf};

use bytes::{Buf, Bytes};
use flate2::read::MultiGzDecoder;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use wave_common::{RawRecord, SourceId};

use crate::error::{IngestionError, Result};

/// Record layout of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    JsonLines,
    Csv,
    NdbcText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
}

/// Detected layout plus compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputKind {
    pub format: InputFormat,
    pub compression: Compression,
}

/// Detect input kind from a file name.
pub fn detect_input_format(path: &Path) -> Option<InputKind> {
    let lower = path.to_string_lossy().to_lowercase();
    let (stem, compression) = match lower.strip_suffix(".gz") {
        Some(stem) => (stem, Compression::Gzip),
        None => (lower.as_str(), Compression::None),
    };

    let format = if stem.ends_with(".jsonl") || stem.ends_with(".ndjson") || stem.ends_with(".json") {
        InputFormat::JsonLines
    } else if stem.ends_with(".csv") {
        InputFormat::Csv
    } else if stem.ends_with(".txt") || stem.ends_with(".stdmet") || stem.ends_with(".ndbc") {
        InputFormat::NdbcText
    } else {
        return None;
    };

    Some(InputKind {
        format,
        compression,
    })
}

/// Expand configured input paths into a sorted list of files.
///
/// Directories are walked recursively and only files with a recognized
/// extension are kept; explicitly listed files are always kept.
pub fn discover_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path) {
                let entry = entry.map_err(|e| IngestionError::Other(e.into()))?;
                if entry.file_type().is_file() && detect_input_format(entry.path()).is_some() {
                    files.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(IngestionError::FileRead(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input not found: {}", path.display()),
            )));
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Source context applied to every record read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderOptions {
    pub source_id: SourceId,
    /// Fixed position for station data that does not carry one per line.
    pub default_position: Option<(f64, f64)>,
    /// Units for variables whose records do not declare them inline.
    pub units: BTreeMap<String, String>,
}

impl ReaderOptions {
    pub fn new(source_id: SourceId) -> Self {
        Self {
            source_id,
            default_position: None,
            units: BTreeMap::new(),
        }
    }
}

/// Open a file and read it lazily.
pub fn open_path(path: &Path, options: ReaderOptions) -> Result<RawRecordReader> {
    let kind = detect_input_format(path)
        .ok_or_else(|| IngestionError::UnknownFileType(path.display().to_string()))?;
    let data = Bytes::from(fs::read(path)?);
    debug!(path = %path.display(), size = data.len(), format = ?kind.format, "Opened input");
    Ok(RawRecordReader::from_bytes(data, kind, options))
}

/// Lazy iterator of raw records from one input.
///
/// Per-line problems, invalid UTF-8 included, surface as
/// [`IngestionError::MalformedRecord`] items and reading continues; an I/O
/// or decompression failure ends the sequence after being reported once.
pub struct RawRecordReader {
    lines: Split<Box<dyn BufRead + Send>>,
    format: InputFormat,
    compression: Compression,
    options: ReaderOptions,
    header: Option<Vec<String>>,
    header_units: BTreeMap<String, String>,
    line_number: usize,
    finished: bool,
}

impl RawRecordReader {
    pub fn from_bytes(data: Bytes, kind: InputKind, options: ReaderOptions) -> Self {
        let inner: Box<dyn BufRead + Send> = match kind.compression {
            Compression::None => Box::new(BufReader::new(data.reader())),
            Compression::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(data.reader()))),
        };

        Self {
            lines: inner.split(b'\n'),
            format: kind.format,
            compression: kind.compression,
            options,
            header: None,
            header_units: BTreeMap::new(),
            line_number: 0,
            finished: false,
        }
    }

    fn malformed(&self, reason: impl std::fmt::Display) -> IngestionError {
        IngestionError::malformed(
            &self.options.source_id,
            format!("line {}: {}", self.line_number, reason),
        )
    }

    /// Handle one line. `Ok(None)` means the line carried no record.
    fn parse_line(&mut self, line: &str) -> Result<Option<RawRecord>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        match self.format {
            InputFormat::JsonLines => self.parse_json(trimmed).map(Some),
            InputFormat::Csv => {
                if self.header.is_none() {
                    self.header = Some(split_csv(trimmed));
                    return Ok(None);
                }
                self.parse_csv(trimmed).map(Some)
            }
            InputFormat::NdbcText => self.parse_ndbc(trimmed),
        }
    }

    fn parse_json(&self, line: &str) -> Result<RawRecord> {
        #[derive(Deserialize)]
        struct JsonLine {
            #[serde(alias = "time")]
            timestamp: Value,
            #[serde(default, alias = "lat")]
            latitude: Option<Value>,
            #[serde(default, alias = "lon")]
            longitude: Option<Value>,
            #[serde(default)]
            values: BTreeMap<String, Value>,
            #[serde(default)]
            units: BTreeMap<String, String>,
            #[serde(flatten)]
            extra: BTreeMap<String, Value>,
        }

        let parsed: JsonLine =
            serde_json::from_str(line).map_err(|e| self.malformed(format!("invalid JSON: {}", e)))?;

        let timestamp = match parsed.timestamp {
            Value::String(s) => s,
            other => return Err(self.malformed(format!("timestamp must be a string, got {}", other))),
        };

        let mut record = RawRecord::new(self.options.source_id.clone(), timestamp);
        record.values = parsed.values;
        for (name, value) in parsed.extra {
            if name != "source_id" {
                record.values.entry(name).or_insert(value);
            }
        }

        // Scalar coordinates belong on the record; swath arrays stay with
        // the variables so the adapter can expand them.
        for (name, coordinate) in [("latitude", parsed.latitude), ("longitude", parsed.longitude)] {
            match coordinate {
                Some(Value::Number(n)) => {
                    let v = n.as_f64();
                    if name == "latitude" {
                        record.latitude = v;
                    } else {
                        record.longitude = v;
                    }
                }
                Some(Value::Null) | None => {}
                Some(other) => {
                    record.values.insert(name.to_string(), other);
                }
            }
        }

        record.units = self.options.units.clone();
        record.units.extend(parsed.units);
        self.apply_default_position(&mut record);
        Ok(record)
    }

    fn parse_csv(&self, line: &str) -> Result<RawRecord> {
        let header = self.header.as_deref().unwrap_or_default();
        let cells = split_csv(line);
        if cells.len() != header.len() {
            return Err(self.malformed(format!(
                "expected {} columns, found {}",
                header.len(),
                cells.len()
            )));
        }

        let mut timestamp = None;
        let mut latitude = None;
        let mut longitude = None;
        let mut values = BTreeMap::new();

        for (name, cell) in header.iter().zip(cells) {
            match name.to_lowercase().as_str() {
                "timestamp" | "time" | "datetime" => timestamp = Some(cell),
                "latitude" | "lat" => latitude = self.parse_coordinate(&cell)?,
                "longitude" | "lon" => longitude = self.parse_coordinate(&cell)?,
                _ => {
                    let value = if cell.is_empty() {
                        Value::Null
                    } else {
                        Value::String(cell)
                    };
                    values.insert(name.clone(), value);
                }
            }
        }

        let timestamp = timestamp.ok_or_else(|| self.malformed("no timestamp column"))?;
        let mut record = RawRecord::new(self.options.source_id.clone(), timestamp);
        record.latitude = latitude;
        record.longitude = longitude;
        record.values = values;
        record.units = self.options.units.clone();
        self.apply_default_position(&mut record);
        Ok(record)
    }

    fn parse_coordinate(&self, cell: &str) -> Result<Option<f64>> {
        if cell.is_empty() {
            return Ok(None);
        }
        cell.parse::<f64>()
            .map(Some)
            .map_err(|_| self.malformed(format!("unparsable coordinate '{}'", cell)))
    }

    fn parse_ndbc(&mut self, line: &str) -> Result<Option<RawRecord>> {
        let starts_with_digit = line.chars().next().is_some_and(|c| c.is_ascii_digit());

        if let Some(stripped) = line.strip_prefix('#') {
            let tokens: Vec<String> = stripped.split_whitespace().map(str::to_string).collect();
            if let Some(header) = &self.header {
                self.header_units = header.iter().cloned().zip(tokens).collect();
            } else {
                self.header = Some(tokens);
            }
            return Ok(None);
        }
        if self.header.is_none() && !starts_with_digit {
            // Pre-2007 files have an unprefixed header row.
            self.header = Some(line.split_whitespace().map(str::to_string).collect());
            return Ok(None);
        }

        let header = self
            .header
            .as_deref()
            .ok_or_else(|| self.malformed("data before header"))?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != header.len() {
            return Err(self.malformed(format!(
                "expected {} columns, found {}",
                header.len(),
                tokens.len()
            )));
        }

        let mut time_parts: BTreeMap<&str, i64> = BTreeMap::new();
        let mut values = BTreeMap::new();
        for (name, token) in header.iter().zip(&tokens) {
            let key = match name.as_str() {
                "YY" | "YYYY" => Some("year"),
                "MM" => Some("month"),
                "DD" => Some("day"),
                "hh" => Some("hour"),
                "mm" => Some("minute"),
                _ => None,
            };
            match key {
                Some(key) => {
                    let part = token
                        .parse::<i64>()
                        .map_err(|_| self.malformed(format!("invalid {} '{}'", name, token)))?;
                    time_parts.insert(key, part);
                }
                None => {
                    values.insert(name.clone(), Value::String(token.to_string()));
                }
            }
        }

        let timestamp = ndbc_timestamp(&time_parts).ok_or_else(|| self.malformed("incomplete date columns"))?;
        let mut record = RawRecord::new(self.options.source_id.clone(), timestamp);
        record.values = values;
        record.units = self.options.units.clone();
        for (name, unit) in &self.header_units {
            record.units.entry(name.clone()).or_insert_with(|| unit.clone());
        }
        self.apply_default_position(&mut record);
        Ok(Some(record))
    }

    fn apply_default_position(&self, record: &mut RawRecord) {
        if let Some((lat, lon)) = self.options.default_position {
            if record.latitude.is_none() && record.longitude.is_none() {
                record.latitude = Some(lat);
                record.longitude = Some(lon);
            }
        }
    }
}

impl Iterator for RawRecordReader {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let bytes = match self.lines.next()? {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(match self.compression {
                        Compression::Gzip => IngestionError::Decompression(e.to_string()),
                        Compression::None => IngestionError::FileRead(e),
                    }));
                }
            };
            self.line_number += 1;

            let line = match std::str::from_utf8(&bytes) {
                Ok(line) => line,
                Err(e) => return Some(Err(self.malformed(format!("invalid UTF-8: {}", e)))),
            };
            match self.parse_line(line) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

/// Split one CSV line. Commas inside double quotes do not separate cells
/// and `""` inside quotes is a literal quote. Quoted line breaks are not
/// supported.
fn split_csv(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

/// Compose an ISO timestamp from NDBC date columns. Two-digit years are
/// 19xx; minutes default to zero in hourly files.
fn ndbc_timestamp(parts: &BTreeMap<&str, i64>) -> Option<String> {
    let year = match *parts.get("year")? {
        y if y < 100 => y + 1900,
        y => y,
    };
    Some(format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:00Z",
        year,
        parts.get("month")?,
        parts.get("day")?,
        parts.get("hour")?,
        parts.get("minute").copied().unwrap_or(0)
    ))
}
