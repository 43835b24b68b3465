//! Data model flowing through the pipeline.
//!
//! ```text
//! RawRecord ──adapter──► CanonicalObservation ──filter──► (cell assigned)
//!     ──quality──► (flag assigned) ──flux──► FluxRecord
//!     ──aggregate──► AggregatedStat ──merge──► FusedDataset
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WaveError;
use crate::grid::GridCell;
use crate::time::TimeBucket;

/// Identifier of a configured data source (e.g. "ndbc-46050").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Family of upstream data a source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Satellite altimetry along-track or gridded products.
    Satellite,
    /// Model reanalysis / hindcast grids.
    Reanalysis,
    /// In-situ buoy station observations.
    Buoy,
}

impl FromStr for SourceKind {
    type Err = WaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "satellite" | "altimetry" => Ok(SourceKind::Satellite),
            "reanalysis" | "model" | "hindcast" => Ok(SourceKind::Reanalysis),
            "buoy" | "station" => Ok(SourceKind::Buoy),
            other => Err(WaveError::UnknownSourceKind(other.to_string())),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::Satellite => "satellite",
            SourceKind::Reanalysis => "reanalysis",
            SourceKind::Buoy => "buoy",
        };
        f.write_str(s)
    }
}

/// One upstream record, exactly as delivered by the reader.
///
/// Values are kept as raw JSON so adapters can tell a missing variable
/// from an unparsable or sentinel one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source_id: SourceId,
    pub timestamp: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub values: BTreeMap<String, serde_json::Value>,
    /// Source-native unit per variable, when the source declares them inline.
    #[serde(default)]
    pub units: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new(source_id: SourceId, timestamp: impl Into<String>) -> Self {
        Self {
            source_id,
            timestamp: timestamp.into(),
            latitude: None,
            longitude: None,
            values: BTreeMap::new(),
            units: BTreeMap::new(),
        }
    }

    pub fn with_position(mut self, lat: f64, lon: f64) -> Self {
        self.latitude = Some(lat);
        self.longitude = Some(lon);
        self
    }

    pub fn with_value(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn with_unit(mut self, name: &str, unit: &str) -> Self {
        self.units.insert(name.to_string(), unit.to_string());
        self
    }
}

/// Physical quantities a canonical observation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    SignificantWaveHeight,
    WavePeriod,
    WindSpeed,
    WindDirection,
    SeaLevelPressure,
    Density,
}

impl CanonicalField {
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::SignificantWaveHeight => "significant_wave_height",
            CanonicalField::WavePeriod => "wave_period",
            CanonicalField::WindSpeed => "wind_speed",
            CanonicalField::WindDirection => "wind_direction",
            CanonicalField::SeaLevelPressure => "sea_level_pressure",
            CanonicalField::Density => "density",
        }
    }

    /// SI unit of the canonical representation.
    pub fn si_unit(&self) -> &'static str {
        match self {
            CanonicalField::SignificantWaveHeight => "m",
            CanonicalField::WavePeriod => "s",
            CanonicalField::WindSpeed => "m/s",
            CanonicalField::WindDirection => "deg",
            CanonicalField::SeaLevelPressure => "Pa",
            CanonicalField::Density => "kg/m3",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which adapter produced an observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_id: SourceId,
    pub adapter_version: String,
}

/// Overall quality verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityLevel {
    Accepted,
    Suspect,
    Rejected,
}

/// Why an observation was not accepted outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    OutOfRange,
    MissingField,
    PhysicallyInconsistent,
    Duplicate,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReasonCode::OutOfRange => "OUT_OF_RANGE",
            ReasonCode::MissingField => "MISSING_FIELD",
            ReasonCode::PhysicallyInconsistent => "PHYSICALLY_INCONSISTENT",
            ReasonCode::Duplicate => "DUPLICATE",
        };
        f.write_str(s)
    }
}

/// Quality verdict attached to an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityFlag {
    pub level: QualityLevel,
    pub reason: Option<ReasonCode>,
    /// Field that triggered the verdict, if any.
    pub field: Option<CanonicalField>,
}

impl QualityFlag {
    pub fn accepted() -> Self {
        Self {
            level: QualityLevel::Accepted,
            reason: None,
            field: None,
        }
    }

    pub fn suspect(reason: ReasonCode, field: Option<CanonicalField>) -> Self {
        Self {
            level: QualityLevel::Suspect,
            reason: Some(reason),
            field,
        }
    }

    pub fn rejected(reason: ReasonCode, field: Option<CanonicalField>) -> Self {
        Self {
            level: QualityLevel::Rejected,
            reason: Some(reason),
            field,
        }
    }

    /// Accepted and suspect observations feed the flux engine.
    pub fn is_usable(&self) -> bool {
        self.level != QualityLevel::Rejected
    }
}

/// A normalized observation in SI units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalObservation {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Significant wave height (m). `None` when the source flagged it missing.
    pub significant_wave_height: Option<f64>,
    /// Peak or mean wave period (s).
    pub wave_period: Option<f64>,
    /// Wind speed (m/s).
    pub wind_speed: Option<f64>,
    /// Wind direction (degrees, coming from).
    pub wind_direction: Option<f64>,
    /// Sea-level pressure (Pa).
    pub sea_level_pressure: Option<f64>,
    /// Seawater density (kg/m3).
    pub density: f64,
    /// True when `density` is the configured default rather than measured.
    pub density_defaulted: bool,
    pub provenance: Provenance,
    /// Grid node assigned by the spatial filter.
    pub cell: Option<GridCell>,
    /// Verdict assigned by the quality controller.
    pub quality: Option<QualityFlag>,
}

impl CanonicalObservation {
    /// Value of a canonical field, if present.
    pub fn field(&self, field: CanonicalField) -> Option<f64> {
        match field {
            CanonicalField::SignificantWaveHeight => self.significant_wave_height,
            CanonicalField::WavePeriod => self.wave_period,
            CanonicalField::WindSpeed => self.wind_speed,
            CanonicalField::WindDirection => self.wind_direction,
            CanonicalField::SeaLevelPressure => self.sea_level_pressure,
            CanonicalField::Density => Some(self.density),
        }
    }

    pub fn source_id(&self) -> &SourceId {
        &self.provenance.source_id
    }
}

/// Inputs that went into a wave power flux value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluxInputs {
    pub wave_height: f64,
    pub wave_period: f64,
    pub density: f64,
    pub gravity: f64,
}

/// Wave power flux at one cell and timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluxRecord {
    pub timestamp: DateTime<Utc>,
    pub cell: GridCell,
    pub source_id: SourceId,
    pub quality: QualityLevel,
    /// Wave power per metre of crest (W/m).
    pub power: f64,
    pub inputs: FluxInputs,
}

/// Key of an aggregated row: grid cell plus window start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatKey {
    pub cell: GridCell,
    pub window_start: DateTime<Utc>,
}

/// Summary statistics for one (grid cell, time window).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStat {
    pub cell: GridCell,
    pub bucket: TimeBucket,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Population standard deviation.
    pub stddev: Option<f64>,
    /// Distinct timesteps contributing.
    pub count: u64,
    /// Flux records contributing (several may share a timestep).
    pub record_count: u64,
    /// Contributing flux records derived from suspect observations.
    pub suspect_count: u64,
    /// True when no data fell in this window.
    pub gap_filled: bool,
    /// Fraction of expected timesteps that are missing.
    pub gap_fraction: f64,
    pub sources: Vec<SourceId>,
}

impl AggregatedStat {
    pub fn key(&self) -> StatKey {
        StatKey {
            cell: self.cell,
            window_start: self.bucket.start,
        }
    }

    /// An explicit empty row for a window without data.
    pub fn gap(cell: GridCell, bucket: TimeBucket, sources: Vec<SourceId>) -> Self {
        Self {
            cell,
            bucket,
            mean: None,
            min: None,
            max: None,
            stddev: None,
            count: 0,
            record_count: 0,
            suspect_count: 0,
            gap_filled: true,
            gap_fraction: 1.0,
            sources,
        }
    }

    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}

/// One row of the fused output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedRow {
    /// Statistic kept after applying source precedence.
    pub stat: AggregatedStat,
    /// Source whose statistic was kept.
    pub selected_source: SourceId,
    /// Every source that reported this cell and window, in precedence order.
    pub provenance: Vec<SourceId>,
}

impl FusedRow {
    pub fn key(&self) -> StatKey {
        self.stat.key()
    }
}

/// Final analysis-ready dataset, ordered by cell then window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusedDataset {
    rows: Vec<FusedRow>,
}

impl FusedDataset {
    /// Build from rows in any order; rows are sorted by key.
    pub fn from_rows(mut rows: Vec<FusedRow>) -> Self {
        rows.sort_by_key(|row| row.key());
        Self { rows }
    }

    pub fn rows(&self) -> &[FusedRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<FusedRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FusedRow> {
        self.rows.iter()
    }

    /// The kept statistics, in dataset order.
    pub fn stats(&self) -> impl Iterator<Item = &AggregatedStat> {
        self.rows.iter().map(|row| &row.stat)
    }

    /// Look up a row by cell and window start.
    pub fn get(&self, key: &StatKey) -> Option<&FusedRow> {
        self.rows
            .binary_search_by(|row| row.key().cmp(key))
            .ok()
            .map(|idx| &self.rows[idx])
    }
}
