//! Pipeline configuration.
//!
//! Deserialized from YAML by [`crate::config_loader`]; every section except
//! `region`, `sources` and `output` has defaults.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use flux_engine::{DEFAULT_ENERGY_PRICE, DEFAULT_THRESHOLD_PERCENTILE, DEFAULT_TOP_SITES};
use ingestion::{DEFAULT_DUPLICATE_LOOKBACK, DEFAULT_SEAWATER_DENSITY};
use serde::{Deserialize, Serialize};
use wave_common::{AggregationWindow, BoundingBox, SourceId, SourceKind};

use crate::error::{PipelineError, Result};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub region: RegionConfig,

    /// Grid node spacing in degrees.
    #[serde(default = "default_resolution")]
    pub grid_resolution_degrees: f64,

    #[serde(default = "default_window")]
    pub aggregation_window: AggregationWindow,

    /// Source ids, highest precedence first. Sources not listed rank
    /// after every listed one, in configuration order.
    #[serde(default)]
    pub source_precedence: Vec<SourceId>,

    #[serde(default = "default_density")]
    pub seawater_density_default: f64,

    #[serde(default = "default_parallel_sources")]
    pub max_parallel_sources: usize,

    /// Capacity of each source's duplicate lookback.
    #[serde(default = "default_lookback")]
    pub duplicate_lookback: usize,

    pub sources: Vec<SourceConfig>,

    pub output: OutputConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    #[serde(default = "default_region_name")]
    pub name: String,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl RegionConfig {
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.min_lat, self.max_lat, self.min_lon, self.max_lon)
    }
}

/// One upstream dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: SourceId,
    pub kind: SourceKind,

    /// Files or directories (walked recursively).
    pub inputs: Vec<PathBuf>,

    /// Source-native unit per raw variable name, for inputs that do not
    /// declare units inline.
    #[serde(default)]
    pub units: BTreeMap<String, String>,

    /// Fixed station position for inputs without per-record coordinates.
    #[serde(default)]
    pub position: Option<PositionConfig>,

    /// Expected interval between timesteps.
    #[serde(default)]
    pub cadence_minutes: Option<u64>,

    /// YAML schema replacing the built-in one for this source's kind.
    #[serde(default)]
    pub schema: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionConfig {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jsonl,
    Csv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,

    #[serde(default = "default_output_format")]
    pub format: OutputFormat,

    /// Run summary location; defaults to `<path>.summary.json`.
    #[serde(default)]
    pub summary_path: Option<PathBuf>,
}

impl OutputConfig {
    pub fn summary_path(&self) -> PathBuf {
        self.summary_path.clone().unwrap_or_else(|| {
            let mut name = self.path.clone().into_os_string();
            name.push(".summary.json");
            PathBuf::from(name)
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_top_sites")]
    pub top_sites: usize,
    #[serde(default = "default_threshold_percentile")]
    pub threshold_percentile: f64,
    #[serde(default = "default_energy_price")]
    pub energy_price_per_mwh: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_sites: DEFAULT_TOP_SITES,
            threshold_percentile: DEFAULT_THRESHOLD_PERCENTILE,
            energy_price_per_mwh: DEFAULT_ENERGY_PRICE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_resolution() -> f64 {
    0.25
}

fn default_window() -> AggregationWindow {
    AggregationWindow::Month
}

fn default_density() -> f64 {
    DEFAULT_SEAWATER_DENSITY
}

fn default_parallel_sources() -> usize {
    4
}

fn default_lookback() -> usize {
    DEFAULT_DUPLICATE_LOOKBACK
}

fn default_region_name() -> String {
    "region".to_string()
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Jsonl
}

fn default_top_sites() -> usize {
    DEFAULT_TOP_SITES
}

fn default_threshold_percentile() -> f64 {
    DEFAULT_THRESHOLD_PERCENTILE
}

fn default_energy_price() -> f64 {
    DEFAULT_ENERGY_PRICE
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl PipelineConfig {
    /// Checks that need nothing but the configuration itself. Region and
    /// grid limits are checked when the spatial filter is built.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(PipelineError::config("at least one source must be configured"));
        }

        let mut ids = BTreeSet::new();
        for source in &self.sources {
            if source.id.as_str().trim().is_empty() {
                return Err(PipelineError::config("source id cannot be empty"));
            }
            if !ids.insert(&source.id) {
                return Err(PipelineError::config(format!("duplicate source id: {}", source.id)));
            }
            if source.inputs.is_empty() {
                return Err(PipelineError::config(format!("source {} has no inputs", source.id)));
            }
            if source.cadence_minutes == Some(0) {
                return Err(PipelineError::config(format!(
                    "source {}: cadence_minutes must be positive",
                    source.id
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for id in &self.source_precedence {
            if !ids.contains(id) {
                return Err(PipelineError::InvalidPrecedence(id.clone()));
            }
            if !seen.insert(id) {
                return Err(PipelineError::config(format!(
                    "source {} appears twice in source_precedence",
                    id
                )));
            }
        }

        if !(self.seawater_density_default.is_finite() && self.seawater_density_default > 0.0) {
            return Err(PipelineError::config(format!(
                "seawater_density_default must be positive, got {}",
                self.seawater_density_default
            )));
        }
        if self.max_parallel_sources == 0 {
            return Err(PipelineError::config("max_parallel_sources must be at least 1"));
        }
        if self.duplicate_lookback == 0 {
            return Err(PipelineError::config("duplicate_lookback must be at least 1"));
        }
        if !(0.0..=100.0).contains(&self.analysis.threshold_percentile) {
            return Err(PipelineError::config(format!(
                "threshold_percentile must be within [0, 100], got {}",
                self.analysis.threshold_percentile
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(PipelineError::config(format!(
                "invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            )));
        }
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(PipelineError::config(format!(
                "invalid log format: {}. Must be one of: {:?}",
                self.logging.format, valid_formats
            )));
        }

        Ok(())
    }

    /// Precedence rank per source; lower ranks win.
    pub fn precedence_ranks(&self) -> BTreeMap<SourceId, usize> {
        let mut ranks: BTreeMap<SourceId, usize> = self
            .source_precedence
            .iter()
            .enumerate()
            .map(|(rank, id)| (id.clone(), rank))
            .collect();
        for source in &self.sources {
            let next = ranks.len();
            ranks.entry(source.id.clone()).or_insert(next);
        }
        ranks
    }

    pub fn source(&self, id: &SourceId) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| &s.id == id)
    }
}
