//! Schema registry.
//!
//! Declares, per source, which upstream variables feed which canonical
//! field, in which source-native units, and the plausible range of each
//! quantity once converted to SI. The registry is built once at startup
//! and shared read-only afterwards.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use wave_common::{CanonicalField, SourceId, SourceKind};

use crate::error::{IngestionError, Result};
use crate::units::Unit;

/// One upstream variable and how it maps onto the canonical model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Variable name as written by the source.
    pub name: String,
    /// Alternative names the same quantity is published under.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Canonical field this variable feeds.
    pub field: CanonicalField,
    /// Expected source-native unit.
    pub units: String,
    /// Plausible minimum, in SI units.
    pub min: f64,
    /// Plausible maximum, in SI units.
    pub max: f64,
    #[serde(default)]
    pub required: bool,
}

impl VariableSpec {
    fn new(name: &str, field: CanonicalField, units: &str, min: f64, max: f64) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            field,
            units: units.to_string(),
            min,
            max,
            required: false,
        }
    }

    fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// All names this variable may appear under, primary name first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Check if a value (in SI) is within the plausible range.
    pub fn in_range(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

/// Expected structure of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub source_id: SourceId,
    pub kind: SourceKind,
    pub variables: Vec<VariableSpec>,
}

// Plausible ranges in SI units, shared by the built-in schemas.
const WAVE_HEIGHT_RANGE: (f64, f64) = (0.0, 30.0);
const WAVE_PERIOD_RANGE: (f64, f64) = (0.0, 40.0);
const WIND_SPEED_RANGE: (f64, f64) = (0.0, 75.0);
const WIND_DIRECTION_RANGE: (f64, f64) = (0.0, 360.0);
const PRESSURE_RANGE: (f64, f64) = (85_000.0, 110_000.0);
const DENSITY_RANGE: (f64, f64) = (1000.0, 1050.0);

impl Schema {
    /// Built-in schema for a source kind.
    pub fn for_kind(source_id: SourceId, kind: SourceKind) -> Self {
        match kind {
            SourceKind::Buoy => Self::buoy(source_id),
            SourceKind::Reanalysis => Self::reanalysis(source_id),
            SourceKind::Satellite => Self::satellite(source_id),
        }
    }

    /// NDBC standard meteorological station data.
    pub fn buoy(source_id: SourceId) -> Self {
        use CanonicalField::*;
        Self {
            source_id,
            kind: SourceKind::Buoy,
            variables: vec![
                VariableSpec::new("WVHT", SignificantWaveHeight, "m", WAVE_HEIGHT_RANGE.0, WAVE_HEIGHT_RANGE.1)
                    .required(),
                VariableSpec::new("DPD", WavePeriod, "s", WAVE_PERIOD_RANGE.0, WAVE_PERIOD_RANGE.1)
                    .aliases(&["APD"])
                    .required(),
                VariableSpec::new("WSPD", WindSpeed, "m/s", WIND_SPEED_RANGE.0, WIND_SPEED_RANGE.1),
                VariableSpec::new("WDIR", WindDirection, "degT", WIND_DIRECTION_RANGE.0, WIND_DIRECTION_RANGE.1),
                VariableSpec::new("PRES", SeaLevelPressure, "hPa", PRESSURE_RANGE.0, PRESSURE_RANGE.1),
                VariableSpec::new("RHO", Density, "kg/m3", DENSITY_RANGE.0, DENSITY_RANGE.1),
            ],
        }
    }

    /// Copernicus Marine global wave reanalysis (ERA5 names as aliases).
    pub fn reanalysis(source_id: SourceId) -> Self {
        use CanonicalField::*;
        Self {
            source_id,
            kind: SourceKind::Reanalysis,
            variables: vec![
                VariableSpec::new("VHM0", SignificantWaveHeight, "m", WAVE_HEIGHT_RANGE.0, WAVE_HEIGHT_RANGE.1)
                    .aliases(&["swh"])
                    .required(),
                VariableSpec::new("VTPK", WavePeriod, "s", WAVE_PERIOD_RANGE.0, WAVE_PERIOD_RANGE.1)
                    .aliases(&["VTM10", "mwp", "pp1d"])
                    .required(),
                VariableSpec::new("wind", WindSpeed, "m/s", WIND_SPEED_RANGE.0, WIND_SPEED_RANGE.1)
                    .aliases(&["WIND"]),
                VariableSpec::new("dwi", WindDirection, "deg", WIND_DIRECTION_RANGE.0, WIND_DIRECTION_RANGE.1),
                VariableSpec::new("msl", SeaLevelPressure, "Pa", PRESSURE_RANGE.0, PRESSURE_RANGE.1),
            ],
        }
    }

    /// Satellite altimetry wave product (along-track swath segments).
    pub fn satellite(source_id: SourceId) -> Self {
        use CanonicalField::*;
        Self {
            source_id,
            kind: SourceKind::Satellite,
            variables: vec![
                VariableSpec::new("VAVH", SignificantWaveHeight, "m", WAVE_HEIGHT_RANGE.0, WAVE_HEIGHT_RANGE.1)
                    .aliases(&["swh"])
                    .required(),
                VariableSpec::new("VTM02", WavePeriod, "s", WAVE_PERIOD_RANGE.0, WAVE_PERIOD_RANGE.1)
                    .aliases(&["mwp"])
                    .required(),
                VariableSpec::new("WIND_SPEED", WindSpeed, "m/s", WIND_SPEED_RANGE.0, WIND_SPEED_RANGE.1),
            ],
        }
    }

    /// Parse a schema from YAML; the configured source id wins over any
    /// id written in the file.
    pub fn from_yaml(source_id: SourceId, content: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct SchemaFile {
            kind: SourceKind,
            variables: Vec<VariableSpec>,
        }

        let file: SchemaFile = serde_yaml::from_str(content)
            .map_err(|e| IngestionError::InvalidSchema(format!("{}: {}", source_id, e)))?;
        let schema = Self {
            source_id,
            kind: file.kind,
            variables: file.variables,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Load a schema override from a YAML file.
    pub fn load_file<P: AsRef<Path>>(source_id: SourceId, path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(source_id, &content)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        for field in [CanonicalField::SignificantWaveHeight, CanonicalField::WavePeriod] {
            match self.variable(field) {
                Some(var) if var.required => {}
                _ => {
                    return Err(IngestionError::InvalidSchema(format!(
                        "{}: {} must be declared as a required variable",
                        self.source_id, field
                    )))
                }
            }
        }

        for var in &self.variables {
            if !(var.min.is_finite() && var.max.is_finite() && var.min < var.max) {
                return Err(IngestionError::InvalidSchema(format!(
                    "{}: invalid range [{}, {}] for {}",
                    self.source_id, var.min, var.max, var.name
                )));
            }
            if Unit::parse(&var.units).is_none() {
                return Err(IngestionError::InvalidSchema(format!(
                    "{}: unrecognized unit '{}' for {}",
                    self.source_id, var.units, var.name
                )));
            }
        }

        Ok(())
    }

    /// The variable feeding a canonical field.
    pub fn variable(&self, field: CanonicalField) -> Option<&VariableSpec> {
        self.variables.iter().find(|v| v.field == field)
    }

    /// Plausible SI range for a canonical field.
    pub fn range(&self, field: CanonicalField) -> Option<(f64, f64)> {
        self.variable(field).map(|v| (v.min, v.max))
    }

    /// Canonical fields the source must provide.
    pub fn required_fields(&self) -> impl Iterator<Item = CanonicalField> + '_ {
        self.variables.iter().filter(|v| v.required).map(|v| v.field)
    }
}

/// Read-only lookup of schemas by source.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<SourceId, Arc<Schema>>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Look up the schema of a source.
    pub fn get_schema(&self, source_id: &SourceId) -> Result<Arc<Schema>> {
        self.schemas
            .get(source_id)
            .cloned()
            .ok_or_else(|| IngestionError::UnknownSource(source_id.to_string()))
    }

    pub fn contains(&self, source_id: &SourceId) -> bool {
        self.schemas.contains_key(source_id)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Registered sources, sorted.
    pub fn source_ids(&self) -> Vec<SourceId> {
        let mut ids: Vec<_> = self.schemas.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Collects schemas before freezing them into a [`SchemaRegistry`].
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    schemas: HashMap<SourceId, Arc<Schema>>,
}

impl SchemaRegistryBuilder {
    /// Register a schema. Each source may be registered once.
    pub fn register(mut self, schema: Schema) -> Result<Self> {
        schema.validate()?;
        if self.schemas.contains_key(&schema.source_id) {
            return Err(IngestionError::InvalidSchema(format!(
                "duplicate schema for source {}",
                schema.source_id
            )));
        }
        debug!(source = %schema.source_id, kind = %schema.kind, "Registered schema");
        self.schemas
            .insert(schema.source_id.clone(), Arc::new(schema));
        Ok(self)
    }

    /// Register the built-in schema for a source kind.
    pub fn register_builtin(self, source_id: SourceId, kind: SourceKind) -> Result<Self> {
        self.register(Schema::for_kind(source_id, kind))
    }

    pub fn build(self) -> SchemaRegistry {
        SchemaRegistry {
            schemas: self.schemas,
        }
    }
}
