//! Shared decoding of raw records into SI columns.
//!
//! Every adapter runs the same steps: pick the raw variable for each
//! canonical field, resolve and convert its unit, turn sentinels into
//! missing values and validate the position. What differs between
//! adapters is captured in [`DecodeRules`].

use chrono::{DateTime, Utc};
use serde_json::Value;
use wave_common::{
    parse_timestamp, CanonicalField, CanonicalObservation, Provenance, RawRecord,
};

use super::AdapterSettings;
use crate::error::{IngestionError, Result};
use crate::schema::{Schema, VariableSpec};
use crate::units::{conversion_factor, Conversion, Unit};

/// Adapter-specific decoding behaviour.
#[derive(Debug, Clone, Copy)]
pub struct DecodeRules {
    /// Declared unit conversions. Anything else is malformed.
    pub conversions: &'static [Conversion],
    /// String tokens meaning "value present but missing".
    pub missing_tokens: &'static [&'static str],
    /// Numeric fill values per canonical field, in source units.
    pub fill_values: fn(CanonicalField) -> &'static [f64],
    /// Accept array-valued variables (swath segments).
    pub allow_arrays: bool,
    /// Map 0..360 longitudes onto -180..180.
    pub wrap_longitude: bool,
}

/// Decoded values of one variable: a scalar broadcast over every sample
/// or one entry per sample.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Column {
    Scalar(Option<f64>),
    Array(Vec<Option<f64>>),
}

impl Column {
    fn get(&self, index: usize) -> Option<f64> {
        match self {
            Column::Scalar(v) => *v,
            Column::Array(values) => values.get(index).copied().flatten(),
        }
    }

    fn array_len(&self) -> Option<usize> {
        match self {
            Column::Scalar(_) => None,
            Column::Array(values) => Some(values.len()),
        }
    }

    fn map(self, f: impl Fn(f64) -> f64) -> Self {
        match self {
            Column::Scalar(v) => Column::Scalar(v.map(f)),
            Column::Array(values) => {
                Column::Array(values.into_iter().map(|v| v.map(&f)).collect())
            }
        }
    }

    fn values(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match self {
            Column::Scalar(v) => Box::new(v.iter().copied()),
            Column::Array(values) => Box::new(values.iter().filter_map(|v| *v)),
        }
    }
}

/// A fully validated raw record, ready to be expanded into observations.
#[derive(Debug, Clone)]
pub(crate) struct DecodedFrame {
    timestamp: DateTime<Utc>,
    len: usize,
    latitude: Column,
    longitude: Column,
    fields: Vec<(CanonicalField, Column)>,
    default_density: f64,
}

impl DecodedFrame {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    fn value(&self, field: CanonicalField, index: usize) -> Option<f64> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .and_then(|(_, column)| column.get(index))
    }

    /// Observation for one sample. Samples without a position are skipped.
    pub(crate) fn observation(
        &self,
        index: usize,
        provenance: &Provenance,
    ) -> Option<CanonicalObservation> {
        let latitude = self.latitude.get(index)?;
        let longitude = self.longitude.get(index)?;
        let measured_density = self.value(CanonicalField::Density, index);

        Some(CanonicalObservation {
            timestamp: self.timestamp,
            latitude,
            longitude,
            significant_wave_height: self.value(CanonicalField::SignificantWaveHeight, index),
            wave_period: self.value(CanonicalField::WavePeriod, index),
            wind_speed: self.value(CanonicalField::WindSpeed, index),
            wind_direction: self.value(CanonicalField::WindDirection, index),
            sea_level_pressure: self.value(CanonicalField::SeaLevelPressure, index),
            density: measured_density.unwrap_or(self.default_density),
            density_defaulted: measured_density.is_none(),
            provenance: provenance.clone(),
            cell: None,
            quality: None,
        })
    }
}

const LATITUDE_NAMES: &[&str] = &["latitude", "lat"];
const LONGITUDE_NAMES: &[&str] = &["longitude", "lon"];

/// Decode and validate a raw record against a schema.
pub(crate) fn decode_frame(
    schema: &Schema,
    rules: &DecodeRules,
    settings: &AdapterSettings,
    raw: &RawRecord,
) -> Result<DecodedFrame> {
    let source = &schema.source_id;
    if &raw.source_id != source {
        return Err(IngestionError::malformed(
            source,
            format!("record belongs to source {}", raw.source_id),
        ));
    }

    let timestamp = parse_timestamp(&raw.timestamp).map_err(|_| {
        IngestionError::malformed(source, format!("unparsable timestamp '{}'", raw.timestamp))
    })?;

    let mut fields = Vec::with_capacity(schema.variables.len());
    for var in &schema.variables {
        let Some((name, value)) = lookup(raw, var) else {
            if var.required {
                return Err(IngestionError::malformed(
                    source,
                    format!("missing required variable {} ({})", var.name, var.field),
                ));
            }
            continue;
        };

        let factor = resolve_factor(schema, rules, settings, raw, var, name)?;
        let fill = (rules.fill_values)(var.field);
        let column = parse_column(value, rules, fill)
            .map_err(|reason| IngestionError::malformed(source, format!("{}: {}", name, reason)))?
            .map(|v| v * factor);
        fields.push((var.field, column));
    }

    let latitude = coordinate(raw, raw.latitude, LATITUDE_NAMES, rules, source)?;
    let longitude = coordinate(raw, raw.longitude, LONGITUDE_NAMES, rules, source)?;
    let longitude = if rules.wrap_longitude {
        longitude.map(wrap_longitude)
    } else {
        longitude
    };

    if let Some(lat) = latitude.values().find(|v| !(-90.0..=90.0).contains(v)) {
        return Err(IngestionError::malformed(
            source,
            format!("latitude {} outside [-90, 90]", lat),
        ));
    }
    if let Some(lon) = longitude.values().find(|v| !(-180.0..=180.0).contains(v)) {
        return Err(IngestionError::malformed(
            source,
            format!("longitude {} outside [-180, 180]", lon),
        ));
    }

    let len = sample_count(&latitude, &longitude, &fields)
        .map_err(|reason| IngestionError::malformed(source, reason))?;

    Ok(DecodedFrame {
        timestamp,
        len,
        latitude,
        longitude,
        fields,
        default_density: settings.default_density,
    })
}

/// Find the raw value for a variable under its name or any alias.
fn lookup<'r>(raw: &'r RawRecord, var: &VariableSpec) -> Option<(&'r str, &'r Value)> {
    var.names().find_map(|name| {
        raw.values
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
    })
}

/// Conversion factor from the declared raw unit into SI.
fn resolve_factor(
    schema: &Schema,
    rules: &DecodeRules,
    settings: &AdapterSettings,
    raw: &RawRecord,
    var: &VariableSpec,
    name: &str,
) -> Result<f64> {
    let label = raw
        .units
        .get(name)
        .or_else(|| settings.unit_overrides.get(name))
        .or_else(|| settings.unit_overrides.get(&var.name))
        .unwrap_or(&var.units);

    let unit = Unit::parse(label).ok_or_else(|| {
        IngestionError::malformed(&schema.source_id, format!("{}: unknown unit '{}'", name, label))
    })?;

    conversion_factor(rules.conversions, unit, Unit::canonical_for(var.field)).ok_or_else(|| {
        IngestionError::malformed(
            &schema.source_id,
            format!("{}: no declared conversion from '{}' to {}", name, label, var.field.si_unit()),
        )
    })
}

fn parse_column(value: &Value, rules: &DecodeRules, fill: &[f64]) -> std::result::Result<Column, String> {
    match value {
        Value::Array(items) if rules.allow_arrays => items
            .iter()
            .map(|item| parse_scalar(item, rules, fill))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Column::Array),
        Value::Array(_) => Err("array values are not supported by this source".to_string()),
        other => parse_scalar(other, rules, fill).map(Column::Scalar),
    }
}

/// Parse one scalar. `Ok(None)` is a present-but-missing value.
fn parse_scalar(value: &Value, rules: &DecodeRules, fill: &[f64]) -> std::result::Result<Option<f64>, String> {
    let number = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("unrepresentable number {}", n))?,
        Value::String(s) => {
            let s = s.trim();
            if rules.missing_tokens.contains(&s) || s.eq_ignore_ascii_case("nan") {
                return Ok(None);
            }
            s.parse::<f64>()
                .map_err(|_| format!("unparsable value '{}'", s))?
        }
        other => return Err(format!("unexpected value {}", other)),
    };

    if !number.is_finite() || fill.iter().any(|f| is_fill(number, *f)) {
        Ok(None)
    } else {
        Ok(Some(number))
    }
}

fn is_fill(value: f64, fill: f64) -> bool {
    (value - fill).abs() <= fill.abs() * 1e-6
}

fn coordinate(
    raw: &RawRecord,
    explicit: Option<f64>,
    names: &[&str],
    rules: &DecodeRules,
    source: &wave_common::SourceId,
) -> Result<Column> {
    if let Some(v) = explicit {
        return Ok(Column::Scalar(Some(v)));
    }

    let value = names
        .iter()
        .find_map(|name| raw.values.get(*name))
        .ok_or_else(|| IngestionError::malformed(source, format!("missing {}", names[0])))?;

    let column = parse_column(value, rules, &[])
        .map_err(|reason| IngestionError::malformed(source, format!("{}: {}", names[0], reason)))?;
    if column == Column::Scalar(None) {
        return Err(IngestionError::malformed(source, format!("missing {}", names[0])));
    }
    Ok(column)
}

fn wrap_longitude(lon: f64) -> f64 {
    if lon > 180.0 && lon <= 360.0 {
        lon - 360.0
    } else {
        lon
    }
}

/// Number of samples: the common length of array columns, or one when
/// every column is scalar.
fn sample_count(
    latitude: &Column,
    longitude: &Column,
    fields: &[(CanonicalField, Column)],
) -> std::result::Result<usize, String> {
    let mut len: Option<usize> = None;
    let columns = [latitude, longitude]
        .into_iter()
        .chain(fields.iter().map(|(_, c)| c));

    for column in columns {
        if let Some(n) = column.array_len() {
            match len {
                Some(existing) if existing != n => {
                    return Err(format!("array length mismatch ({} vs {})", existing, n))
                }
                _ => len = Some(n),
            }
        }
    }

    Ok(len.unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_fill(_: CanonicalField) -> &'static [f64] {
        &[]
    }

    const RULES: DecodeRules = DecodeRules {
        conversions: &[],
        missing_tokens: &["MM"],
        fill_values: no_fill,
        allow_arrays: true,
        wrap_longitude: false,
    };

    #[test]
    fn test_sentinels_are_missing() {
        assert_eq!(parse_scalar(&json!("MM"), &RULES, &[]), Ok(None));
        assert_eq!(parse_scalar(&json!(null), &RULES, &[]), Ok(None));
        assert_eq!(parse_scalar(&json!(99.0), &RULES, &[99.0]), Ok(None));
        assert_eq!(parse_scalar(&json!("1.5"), &RULES, &[99.0]), Ok(Some(1.5)));
        assert!(parse_scalar(&json!("abc"), &RULES, &[]).is_err());
    }

    #[test]
    fn test_array_length_mismatch() {
        let lat = Column::Array(vec![Some(1.0), Some(2.0)]);
        let lon = Column::Array(vec![Some(1.0)]);
        assert!(sample_count(&lat, &lon, &[]).is_err());
        assert_eq!(
            sample_count(&Column::Scalar(Some(1.0)), &Column::Scalar(Some(1.0)), &[]),
            Ok(1)
        );
    }

    #[test]
    fn test_wrap_longitude() {
        assert_eq!(wrap_longitude(233.0), -127.0);
        assert_eq!(wrap_longitude(-127.0), -127.0);
    }
}
