//! NDBC buoy station adapter.

use std::sync::Arc;

use wave_common::{CanonicalField, RawRecord, SourceId, SourceKind};

use super::{normalize_with, AdapterSettings, DecodeRules, Normalized, SourceAdapter};
use crate::error::Result;
use crate::schema::Schema;
use crate::units::{FEET_TO_METERS, HECTOPASCALS_TO_PASCALS, KNOTS_TO_METERS_PER_SECOND};

const VERSION: &str = "ndbc-stdmet/1.2";

/// NDBC writes 99, 999 or 9999 (sized to the column width) for missing
/// numeric values.
fn ndbc_fill_values(field: CanonicalField) -> &'static [f64] {
    match field {
        CanonicalField::SignificantWaveHeight
        | CanonicalField::WavePeriod
        | CanonicalField::WindSpeed => &[99.0],
        CanonicalField::WindDirection => &[999.0],
        CanonicalField::SeaLevelPressure => &[9999.0],
        CanonicalField::Density => &[99.0, 999.0, 9999.0],
    }
}

const RULES: DecodeRules = DecodeRules {
    conversions: &[HECTOPASCALS_TO_PASCALS, KNOTS_TO_METERS_PER_SECOND, FEET_TO_METERS],
    missing_tokens: &["MM"],
    fill_values: ndbc_fill_values,
    allow_arrays: false,
    wrap_longitude: false,
};

/// Adapter for in-situ buoy observations.
///
/// Station records are point measurements; the position usually comes
/// from station metadata supplied by the reader rather than each line.
pub struct BuoyAdapter {
    schema: Arc<Schema>,
    settings: AdapterSettings,
}

impl BuoyAdapter {
    pub fn new(schema: Arc<Schema>, settings: AdapterSettings) -> Self {
        Self { schema, settings }
    }
}

impl SourceAdapter for BuoyAdapter {
    fn source_id(&self) -> &SourceId {
        &self.schema.source_id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Buoy
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn normalize(&self, raw: &RawRecord) -> Result<Normalized> {
        normalize_with(&self.schema, &RULES, &self.settings, VERSION, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestionError;

    fn adapter() -> BuoyAdapter {
        BuoyAdapter::new(
            Arc::new(Schema::buoy(SourceId::new("ndbc-46050"))),
            AdapterSettings::default(),
        )
    }

    fn record() -> RawRecord {
        RawRecord::new(SourceId::new("ndbc-46050"), "2020-01-15 06:50")
            .with_position(44.669, -124.546)
            .with_value("WVHT", "2.5")
            .with_value("DPD", "11.0")
            .with_value("WSPD", "7.0")
            .with_value("WDIR", "250")
            .with_value("PRES", "1012.3")
    }

    #[test]
    fn test_normalize_station_record() {
        let obs: Vec<_> = adapter().normalize(&record()).unwrap().collect();
        assert_eq!(obs.len(), 1);
        let obs = &obs[0];
        assert_eq!(obs.significant_wave_height, Some(2.5));
        assert_eq!(obs.wave_period, Some(11.0));
        assert!((obs.sea_level_pressure.unwrap() - 101_230.0).abs() < 1e-6);
        assert_eq!(obs.density, 1025.0);
        assert!(obs.density_defaulted);
        assert_eq!(obs.provenance.adapter_version, VERSION);
    }

    #[test]
    fn test_mm_and_fill_values_are_missing() {
        let raw = record()
            .with_value("WVHT", "MM")
            .with_value("WDIR", "999")
            .with_value("PRES", "9999.0");
        let obs = adapter().normalize(&raw).unwrap().next().unwrap();
        assert_eq!(obs.significant_wave_height, None);
        assert_eq!(obs.wind_direction, None);
        assert_eq!(obs.sea_level_pressure, None);
        assert_eq!(obs.wave_period, Some(11.0));
    }

    #[test]
    fn test_average_period_alias() {
        let mut raw = record();
        raw.values.remove("DPD");
        let raw = raw.with_value("APD", 6.5);
        let obs = adapter().normalize(&raw).unwrap().next().unwrap();
        assert_eq!(obs.wave_period, Some(6.5));
    }

    #[test]
    fn test_missing_period_is_malformed() {
        let mut raw = record();
        raw.values.remove("DPD");
        let err = adapter().normalize(&raw).unwrap_err();
        assert!(err.is_per_record());
    }

    #[test]
    fn test_knots_are_converted() {
        let raw = record().with_unit("WSPD", "kts").with_value("WSPD", 10.0);
        let obs = adapter().normalize(&raw).unwrap().next().unwrap();
        assert!((obs.wind_speed.unwrap() - 5.144_444).abs() < 1e-5);
    }

    #[test]
    fn test_undeclared_unit_is_malformed() {
        let raw = record().with_unit("WSPD", "km/h");
        assert!(matches!(
            adapter().normalize(&raw),
            Err(IngestionError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_missing_position_is_malformed() {
        let mut raw = record();
        raw.latitude = None;
        raw.longitude = None;
        assert!(adapter().normalize(&raw).is_err());
    }
}
