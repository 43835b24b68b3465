//! Satellite altimetry adapter.

use std::sync::Arc;

use wave_common::{CanonicalField, RawRecord, SourceId, SourceKind};

use super::{normalize_with, AdapterSettings, DecodeRules, Normalized, SourceAdapter};
use crate::error::Result;
use crate::schema::Schema;
use crate::units::{CENTIMETERS_TO_METERS, KNOTS_TO_METERS_PER_SECOND};

const VERSION: &str = "altimetry-l3/2.0";

fn altimetry_fill_values(_: CanonicalField) -> &'static [f64] {
    &[9.969_209_968_386_869e36, 32767.0, -32767.0]
}

const RULES: DecodeRules = DecodeRules {
    conversions: &[CENTIMETERS_TO_METERS, KNOTS_TO_METERS_PER_SECOND],
    missing_tokens: &[],
    fill_values: altimetry_fill_values,
    allow_arrays: true,
    wrap_longitude: true,
};

/// Adapter for along-track altimetry.
///
/// A raw record may be a single sample or a swath segment whose variables
/// (including `latitude`/`longitude`) are parallel arrays; each array
/// position becomes one observation. Samples without a position are
/// dropped.
pub struct SatelliteAdapter {
    schema: Arc<Schema>,
    settings: AdapterSettings,
}

impl SatelliteAdapter {
    pub fn new(schema: Arc<Schema>, settings: AdapterSettings) -> Self {
        Self { schema, settings }
    }
}

impl SourceAdapter for SatelliteAdapter {
    fn source_id(&self) -> &SourceId {
        &self.schema.source_id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Satellite
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
    use serde_json::json;

    fn adapter() -> SatelliteAdapter {
        SatelliteAdapter::new(
            Arc::new(Schema::satellite(SourceId::new("sentinel-3a"))),
            AdapterSettings::default(),
        )
    }

    fn segment() -> RawRecord {
        RawRecord::new(SourceId::new("sentinel-3a"), "2020-07-01T03:00:00Z")
            .with_value("latitude", json!([47.0, null, 47.2, 47.3]))
            .with_value("longitude", json!([233.0, 233.1, 233.2, 233.3]))
            .with_value("VAVH", json!([150.0, 160.0, 32767, null]))
            .with_value("VTM02", json!([7.0, 7.1, 7.2, 7.3]))
            .with_unit("VAVH", "cm")
    }

    #[test]
    fn test_swath_segment_expands() {
        let obs: Vec<_> = adapter().normalize(&segment()).unwrap().collect();
        // second sample has no latitude
        assert_eq!(obs.len(), 3);
        assert!((obs[0].significant_wave_height.unwrap() - 1.5).abs() < 1e-12);
        assert!((obs[0].longitude - -127.0).abs() < 1e-9);
        assert_eq!(obs[1].significant_wave_height, None);
        assert_eq!(obs[2].significant_wave_height, None);
        assert_eq!(obs[2].wave_period, Some(7.3));
    }

    #[test]
    fn test_mismatched_arrays_are_malformed() {
        let raw = segment().with_value("VTM02", json!([7.0, 7.1]));
        assert!(adapter().normalize(&raw).is_err());
    }

    #[test]
    fn test_empty_segment_yields_nothing() {
        let raw = RawRecord::new(SourceId::new("sentinel-3a"), "2020-07-01T03:00:00Z")
            .with_value("latitude", json!([]))
            .with_value("longitude", json!([]))
            .with_value("VAVH", json!([]))
            .with_value("VTM02", json!([]));
        assert_eq!(adapter().normalize(&raw).unwrap().count(), 0);
    }

    #[test]
    fn test_point_sample() {
        let raw = RawRecord::new(SourceId::new("sentinel-3a"), "2020-07-01T03:00:00Z")
            .with_position(47.0, -127.0)
            .with_value("swh", 2.0)
            .with_value("mwp", 8.0);
        assert_eq!(adapter().normalize(&raw).unwrap().count(), 1);
    }
}
