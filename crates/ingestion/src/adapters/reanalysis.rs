//! Gridded reanalysis / hindcast adapter (CMEMS and ERA5 style exports).

use std::sync::Arc;

use wave_common::{CanonicalField, RawRecord, SourceId, SourceKind};

use super::{normalize_with, AdapterSettings, DecodeRules, Normalized, SourceAdapter};
use crate::error::Result;
use crate::schema::Schema;
use crate::units::{CENTIMETERS_TO_METERS, HECTOPASCALS_TO_PASCALS, KMH_TO_METERS_PER_SECOND};

const VERSION: &str = "reanalysis-grid/1.1";

/// NetCDF default float fill, the CF short fill and the -999 used by
/// flattened CSV exports.
fn netcdf_fill_values(_: CanonicalField) -> &'static [f64] {
    &[9.969_209_968_386_869e36, -32767.0, -999.0]
}

const RULES: DecodeRules = DecodeRules {
    conversions: &[HECTOPASCALS_TO_PASCALS, KMH_TO_METERS_PER_SECOND, CENTIMETERS_TO_METERS],
    missing_tokens: &["--", "NA"],
    fill_values: netcdf_fill_values,
    allow_arrays: false,
    wrap_longitude: true,
};

/// Adapter for one grid point of a reanalysis product per raw record.
///
/// Grids published on 0..360 longitudes are mapped onto -180..180.
pub struct ReanalysisAdapter {
    schema: Arc<Schema>,
    settings: AdapterSettings,
}

impl ReanalysisAdapter {
    pub fn new(schema: Arc<Schema>, settings: AdapterSettings) -> Self {
        Self { schema, settings }
    }
}

impl SourceAdapter for ReanalysisAdapter {
    fn source_id(&self) -> &SourceId {
        &self.schema.source_id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Reanalysis
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

    fn adapter() -> ReanalysisAdapter {
        ReanalysisAdapter::new(
            Arc::new(Schema::reanalysis(SourceId::new("cmems"))),
            AdapterSettings::default(),
        )
    }

    #[test]
    fn test_era5_names_and_wrapped_longitude() {
        let raw = RawRecord::new(SourceId::new("cmems"), "2020-01-15T12:00:00Z")
            .with_position(47.5, 233.0)
            .with_value("swh", 3.0)
            .with_value("mwp", 9.0)
            .with_value("msl", 101_000.0);
        let obs = adapter().normalize(&raw).unwrap().next().unwrap();
        assert_eq!(obs.longitude, -127.0);
        assert_eq!(obs.significant_wave_height, Some(3.0));
        assert_eq!(obs.wave_period, Some(9.0));
        assert_eq!(obs.sea_level_pressure, Some(101_000.0));
    }

    #[test]
    fn test_fill_value_is_missing() {
        let raw = RawRecord::new(SourceId::new("cmems"), "2020-01-15T12:00:00Z")
            .with_position(47.5, -127.0)
            .with_value("VHM0", json!(9.969_209_968_386_869e36))
            .with_value("VTPK", 9.0);
        let obs = adapter().normalize(&raw).unwrap().next().unwrap();
        assert_eq!(obs.significant_wave_height, None);
    }

    #[test]
    fn test_out_of_range_coordinates_are_malformed() {
        let raw = RawRecord::new(SourceId::new("cmems"), "2020-01-15T12:00:00Z")
            .with_position(91.0, -127.0)
            .with_value("VHM0", 1.0)
            .with_value("VTPK", 9.0);
        assert!(adapter().normalize(&raw).is_err());
    }

    #[test]
    fn test_swath_arrays_are_rejected() {
        let raw = RawRecord::new(SourceId::new("cmems"), "2020-01-15T12:00:00Z")
            .with_position(47.5, -127.0)
            .with_value("VHM0", json!([1.0, 2.0]))
            .with_value("VTPK", 9.0);
        assert!(adapter().normalize(&raw).is_err());
    }
}
