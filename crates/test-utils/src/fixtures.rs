//! Common test fixtures for wave-flux tests.
//!
//! This module provides pre-defined test data that represents common
//! scenarios in wave data processing.

use chrono::{DateTime, TimeZone, Utc};
use wave_common::{BoundingBox, GridSpec};

/// Common region definitions for testing, as (min_lat, max_lat, min_lon, max_lon).
pub mod region {
    /// Pacific Northwest shelf, the default analysis region.
    pub const PNW: (f64, f64, f64, f64) = (46.0, 50.5, -130.0, -124.0);

    /// Small 1x1 degree box off the Oregon coast.
    pub const OREGON_SMALL: (f64, f64, f64, f64) = (44.0, 45.0, -125.0, -124.0);

    /// Crosses the antimeridian, which is rejected.
    pub const ALEUTIANS: (f64, f64, f64, f64) = (50.0, 55.0, 170.0, -170.0);

    /// Invalid region (min > max)
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 5.0, 5.0, 10.0);
}

/// Source identifiers used across tests.
pub mod sources {
    pub const BUOY: &str = "ndbc-46050";
    pub const REANALYSIS: &str = "cmems-global-wav";
    pub const SATELLITE: &str = "sentinel-3a";
}

/// Bounding box from a region tuple.
pub fn bounds(region: (f64, f64, f64, f64)) -> BoundingBox {
    let (min_lat, max_lat, min_lon, max_lon) = region;
    BoundingBox::new(min_lat, max_lat, min_lon, max_lon)
}

/// The Pacific Northwest region.
pub fn pnw_bounds() -> BoundingBox {
    bounds(region::PNW)
}

/// The Pacific Northwest grid at 0.2 degrees.
pub fn pnw_grid() -> GridSpec {
    GridSpec::new(pnw_bounds(), 0.2).expect("PNW grid is valid")
}

/// UTC timestamp at the top of an hour.
pub fn ts(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .expect("valid test timestamp")
}

/// NDBC standard meteorological text for station 46050 (three rows, the
/// last with missing wave data).
pub const NDBC_STDMET: &str = "\
#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS  TIDE
#yr  mo dy hr mn degT m/s  m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi    ft
2020 01 15 00 50 250  7.0  9.0   2.50 11.00  7.80 270 1012.3  10.1  11.2   MM   MM    MM
2020 01 15 01 50 255  7.5  9.5   2.70 12.00  8.10 275 1011.9  10.0  11.2   MM   MM    MM
2020 01 15 02 50 260  8.0 10.0     MM    MM    MM 999 1011.5   9.9  11.1   MM   MM    MM
";

/// Position of NDBC 46050 (Stonewall Bank).
pub const NDBC_46050_POSITION: (f64, f64) = (44.669, -124.546);

/// Reanalysis JSON lines on a 0..360 longitude grid.
pub const REANALYSIS_JSONL: &str = r#"{"timestamp":"2020-01-15T00:00:00Z","latitude":47.5,"longitude":233.0,"VHM0":3.0,"VTPK":10.0}
{"timestamp":"2020-01-15T03:00:00Z","latitude":47.5,"longitude":233.0,"VHM0":3.2,"VTPK":10.5}
{"timestamp":"2020-01-15T06:00:00Z","latitude":47.5,"longitude":233.0,"VHM0":3.1}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pnw_grid() {
        let grid = pnw_grid();
        assert_eq!(grid.rows, 23);
        assert_eq!(grid.cols, 31);
    }

    #[test]
    fn test_invalid_regions_fail_validation() {
        assert!(bounds(region::INVALID).validate().is_err());
        assert!(bounds(region::ALEUTIANS).validate().is_err());
    }
}
