//! Test data generators for creating synthetic wave data.
//!
//! These generators create predictable, verifiable observations and flux
//! records that can be used across the test suite.

use chrono::{DateTime, Duration, Utc};
use wave_common::{
    CanonicalObservation, FluxInputs, FluxRecord, GridCell, Provenance, QualityLevel, RawRecord,
    SourceId,
};

/// Creates an ungridded, unflagged observation with the default density.
pub fn observation(
    source: &str,
    timestamp: DateTime<Utc>,
    lat: f64,
    lon: f64,
    height: Option<f64>,
    period: Option<f64>,
) -> CanonicalObservation {
    CanonicalObservation {
        timestamp,
        latitude: lat,
        longitude: lon,
        significant_wave_height: height,
        wave_period: period,
        wind_speed: None,
        wind_direction: None,
        sea_level_pressure: None,
        density: 1025.0,
        density_defaulted: true,
        provenance: Provenance {
            source_id: SourceId::new(source),
            adapter_version: "test/0".to_string(),
        },
        cell: None,
        quality: None,
    }
}

/// A grid cell with its center at the given coordinate.
pub fn cell(row: u32, col: u32, lat: f64, lon: f64) -> GridCell {
    GridCell {
        row,
        col,
        latitude: lat,
        longitude: lon,
    }
}

/// Creates an accepted flux record with placeholder formula inputs.
pub fn flux_record(source: &str, cell: GridCell, timestamp: DateTime<Utc>, power: f64) -> FluxRecord {
    FluxRecord {
        timestamp,
        cell,
        source_id: SourceId::new(source),
        quality: QualityLevel::Accepted,
        power,
        inputs: FluxInputs {
            wave_height: 0.0,
            wave_period: 0.0,
            density: 1025.0,
            gravity: 9.80665,
        },
    }
}

/// Creates `count` flux records for one cell, `step_hours` apart, with
/// power given by `power(i)`.
pub fn flux_series(
    source: &str,
    cell: GridCell,
    start: DateTime<Utc>,
    step_hours: i64,
    count: usize,
    power: impl Fn(usize) -> f64,
) -> Vec<FluxRecord> {
    (0..count)
        .map(|i| {
            let timestamp = start + Duration::hours(step_hours * i as i64);
            flux_record(source, cell, timestamp, power(i))
        })
        .collect()
}

/// Creates a raw buoy record in NDBC variable names.
pub fn buoy_raw_record(
    source: &str,
    timestamp: &str,
    lat: f64,
    lon: f64,
    height: &str,
    period: &str,
) -> RawRecord {
    RawRecord::new(SourceId::new(source), timestamp)
        .with_position(lat, lon)
        .with_value("WVHT", height)
        .with_value("DPD", period)
}

/// Deterministically shuffles a slice (Fisher-Yates driven by a small LCG).
///
/// The same seed always yields the same order.
pub fn permute<T: Clone>(items: &[T], seed: u64) -> Vec<T> {
    let mut out = items.to_vec();
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    for i in (1..out.len()).rev() {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let j = (state >> 33) as usize % (i + 1);
        out.swap(i, j);
    }
    out
}
