//! Wave power flux.
//!
//! Deep-water energy flux per metre of wave crest:
//!
//! ```text
//! P = ρ g² H² T / (64 π)      [W/m]
//! ```
//!
//! with ρ seawater density (kg/m³), g gravity (m/s²), H significant wave
//! height (m) and T wave period (s).

use std::f64::consts::PI;

use wave_common::{
    CanonicalField, CanonicalObservation, FluxInputs, FluxRecord, QualityLevel,
};

use crate::error::{FluxError, Result};

/// Standard gravity (m/s²).
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Reference seawater density (kg/m³).
pub const DEFAULT_SEAWATER_DENSITY: f64 = 1025.0;

/// The bare formula, without validation.
#[inline]
pub fn power_flux(wave_height: f64, wave_period: f64, density: f64, gravity: f64) -> f64 {
    density * gravity * gravity / (64.0 * PI) * wave_height * wave_height * wave_period
}

/// Compute flux with standard gravity and reference density.
pub fn compute_flux(obs: &CanonicalObservation) -> Result<FluxRecord> {
    FluxEngine::default().compute(obs)
}

/// Flux calculator with configurable constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluxEngine {
    gravity: f64,
    default_density: f64,
}

impl Default for FluxEngine {
    fn default() -> Self {
        Self {
            gravity: STANDARD_GRAVITY,
            default_density: DEFAULT_SEAWATER_DENSITY,
        }
    }
}

impl FluxEngine {
    pub fn new(gravity: f64, default_density: f64) -> Result<Self> {
        if !(gravity.is_finite() && gravity > 0.0) {
            return Err(FluxError::InvalidConfig(format!("gravity must be positive, got {}", gravity)));
        }
        if !(default_density.is_finite() && default_density > 0.0) {
            return Err(FluxError::InvalidConfig(format!(
                "density must be positive, got {}",
                default_density
            )));
        }
        Ok(Self {
            gravity,
            default_density,
        })
    }

    pub fn gravity(&self) -> f64 {
        self.gravity
    }

    pub fn default_density(&self) -> f64 {
        self.default_density
    }

    /// Derive a flux record from a gridded, quality-checked observation.
    ///
    /// Suspect observations are usable and keep their level on the
    /// record; a density the source did not report is replaced by this
    /// engine's default.
    pub fn compute(&self, obs: &CanonicalObservation) -> Result<FluxRecord> {
        let quality = match obs.quality {
            None => return Err(FluxError::Unassessed),
            Some(flag) if flag.level == QualityLevel::Rejected => return Err(FluxError::Rejected),
            Some(flag) => flag.level,
        };
        let cell = obs.cell.ok_or(FluxError::NotGridded)?;

        let wave_height = required(obs, CanonicalField::SignificantWaveHeight)?;
        let wave_period = required(obs, CanonicalField::WavePeriod)?;
        let density = if obs.density_defaulted {
            self.default_density
        } else {
            obs.density
        };
        if !(density.is_finite() && density > 0.0) {
            return Err(FluxError::InvalidInput {
                field: CanonicalField::Density,
                value: density,
            });
        }

        Ok(FluxRecord {
            timestamp: obs.timestamp,
            cell,
            source_id: obs.source_id().clone(),
            quality,
            power: power_flux(wave_height, wave_period, density, self.gravity),
            inputs: FluxInputs {
                wave_height,
                wave_period,
                density,
                gravity: self.gravity,
            },
        })
    }
}

fn required(obs: &CanonicalObservation, field: CanonicalField) -> Result<f64> {
    let value = obs.field(field).ok_or(FluxError::InsufficientData(field))?;
    if !value.is_finite() || value < 0.0 {
        return Err(FluxError::InvalidInput { field, value });
    }
    Ok(value)
}
