//! Error types for the wave-power pipeline.

use thiserror::Error;

/// Result type alias using WaveError.
pub type WaveResult<T> = Result<T, WaveError>;

/// Configuration and parsing errors shared by every crate in the workspace.
///
/// These are the fatal, configuration-level failures. Per-record problems
/// are modelled by the owning crate (malformed records, insufficient data)
/// and never surface as a `WaveError`.
#[derive(Debug, Error)]
pub enum WaveError {
    #[error("Invalid region bounds: {0}")]
    InvalidRegion(String),

    #[error("Invalid grid resolution: {0}")]
    InvalidResolution(String),

    #[error("Invalid aggregation window: {0}")]
    InvalidWindow(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Coordinate out of range: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Unknown source kind: {0}")]
    UnknownSourceKind(String),
}

impl WaveError {
    /// Whether this error is a configuration error that must abort a run.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            WaveError::InvalidRegion(_)
                | WaveError::InvalidResolution(_)
                | WaveError::InvalidWindow(_)
                | WaveError::UnknownSourceKind(_)
        )
    }
}
