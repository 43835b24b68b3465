//! Error types for grid processing.

use thiserror::Error;
use wave_common::WaveError;

/// Errors that can occur while setting up the analysis grid.
///
/// Observations falling outside the region are not errors; they are
/// dropped and counted by the filter.
#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// The configured region is unusable.
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// The configured resolution is unusable.
    #[error("invalid resolution: {0}")]
    InvalidResolution(String),

    /// The region and resolution produce an unreasonably large grid.
    #[error("grid too large: {rows} x {cols} cells exceeds the limit of {limit}")]
    TooManyCells { rows: u32, cols: u32, limit: usize },
}

impl GridProcessorError {
    /// Create an InvalidRegion error.
    pub fn invalid_region(msg: impl Into<String>) -> Self {
        Self::InvalidRegion(msg.into())
    }

    /// Create an InvalidResolution error.
    pub fn invalid_resolution(msg: impl Into<String>) -> Self {
        Self::InvalidResolution(msg.into())
    }
}

impl From<WaveError> for GridProcessorError {
    fn from(err: WaveError) -> Self {
        match err {
            WaveError::InvalidResolution(msg) => Self::InvalidResolution(msg),
            other => Self::InvalidRegion(other.to_string()),
        }
    }
}

/// Result type for grid processor operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
