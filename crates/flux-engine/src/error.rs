//! Error types for flux computation and aggregation.

use thiserror::Error;
use wave_common::{AggregationWindow, CanonicalField};

/// Errors raised while deriving flux records or statistics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FluxError {
    /// A formula input is absent.
    #[error("insufficient data: {0} is missing")]
    InsufficientData(CanonicalField),

    /// A formula input is negative or not finite.
    #[error("invalid {field}: {value}")]
    InvalidInput { field: CanonicalField, value: f64 },

    /// The observation has no grid cell yet.
    #[error("observation has not been assigned a grid cell")]
    NotGridded,

    /// The observation has not been through quality control.
    #[error("observation has not been quality checked")]
    Unassessed,

    /// Rejected observations never produce flux.
    #[error("observation was rejected by quality control")]
    Rejected,

    /// Engine constants are unusable.
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// Statistics cannot be re-aggregated into a finer or misaligned window.
    #[error("cannot re-aggregate bucket {bucket} into {to} windows")]
    IncompatibleWindow {
        bucket: String,
        to: AggregationWindow,
    },
}

impl FluxError {
    /// Per-record errors are skipped and counted by the caller.
    pub fn is_per_record(&self) -> bool {
        matches!(
            self,
            FluxError::InsufficientData(_)
                | FluxError::InvalidInput { .. }
                | FluxError::NotGridded
                | FluxError::Unassessed
                | FluxError::Rejected
        )
    }
}

/// Result type for flux engine operations.
pub type Result<T> = std::result::Result<T, FluxError>;
