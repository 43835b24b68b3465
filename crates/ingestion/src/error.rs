//! Error types for the ingestion crate.

use thiserror::Error;
use wave_common::WaveError;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read input: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Malformed record from {source_id}: {reason}")]
    MalformedRecord { source_id: String, reason: String },

    #[error("Unknown input format: {0}")]
    UnknownFileType(String),

    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error(transparent)]
    Wave(#[from] WaveError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl IngestionError {
    /// Create a MalformedRecord error.
    pub fn malformed(source_id: impl ToString, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            source_id: source_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Per-record errors are skipped and counted; everything else aborts
    /// the operation that raised it.
    pub fn is_per_record(&self) -> bool {
        matches!(self, IngestionError::MalformedRecord { .. })
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
