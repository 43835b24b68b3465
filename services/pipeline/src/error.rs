//! Error types for pipeline runs.

use thiserror::Error;
use wave_common::SourceId;

/// Errors that stop a run or a single source.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration problem detected before any processing starts.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A precedence entry names a source that is not configured.
    #[error("Source precedence lists unknown source: {0}")]
    InvalidPrecedence(SourceId),

    /// The run or a source was cancelled before it finished.
    #[error("Run cancelled")]
    Cancelled,

    /// A blocking source task panicked or was aborted.
    #[error("Source task for {source_id} failed: {reason}")]
    Task { source_id: SourceId, reason: String },

    #[error(transparent)]
    Ingestion(#[from] ingestion::IngestionError),

    #[error(transparent)]
    Grid(#[from] grid_processor::GridProcessorError),

    #[error(transparent)]
    Flux(#[from] flux_engine::FluxError),

    #[error(transparent)]
    Wave(#[from] wave_common::WaveError),

    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
