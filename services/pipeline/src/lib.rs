//! Wave power flux fusion pipeline.
//!
//! Reads buoy, reanalysis and satellite inputs, derives per-observation
//! wave power flux inside a configured region, aggregates it per grid cell
//! and time window, and fuses the per-source statistics by source
//! precedence.
//!
//! ```text
//! config ──> Orchestrator ──┬─> SourceJob (per source, blocking pool)
//!                           │     read -> adapt -> filter -> QC -> flux -> aggregate
//!                           └─> merge_sources ──> FusedDataset + RunSummary ──> writer
//! ```

pub mod config;
pub mod config_loader;
pub mod error;
pub mod merge;
pub mod metrics;
pub mod orchestrator;
pub mod sources;
pub mod summary;
pub mod writer;

pub use config::{
    AnalysisConfig, LoggingConfig, OutputConfig, OutputFormat, PipelineConfig, PositionConfig,
    RegionConfig, SourceConfig,
};
pub use config_loader::{load_config, parse_config};
pub use error::{PipelineError, Result};
pub use merge::merge_sources;
pub use orchestrator::{Orchestrator, PipelineRun};
pub use sources::{SourceCounts, SourceJob, SourceOutput};
pub use summary::{RunSummary, SourceStatus, SourceSummary};
pub use writer::{write_dataset, write_summary};
