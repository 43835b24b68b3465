//! Wave data ingestion library.
//!
//! Turns heterogeneous upstream inputs into quality-flagged canonical
//! observations:
//!
//! - Schema registry: expected variables, units and plausible ranges per source
//! - Raw record readers for JSON lines, CSV and NDBC text (optionally gzipped)
//! - Source adapters (buoy, reanalysis, satellite) with declared unit conversions
//! - Quality control with explicit, caller-owned duplicate history

pub mod adapters;
pub mod error;
pub mod quality;
pub mod reader;
pub mod schema;
pub mod units;

// Re-exports
pub use adapters::{
    create_adapter, AdapterSettings, BuoyAdapter, Normalized, ReanalysisAdapter,
    SatelliteAdapter, SourceAdapter, DEFAULT_SEAWATER_DENSITY,
};
pub use error::{IngestionError, Result};
pub use quality::{DuplicateHistory, QualityController, QualityReport, DEFAULT_DUPLICATE_LOOKBACK};
pub use reader::{
    detect_input_format, discover_inputs, open_path, Compression, InputFormat, InputKind,
    RawRecordReader, ReaderOptions,
};
pub use schema::{Schema, SchemaRegistry, SchemaRegistryBuilder, VariableSpec};
pub use units::{Conversion, Unit};
