//! Common types and utilities shared across the wave-power pipeline crates.

pub mod bbox;
pub mod error;
pub mod grid;
pub mod observation;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{WaveError, WaveResult};
pub use grid::{GridCell, GridSpec};
pub use observation::{
    AggregatedStat, CanonicalField, CanonicalObservation, FluxInputs, FluxRecord, FusedDataset,
    FusedRow, Provenance, QualityFlag, QualityLevel, RawRecord, ReasonCode, SourceId, SourceKind,
    StatKey,
};
pub use time::{parse_timestamp, AggregationWindow, Season, TimeBucket};
