//! Spatial filtering onto the common analysis grid.
//!
//! Restricts canonical observations to one bounded region of interest and
//! assigns each retained observation the nearest node of a regular
//! lat/lon grid.
//!
//! # Architecture
//!
//! ```text
//! CanonicalObservation stream
//!      │
//!      ▼
//! SpatialFilter::filter_and_grid
//!      │
//!      ├─► outside bounds: dropped, counted
//!      │
//!      └─► inside bounds: snapped to nearest node (ties: lower lat, then lower lon)
//!               │
//!               ▼
//!          observation with `cell` set
//! ```
//!
//! Several observations may land on the same cell and timestamp; they pass
//! through unchanged and are reconciled by the temporal aggregator.

pub mod error;
pub mod filter;

// Re-export commonly used types at crate root
pub use error::{GridProcessorError, Result};
pub use filter::{FilterStats, Gridded, SpatialFilter, MAX_GRID_CELLS};
