//! Wave power flux computation, temporal aggregation and resource analysis.
//!
//! ```text
//! CanonicalObservation ──► FluxEngine ──► FluxRecord
//!                                             │
//!                                             ▼
//!                                    TemporalAggregator ──► AggregatedStat
//!                                             │
//!                                             ▼
//!                                         analysis
//! ```
//!
//! Everything here is pure computation over in-memory values; the
//! orchestrating service owns I/O and concurrency.

pub mod aggregate;
pub mod analysis;
pub mod error;
pub mod flux;
pub mod stats;

pub use aggregate::TemporalAggregator;
pub use analysis::{
    consistency_metrics, rank_sites, revenue_potential, seasonal_ratio, ConsistencyMetrics,
    RevenuePotential, SiteRanking, DEFAULT_ENERGY_PRICE, DEFAULT_THRESHOLD_PERCENTILE,
    DEFAULT_TOP_SITES, HOURS_PER_YEAR,
};
pub use error::{FluxError, Result};
pub use flux::{compute_flux, power_flux, FluxEngine, DEFAULT_SEAWATER_DENSITY, STANDARD_GRAVITY};
pub use stats::{percentile, Summary, WelfordState};
