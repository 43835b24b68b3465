//! Run summary: what each source contributed and what the fused dataset
//! says about the region's wave resource.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use flux_engine::{
    consistency_metrics, rank_sites, revenue_potential, seasonal_ratio, ConsistencyMetrics,
    RevenuePotential, SiteRanking,
};
use serde::Serialize;
use uuid::Uuid;
use wave_common::{
    AggregationWindow, BoundingBox, FluxRecord, FusedDataset, SourceId, SourceKind,
};

use crate::config::PipelineConfig;
use crate::sources::SourceCounts;

/// How a source's pipeline ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SourceStatus {
    Completed,
    Failed { error: String },
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub source_id: SourceId,
    pub kind: SourceKind,
    pub status: SourceStatus,
    pub files: usize,
    pub counts: SourceCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DateCoverage {
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpatialCoverage {
    /// Cells with at least one window holding data.
    pub cells_with_data: usize,
    pub grid_cells: usize,
}

/// Power statistics over the flux records behind the fused dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerSummary {
    pub min: f64,
    pub max: f64,
    #[serde(flatten)]
    pub consistency: ConsistencyMetrics,
    pub seasonal_ratio: Option<f64>,
    pub revenue: RevenuePotential,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteSummary {
    #[serde(flatten)]
    pub ranking: SiteRanking,
    pub revenue: RevenuePotential,
    pub seasonal_ratio: Option<f64>,
}

/// Record of one pipeline run, written next to the fused output.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub region: String,
    pub bounds: BoundingBox,
    pub grid_resolution_degrees: f64,
    pub aggregation_window: AggregationWindow,
    pub cancelled: bool,
    pub sources: Vec<SourceSummary>,
    pub totals: SourceCounts,
    pub fused_rows: usize,
    pub gap_rows: usize,
    pub date_coverage: Option<DateCoverage>,
    pub spatial_coverage: SpatialCoverage,
    pub power: Option<PowerSummary>,
    pub top_sites: Vec<SiteSummary>,
    pub warnings: Vec<String>,
}

impl RunSummary {
    /// Assemble the summary once every source has finished.
    ///
    /// `flux` holds the records of the selected source for each fused row.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        config: &PipelineConfig,
        grid_cells: usize,
        sources: Vec<SourceSummary>,
        fused: &FusedDataset,
        flux: &[FluxRecord],
        cancelled: bool,
    ) -> Self {
        let mut totals = SourceCounts::default();
        let mut warnings = Vec::new();
        for source in &sources {
            totals.merge(&source.counts);
            match &source.status {
                SourceStatus::Completed if source.counts.usable() == 0 => warnings.push(format!(
                    "source {} produced no usable records ({} ingested, {} rejected of which {} malformed)",
                    source.source_id,
                    source.counts.ingested,
                    source.counts.rejected,
                    source.counts.malformed
                )),
                SourceStatus::Completed => {}
                SourceStatus::Failed { error } => {
                    warnings.push(format!("source {} failed: {}", source.source_id, error))
                }
                SourceStatus::Cancelled => {
                    warnings.push(format!("source {} was cancelled", source.source_id))
                }
            }
        }
        if cancelled {
            warnings.push("run was cancelled; results are partial".to_string());
        }

        let data_buckets: Vec<_> = fused.stats().filter(|s| s.has_data()).collect();
        let date_coverage = data_buckets
            .iter()
            .map(|s| (s.bucket.start, s.bucket.end))
            .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)))
            .map(|(first, last)| DateCoverage { first, last });
        let cells_with_data = data_buckets.iter().map(|s| s.cell).collect::<BTreeSet<_>>().len();

        let analysis = &config.analysis;
        let power = power_summary(flux, analysis.threshold_percentile, analysis.energy_price_per_mwh);
        let top_sites = rank_sites(fused, analysis.top_sites)
            .into_iter()
            .map(|ranking| {
                let site_flux: Vec<FluxRecord> =
                    flux.iter().filter(|r| r.cell == ranking.cell).cloned().collect();
                SiteSummary {
                    revenue: revenue_potential(ranking.mean_power, analysis.energy_price_per_mwh),
                    seasonal_ratio: seasonal_ratio(&site_flux),
                    ranking,
                }
            })
            .collect();

        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            region: config.region.name.clone(),
            bounds: config.region.bounds(),
            grid_resolution_degrees: config.grid_resolution_degrees,
            aggregation_window: config.aggregation_window,
            cancelled,
            sources,
            totals,
            fused_rows: fused.len(),
            gap_rows: fused.stats().filter(|s| s.gap_filled).count(),
            date_coverage,
            spatial_coverage: SpatialCoverage {
                cells_with_data,
                grid_cells,
            },
            power,
            top_sites,
            warnings,
        }
    }
}

fn power_summary(flux: &[FluxRecord], threshold_percentile: f64, price: f64) -> Option<PowerSummary> {
    let values: Vec<f64> = flux.iter().map(|r| r.power).collect();
    let consistency = consistency_metrics(&values, threshold_percentile)?;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(PowerSummary {
        min,
        max,
        seasonal_ratio: seasonal_ratio(flux),
        revenue: revenue_potential(consistency.mean, price),
        consistency,
    })
}
