//! Prometheus metrics for pipeline runs.
//!
//! Counters are labelled by source. Without an installed recorder the
//! macros are no-ops, so library callers and tests need no setup.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use wave_common::SourceId;

use crate::sources::SourceCounts;

/// Install the global Prometheus recorder.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))
}

/// Publish one source's record counts.
pub fn record_source(source_id: &SourceId, counts: &SourceCounts) {
    let source = source_id.to_string();
    counter!("wave_records_ingested_total", "source" => source.clone()).increment(counts.ingested);
    counter!("wave_records_malformed_total", "source" => source.clone())
        .increment(counts.malformed);
    counter!("wave_records_out_of_region_total", "source" => source.clone())
        .increment(counts.out_of_region);
    counter!("wave_records_rejected_total", "source" => source.clone())
        .increment(counts.rejected);
    counter!("wave_records_suspect_total", "source" => source.clone())
        .increment(counts.quality.suspect);
    counter!("wave_flux_records_total", "source" => source).increment(counts.flux_records);
}

/// Record that a source failed or was cancelled.
pub fn record_source_failure(source_id: &SourceId, reason: &'static str) {
    counter!(
        "wave_source_failures_total",
        "source" => source_id.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_fused_rows(rows: usize) {
    gauge!("wave_fused_rows").set(rows as f64);
}
