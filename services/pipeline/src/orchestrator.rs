//! Pipeline orchestration.
//!
//! Each configured source runs through its own [`SourceJob`] on the
//! blocking pool, at most `max_parallel_sources` at a time. Results are
//! collected in configuration order and merged on the calling task, so the
//! fused output does not depend on which source finishes first.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use flux_engine::{FluxEngine, STANDARD_GRAVITY};
use futures::future::join_all;
use grid_processor::SpatialFilter;
use ingestion::{Schema, SchemaRegistry};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use wave_common::{AggregatedStat, FluxRecord, FusedDataset, SourceId, StatKey};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::merge::merge_sources;
use crate::metrics;
use crate::sources::{SourceCounts, SourceJob, SourceOutput};
use crate::summary::{RunSummary, SourceStatus, SourceSummary};

/// Result of one run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub dataset: FusedDataset,
    pub summary: RunSummary,
}

/// Validated pipeline, ready to run.
pub struct Orchestrator {
    config: Arc<PipelineConfig>,
    registry: SchemaRegistry,
    filter: SpatialFilter,
    engine: FluxEngine,
}

impl Orchestrator {
    /// Validate the configuration and build the shared read-only state.
    ///
    /// Every configuration error surfaces here, before any input is read.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let filter = SpatialFilter::new(config.region.bounds(), config.grid_resolution_degrees)?;
        let engine = FluxEngine::new(STANDARD_GRAVITY, config.seawater_density_default)?;

        let mut builder = SchemaRegistry::builder();
        for source in &config.sources {
            builder = match &source.schema {
                Some(path) => {
                    let schema = Schema::load_file(source.id.clone(), path)?;
                    if schema.kind != source.kind {
                        return Err(PipelineError::config(format!(
                            "schema {} declares kind {} but source {} is {}",
                            path.display(),
                            schema.kind,
                            source.id,
                            source.kind
                        )));
                    }
                    builder.register(schema)?
                }
                None => builder.register_builtin(source.id.clone(), source.kind)?,
            };
        }

        info!(
            region = %config.region.name,
            rows = filter.grid().rows,
            cols = filter.grid().cols,
            window = %config.aggregation_window,
            sources = config.sources.len(),
            "Pipeline configured"
        );

        Ok(Self {
            config: Arc::new(config),
            registry: builder.build(),
            filter,
            engine,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn filter(&self) -> &SpatialFilter {
        &self.filter
    }

    /// Run every source and fuse the results.
    ///
    /// Failed and cancelled sources are reported in the summary; the run
    /// itself only fails on errors outside any single source.
    #[instrument(skip_all, fields(region = %self.config.region.name))]
    pub async fn run(&self, cancel: CancellationToken) -> Result<PipelineRun> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, "Starting pipeline run");

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_sources));
        let mut handles = Vec::with_capacity(self.config.sources.len());

        for source in &self.config.sources {
            let schema = self.registry.get_schema(&source.id)?;
            let job = SourceJob::new(source, schema, &self.config, self.filter, self.engine);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let source_id = source.id.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|e| PipelineError::Task {
                    source_id: source_id.clone(),
                    reason: e.to_string(),
                })?;
                if cancel.is_cancelled() {
                    return Err(PipelineError::Cancelled);
                }
                tokio::task::spawn_blocking(move || job.run(&cancel))
                    .await
                    .map_err(|e| PipelineError::Task {
                        source_id,
                        reason: e.to_string(),
                    })?
            }));
        }

        let results = join_all(handles).await;

        let mut summaries = Vec::with_capacity(results.len());
        let mut outputs: Vec<SourceOutput> = Vec::new();
        for (source, joined) in self.config.sources.iter().zip(results) {
            let result = joined.map_err(|e| PipelineError::Task {
                source_id: source.id.clone(),
                reason: e.to_string(),
            });
            let (status, files, counts) = match result.and_then(|r| r) {
                Ok(output) => {
                    metrics::record_source(&output.source_id, &output.counts);
                    if output.counts.usable() == 0 {
                        warn!(source = %source.id, "Source produced no usable records");
                    }
                    let summary = (SourceStatus::Completed, output.files, output.counts.clone());
                    outputs.push(output);
                    summary
                }
                Err(PipelineError::Cancelled) => {
                    warn!(source = %source.id, "Source cancelled; partial results discarded");
                    metrics::record_source_failure(&source.id, "cancelled");
                    (SourceStatus::Cancelled, 0, SourceCounts::default())
                }
                Err(e) => {
                    error!(source = %source.id, error = %e, "Source failed");
                    metrics::record_source_failure(&source.id, "failed");
                    (
                        SourceStatus::Failed {
                            error: e.to_string(),
                        },
                        0,
                        SourceCounts::default(),
                    )
                }
            };
            summaries.push(SourceSummary {
                source_id: source.id.clone(),
                kind: source.kind,
                status,
                files,
                counts,
            });
        }

        let contributions: Vec<(SourceId, Vec<AggregatedStat>)> = outputs
            .iter_mut()
            .map(|o| (o.source_id.clone(), std::mem::take(&mut o.stats)))
            .collect();
        let dataset = merge_sources(&contributions, &self.config.precedence_ranks());
        metrics::record_fused_rows(dataset.len());

        let fused_flux = self.selected_flux(&dataset, &outputs);
        let cancelled = cancel.is_cancelled();
        let summary = RunSummary::build(
            run_id,
            started_at,
            &self.config,
            self.filter.grid().len(),
            summaries,
            &dataset,
            &fused_flux,
            cancelled,
        );

        for warning in &summary.warnings {
            warn!("{}", warning);
        }
        info!(
            %run_id,
            fused_rows = summary.fused_rows,
            gap_rows = summary.gap_rows,
            cancelled,
            "Pipeline run complete"
        );

        Ok(PipelineRun { dataset, summary })
    }

    /// Flux records of the source selected for each fused row.
    fn selected_flux(&self, dataset: &FusedDataset, outputs: &[SourceOutput]) -> Vec<FluxRecord> {
        let window = self.config.aggregation_window;
        let selected: BTreeSet<(StatKey, &SourceId)> = dataset
            .iter()
            .filter(|row| row.stat.has_data())
            .map(|row| (row.key(), &row.selected_source))
            .collect();

        outputs
            .iter()
            .flat_map(|o| o.flux.iter())
            .filter(|r| {
                let key = StatKey {
                    cell: r.cell,
                    window_start: window.bucket(r.timestamp).start,
                };
                selected.contains(&(key, &r.source_id))
            })
            .cloned()
            .collect()
    }
}
