//! Per-source processing.
//!
//! A [`SourceJob`] owns everything one source needs and runs synchronously
//! on a blocking thread: discover inputs, read raw records, normalize, grid,
//! quality-check, derive flux and aggregate. Per-record problems are
//! counted; anything else fails the source.

use std::sync::Arc;

use chrono::Duration;
use flux_engine::{FluxEngine, FluxError, TemporalAggregator};
use grid_processor::SpatialFilter;
use ingestion::{
    create_adapter, discover_inputs, open_path, AdapterSettings, DuplicateHistory,
    IngestionError, QualityController, QualityReport, RawRecordReader, ReaderOptions, Schema,
    SourceAdapter,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use wave_common::{AggregatedStat, FluxRecord, SourceId, SourceKind};

use crate::config::{PipelineConfig, SourceConfig};
use crate::error::{PipelineError, Result};

/// Observations processed between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Record counts for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceCounts {
    /// Raw records read, malformed ones included.
    pub ingested: u64,
    pub malformed: u64,
    pub out_of_region: u64,
    /// Records dropped as unusable: malformed, rejected by quality control
    /// or without a derivable flux. The parts are kept alongside.
    pub rejected: u64,
    pub quality: QualityReport,
    pub flux_records: u64,
    /// Usable observations the flux engine could not derive a value from.
    pub flux_errors: u64,
    pub aggregated_rows: u64,
}

impl SourceCounts {
    pub fn merge(&mut self, other: &SourceCounts) {
        self.ingested += other.ingested;
        self.malformed += other.malformed;
        self.out_of_region += other.out_of_region;
        self.rejected += other.rejected;
        self.quality.merge(&other.quality);
        self.flux_records += other.flux_records;
        self.flux_errors += other.flux_errors;
        self.aggregated_rows += other.aggregated_rows;
    }

    /// Observations that passed quality control as accepted or suspect.
    pub fn usable(&self) -> u64 {
        self.quality.usable()
    }

    fn tally_rejected(&mut self) {
        self.rejected = self.malformed + self.quality.rejected + self.flux_errors;
    }
}

/// Everything a finished source hands back to the orchestrator.
#[derive(Debug, Clone)]
pub struct SourceOutput {
    pub source_id: SourceId,
    pub files: usize,
    pub counts: SourceCounts,
    pub stats: Vec<AggregatedStat>,
    pub flux: Vec<FluxRecord>,
}

/// One source's pipeline, ready to run.
pub struct SourceJob {
    config: SourceConfig,
    adapter: Box<dyn SourceAdapter>,
    quality: QualityController,
    filter: SpatialFilter,
    engine: FluxEngine,
    aggregator: TemporalAggregator,
    duplicate_lookback: usize,
}

impl SourceJob {
    pub fn new(
        config: &SourceConfig,
        schema: Arc<Schema>,
        pipeline: &PipelineConfig,
        filter: SpatialFilter,
        engine: FluxEngine,
    ) -> Self {
        let settings = AdapterSettings {
            default_density: pipeline.seawater_density_default,
            unit_overrides: config.units.clone(),
        };

        let mut aggregator = TemporalAggregator::new(pipeline.aggregation_window);
        if let Some(minutes) = config.cadence_minutes {
            aggregator = aggregator.with_cadence(Duration::minutes(minutes as i64));
        }

        Self {
            config: config.clone(),
            adapter: create_adapter(Arc::clone(&schema), settings),
            quality: QualityController::new(schema),
            filter,
            engine,
            aggregator,
            duplicate_lookback: pipeline.duplicate_lookback,
        }
    }

    pub fn source_id(&self) -> &SourceId {
        &self.config.id
    }

    pub fn kind(&self) -> SourceKind {
        self.adapter.kind()
    }

    fn reader_options(&self) -> ReaderOptions {
        let mut options = ReaderOptions::new(self.config.id.clone());
        options.default_position = self.config.position.map(|p| (p.latitude, p.longitude));
        options.units = self.config.units.clone();
        options
    }

    /// Run the source to completion. Partial results are dropped when the
    /// token is cancelled.
    #[instrument(skip_all, fields(source = %self.config.id, kind = %self.adapter.kind()))]
    pub fn run(self, cancel: &CancellationToken) -> Result<SourceOutput> {
        let files = discover_inputs(&self.config.inputs)?;
        info!(files = files.len(), adapter = self.adapter.version(), "Processing source");

        let mut counts = SourceCounts::default();
        let mut history = DuplicateHistory::new(self.duplicate_lookback);
        let mut flux = Vec::new();

        for path in &files {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let reader = open_path(path, self.reader_options())?;
            self.process(reader, &mut history, &mut counts, &mut flux, cancel)?;
            debug!(path = %path.display(), ingested = counts.ingested, "Finished input");
        }

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let stats = self.aggregator.aggregate(&flux);
        counts.flux_records = flux.len() as u64;
        counts.aggregated_rows = stats.len() as u64;
        counts.tally_rejected();

        info!(
            ingested = counts.ingested,
            malformed = counts.malformed,
            out_of_region = counts.out_of_region,
            accepted = counts.quality.accepted,
            suspect = counts.quality.suspect,
            rejected = counts.rejected,
            flux_records = counts.flux_records,
            rows = counts.aggregated_rows,
            duplicate_evictions = history.evictions(),
            "Source complete"
        );

        Ok(SourceOutput {
            source_id: self.config.id.clone(),
            files: files.len(),
            counts,
            stats,
            flux,
        })
    }

    fn process(
        &self,
        reader: RawRecordReader,
        history: &mut DuplicateHistory,
        counts: &mut SourceCounts,
        flux: &mut Vec<FluxRecord>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let adapter = &*self.adapter;
        let mut ingested = 0u64;
        let mut malformed = 0u64;
        let mut failure: Option<IngestionError> = None;

        let observations = reader
            .filter_map(|item| {
                match item.and_then(|raw| adapter.normalize(&raw)) {
                    Ok(observations) => {
                        ingested += 1;
                        Some(observations)
                    }
                    Err(e) if e.is_per_record() => {
                        ingested += 1;
                        malformed += 1;
                        debug!(error = %e, "Skipping malformed record");
                        None
                    }
                    Err(e) => {
                        failure = Some(e);
                        None
                    }
                }
            })
            .flatten();

        let mut gridded = self.filter.filter_and_grid(observations);
        for (i, obs) in gridded.by_ref().enumerate() {
            if i % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let obs = self.quality.apply(obs, history);
            if let Some(flag) = &obs.quality {
                counts.quality.record(flag);
            }

            match self.engine.compute(&obs) {
                Ok(record) => flux.push(record),
                Err(FluxError::Rejected) => {}
                Err(e) if e.is_per_record() => {
                    counts.flux_errors += 1;
                    debug!(error = %e, timestamp = %obs.timestamp, "No flux for observation");
                }
                Err(e) => return Err(e.into()),
            }
        }
        let filter_stats = gridded.stats();
        drop(gridded);

        counts.ingested += ingested;
        counts.malformed += malformed;
        counts.out_of_region += filter_stats.out_of_region;

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
