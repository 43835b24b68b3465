//! Temporal aggregation of flux records into per-cell window statistics.
//!
//! Records are grouped by (grid cell, window). Within a group, records
//! sharing a timestamp are first averaged into one timestep value, so
//! `count` is the number of distinct timesteps. Timestep values are then
//! sorted before the Welford reduction, which makes the output independent
//! of input order.
//!
//! Windows without data are emitted as explicit gap rows; nothing is
//! imputed.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use tracing::debug;
use wave_common::{
    AggregatedStat, AggregationWindow, FluxRecord, GridCell, GridSpec, QualityLevel, SourceId,
    StatKey, TimeBucket,
};

use crate::error::{FluxError, Result};
use crate::stats::{sorted_mean, Summary, WelfordState};

/// Groups flux records into fixed windows.
#[derive(Debug, Clone)]
pub struct TemporalAggregator {
    window: AggregationWindow,
    grid: Option<GridSpec>,
    span: Option<(DateTime<Utc>, DateTime<Utc>)>,
    cadence: Option<Duration>,
}

struct Group<'a> {
    bucket: TimeBucket,
    timesteps: BTreeMap<DateTime<Utc>, Vec<f64>>,
    record_count: u64,
    suspect_count: u64,
    sources: BTreeSet<&'a SourceId>,
}

impl TemporalAggregator {
    pub fn new(window: AggregationWindow) -> Self {
        Self {
            window,
            grid: None,
            span: None,
            cadence: None,
        }
    }

    /// Emit gap rows for every cell of this grid instead of only the cells
    /// that received data.
    pub fn with_grid(mut self, grid: GridSpec) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Emit gap rows for every window between these instants instead of
    /// only the span covered by the input.
    pub fn with_span(mut self, first: DateTime<Utc>, last: DateTime<Utc>) -> Self {
        self.span = Some((first.min(last), first.max(last)));
        self
    }

    /// Expected interval between timesteps, used for `gap_fraction`.
    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.cadence = (cadence > Duration::zero()).then_some(cadence);
        self
    }

    pub fn window(&self) -> AggregationWindow {
        self.window
    }

    /// Aggregate flux records. Output is ordered by cell, then window.
    pub fn aggregate(&self, records: &[FluxRecord]) -> Vec<AggregatedStat> {
        let mut groups: BTreeMap<StatKey, Group<'_>> = BTreeMap::new();
        let mut sources = BTreeSet::new();
        let mut cells = BTreeSet::new();
        let mut extent: Option<(DateTime<Utc>, DateTime<Utc>)> = None;

        for record in records {
            let bucket = self.window.bucket(record.timestamp);
            let key = StatKey {
                cell: record.cell,
                window_start: bucket.start,
            };
            let group = groups.entry(key).or_insert_with(|| Group {
                bucket,
                timesteps: BTreeMap::new(),
                record_count: 0,
                suspect_count: 0,
                sources: BTreeSet::new(),
            });

            group
                .timesteps
                .entry(record.timestamp)
                .or_default()
                .push(record.power);
            group.record_count += 1;
            if record.quality == QualityLevel::Suspect {
                group.suspect_count += 1;
            }
            group.sources.insert(&record.source_id);

            sources.insert(&record.source_id);
            cells.insert(record.cell);
            extent = Some(match extent {
                None => (record.timestamp, record.timestamp),
                Some((first, last)) => (first.min(record.timestamp), last.max(record.timestamp)),
            });
        }

        let occupied: BTreeSet<StatKey> = groups.keys().copied().collect();
        let mut stats: Vec<AggregatedStat> = groups
            .into_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(key, group)| self.summarize(key.cell, group))
            .collect();
        let data_rows = stats.len();

        if let Some((first, last)) = self.span.or(extent) {
            let sources: Vec<SourceId> = sources.into_iter().cloned().collect();
            let gap_cells: Vec<GridCell> = match &self.grid {
                Some(grid) => grid.cells().collect(),
                None => cells.into_iter().collect(),
            };
            for bucket in self.window.buckets_between(first, last) {
                for cell in &gap_cells {
                    let key = StatKey {
                        cell: *cell,
                        window_start: bucket.start,
                    };
                    if !occupied.contains(&key) {
                        stats.push(AggregatedStat::gap(*cell, bucket, sources.clone()));
                    }
                }
            }
        }

        stats.sort_by_key(AggregatedStat::key);
        debug!(
            window = %self.window,
            records = records.len(),
            data_rows,
            gap_rows = stats.len() - data_rows,
            "Aggregated flux records"
        );
        stats
    }

    fn summarize(&self, cell: GridCell, group: Group<'_>) -> AggregatedStat {
        let mut values: Vec<f64> = group
            .timesteps
            .into_values()
            .filter_map(|mut v| sorted_mean(&mut v))
            .collect();
        let summary = Summary::of_sorted(&mut values);
        let sources = group.sources.into_iter().cloned().collect();
        self.finish(
            cell,
            group.bucket,
            summary,
            group.record_count,
            group.suspect_count,
            sources,
            None,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        cell: GridCell,
        bucket: TimeBucket,
        summary: Summary,
        record_count: u64,
        suspect_count: u64,
        sources: Vec<SourceId>,
        carried_gap_fraction: Option<f64>,
    ) -> AggregatedStat {
        let count = summary.count();
        let has_data = count > 0;
        let gap_fraction = match (self.cadence, carried_gap_fraction) {
            (None, Some(fraction)) => fraction,
            _ => self.gap_fraction(&bucket, count),
        };

        AggregatedStat {
            cell,
            bucket,
            mean: has_data.then_some(summary.welford.mean),
            min: has_data.then_some(summary.min),
            max: has_data.then_some(summary.max),
            stddev: has_data.then(|| summary.welford.stddev_population()),
            count,
            record_count,
            suspect_count,
            gap_filled: !has_data,
            gap_fraction,
            sources,
        }
    }

    /// Fraction of expected timesteps missing from a bucket.
    ///
    /// Without a cadence only "no data" (1) and "some data" (0) can be told apart.
    fn gap_fraction(&self, bucket: &TimeBucket, count: u64) -> f64 {
        match self.cadence {
            Some(cadence) => {
                let step = cadence.num_seconds().max(1);
                let expected = (bucket.duration().num_seconds() / step).max(1);
                (1.0 - count as f64 / expected as f64).clamp(0.0, 1.0)
            }
            None if count == 0 => 1.0,
            None => 0.0,
        }
    }

    /// Combine existing statistics into this aggregator's window.
    ///
    /// Every input bucket must lie within one target window, so the target
    /// must be the same window or a coarser one. With the same window the
    /// counts and means are reproduced exactly.
    pub fn reaggregate(&self, stats: &[AggregatedStat]) -> Result<Vec<AggregatedStat>> {
        let mut groups: BTreeMap<StatKey, (TimeBucket, Vec<&AggregatedStat>)> = BTreeMap::new();

        for stat in stats {
            let target = self.window.bucket(stat.bucket.start);
            if !target.encloses(&stat.bucket) {
                return Err(FluxError::IncompatibleWindow {
                    bucket: format!("[{}, {})", stat.bucket.start, stat.bucket.end),
                    to: self.window,
                });
            }
            let key = StatKey {
                cell: stat.cell,
                window_start: target.start,
            };
            groups
                .entry(key)
                .or_insert_with(|| (target, Vec::new()))
                .1
                .push(stat);
        }

        Ok(groups
            .into_iter()
            .map(|(key, (bucket, mut parts))| {
                // canonical merge order
                parts.sort_by(|a, b| {
                    a.mean
                        .unwrap_or(f64::NEG_INFINITY)
                        .total_cmp(&b.mean.unwrap_or(f64::NEG_INFINITY))
                        .then(a.count.cmp(&b.count))
                        .then(a.bucket.start.cmp(&b.bucket.start))
                });

                let mut summary = Summary::default();
                let mut record_count = 0;
                let mut suspect_count = 0;
                let mut sources = BTreeSet::new();
                let mut weighted_gap = 0.0;
                let mut total_seconds = 0.0;

                for part in &parts {
                    if let (Some(mean), Some(min), Some(max)) = (part.mean, part.min, part.max) {
                        summary.merge(&Summary {
                            welford: WelfordState::from_summary(
                                part.count,
                                mean,
                                part.stddev.unwrap_or(0.0),
                            ),
                            min,
                            max,
                        });
                    }
                    record_count += part.record_count;
                    suspect_count += part.suspect_count;
                    sources.extend(part.sources.iter().cloned());

                    let seconds = part.bucket.duration().num_seconds() as f64;
                    weighted_gap += part.gap_fraction * seconds;
                    total_seconds += seconds;
                }

                let carried = (total_seconds > 0.0).then(|| weighted_gap / total_seconds);
                self.finish(
                    key.cell,
                    bucket,
                    summary,
                    record_count,
                    suspect_count,
                    sources.into_iter().collect(),
                    carried,
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, cell, flux_record, flux_series, fixtures::ts};

    fn cell_a() -> GridCell {
        cell(0, 0, 46.0, -130.0)
    }

    fn cell_b() -> GridCell {
        cell(0, 1, 46.0, -129.8)
    }

    #[test]
    fn test_monthly_stats() {
        let records = flux_series("s", cell_a(), ts(2020, 1, 1, 0), 24, 4, |i| [10.0, 20.0, 30.0, 40.0][i]);
        let stats = TemporalAggregator::new(AggregationWindow::Month).aggregate(&records);

        assert_eq!(stats.len(), 1);
        let stat = &stats[0];
        assert_eq!(stat.count, 4);
        assert_eq!(stat.record_count, 4);
        assert_eq!(stat.mean, Some(25.0));
        assert_eq!(stat.min, Some(10.0));
        assert_eq!(stat.max, Some(40.0));
        assert_approx_eq!(stat.stddev.unwrap(), 125.0f64.sqrt(), 1e-12);
        assert!(!stat.gap_filled);
        assert_eq!(stat.gap_fraction, 0.0);
        assert_eq!(stat.sources, vec![SourceId::new("s")]);
    }

    #[test]
    fn test_same_timestamp_is_averaged_first() {
        let t = ts(2020, 1, 1, 0);
        let records = vec![
            flux_record("s", cell_a(), t, 10.0),
            flux_record("s", cell_a(), t, 30.0),
            flux_record("s", cell_a(), ts(2020, 1, 2, 0), 40.0),
        ];
        let stat = &TemporalAggregator::new(AggregationWindow::Month).aggregate(&records)[0];
        assert_eq!(stat.count, 2);
        assert_eq!(stat.record_count, 3);
        assert_eq!(stat.mean, Some(30.0));
        assert_eq!(stat.min, Some(20.0));
    }

    #[test]
    fn test_gap_rows_for_missing_windows() {
        let records = vec![
            flux_record("s", cell_a(), ts(2020, 1, 15, 0), 10.0),
            flux_record("s", cell_b(), ts(2020, 3, 15, 0), 10.0),
        ];
        let stats = TemporalAggregator::new(AggregationWindow::Month).aggregate(&records);

        // 2 cells x 3 months
        assert_eq!(stats.len(), 6);
        let gaps: Vec<_> = stats.iter().filter(|s| s.gap_filled).collect();
        assert_eq!(gaps.len(), 4);
        assert!(gaps.iter().all(|s| s.count == 0 && s.mean.is_none() && s.gap_fraction == 1.0));
        assert_eq!(stats[0].cell, cell_a());
        assert_eq!(stats[1].bucket.start, ts(2020, 2, 1, 0));
    }

    #[test]
    fn test_grid_and_span_cover_empty_input() {
        let grid = GridSpec::new(wave_common::BoundingBox::new(0.0, 1.0, 0.0, 1.0), 0.5).unwrap();
        let stats = TemporalAggregator::new(AggregationWindow::Day)
            .with_grid(grid)
            .with_span(ts(2020, 1, 1, 0), ts(2020, 1, 2, 12))
            .aggregate(&[]);
        assert_eq!(stats.len(), 9 * 2);
        assert!(stats.iter().all(|s| s.gap_filled));
    }

    #[test]
    fn test_cadence_gap_fraction() {
        let records = flux_series("s", cell_a(), ts(2020, 1, 1, 0), 3, 4, |_| 1.0);
        let stat = &TemporalAggregator::new(AggregationWindow::Day)
            .with_cadence(Duration::hours(3))
            .aggregate(&records)[0];
        assert_eq!(stat.count, 4);
        assert_approx_eq!(stat.gap_fraction, 0.5, 1e-12);
    }

    #[test]
    fn test_suspect_count() {
        let mut record = flux_record("s", cell_a(), ts(2020, 1, 1, 0), 5.0);
        record.quality = QualityLevel::Suspect;
        let stat = &TemporalAggregator::new(AggregationWindow::Day).aggregate(&[record])[0];
        assert_eq!(stat.suspect_count, 1);
    }

    #[test]
    fn test_reaggregate_days_into_month() {
        let records = flux_series("s", cell_a(), ts(2020, 1, 1, 0), 6, 40, |i| (i % 7) as f64 * 100.0);
        let daily = TemporalAggregator::new(AggregationWindow::Day).aggregate(&records);
        let direct = TemporalAggregator::new(AggregationWindow::Month).aggregate(&records);
        let rolled = TemporalAggregator::new(AggregationWindow::Month)
            .reaggregate(&daily)
            .unwrap();

        assert_eq!(rolled.len(), direct.len());
        assert_eq!(rolled[0].count, direct[0].count);
        assert_approx_eq!(rolled[0].mean.unwrap(), direct[0].mean.unwrap(), 1e-9);
        assert_approx_eq!(rolled[0].stddev.unwrap(), direct[0].stddev.unwrap(), 1e-6);
        assert_eq!(rolled[0].min, direct[0].min);
        assert_eq!(rolled[0].max, direct[0].max);
    }

    #[test]
    fn test_reaggregate_into_finer_window_fails() {
        let records = vec![flux_record("s", cell_a(), ts(2020, 1, 1, 0), 1.0)];
        let monthly = TemporalAggregator::new(AggregationWindow::Month).aggregate(&records);
        let err = TemporalAggregator::new(AggregationWindow::Day)
            .reaggregate(&monthly)
            .unwrap_err();
        assert!(matches!(err, FluxError::IncompatibleWindow { .. }));
    }
}
