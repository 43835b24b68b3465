//! Resource assessment over derived flux.
//!
//! These summarize a flux series or a fused dataset into the figures used to
//! compare candidate sites: variability, seasonality, energy yield and a
//! ranking of cells.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;
use wave_common::{FluxRecord, FusedDataset, GridCell, Season};

use crate::stats::{percentile, sorted_mean, WelfordState};

/// Hours in a non-leap year, assuming continuous operation.
pub const HOURS_PER_YEAR: f64 = 8760.0;

/// Reference energy price (currency units per MWh).
pub const DEFAULT_ENERGY_PRICE: f64 = 50.0;

/// Default percentile used for the consistency threshold.
pub const DEFAULT_THRESHOLD_PERCENTILE: f64 = 75.0;

/// Default number of sites kept by [`rank_sites`].
pub const DEFAULT_TOP_SITES: usize = 10;

const WATTS_TO_MEGAWATTS: f64 = 1e-6;

/// How steady a power series is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConsistencyMetrics {
    /// Population standard deviation (W/m).
    pub std: f64,
    /// `std / mean`; absent when the mean is not positive.
    pub coefficient_of_variation: Option<f64>,
    /// Power at the requested percentile.
    pub threshold: f64,
    /// Share of values strictly above `threshold`, in percent.
    pub percent_above_threshold: f64,
    pub mean: f64,
    pub median: f64,
}

/// Variability metrics of a power series. Non-finite values are ignored;
/// returns `None` when nothing is left.
pub fn consistency_metrics(values: &[f64], threshold_percentile: f64) -> Option<ConsistencyMetrics> {
    let mut clean: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if clean.is_empty() {
        return None;
    }
    clean.sort_by(f64::total_cmp);

    let mut welford = WelfordState::new();
    clean.iter().for_each(|v| welford.add(*v));

    let threshold = percentile(&clean, threshold_percentile)?;
    let median = percentile(&clean, 50.0)?;
    let above = clean.iter().filter(|v| **v > threshold).count();
    let std = welford.stddev_population();

    Some(ConsistencyMetrics {
        std,
        coefficient_of_variation: (welford.mean > 0.0).then(|| std / welford.mean),
        threshold,
        percent_above_threshold: above as f64 / clean.len() as f64 * 100.0,
        mean: welford.mean,
        median,
    })
}

/// Winter (Dec-Feb) to summer (Jun-Aug) mean power ratio.
///
/// Months follow the northern hemisphere calendar. Returns `None` when
/// either season has no records or the summer mean is not positive.
pub fn seasonal_ratio(records: &[FluxRecord]) -> Option<f64> {
    let mut winter = Vec::new();
    let mut summer = Vec::new();
    for record in records {
        match Season::from_month(record.timestamp.month()) {
            Season::Djf => winter.push(record.power),
            Season::Jja => summer.push(record.power),
            _ => {}
        }
    }

    let winter = sorted_mean(&mut winter)?;
    let summer = sorted_mean(&mut summer)?;
    (summer > 0.0).then(|| winter / summer)
}

/// Annual energy and revenue per metre of wave crest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RevenuePotential {
    pub annual_mwh_per_m: f64,
    pub revenue_per_m: f64,
}

pub fn revenue_potential(mean_power: f64, price_per_mwh: f64) -> RevenuePotential {
    let annual_mwh_per_m = mean_power * HOURS_PER_YEAR * WATTS_TO_MEGAWATTS;
    RevenuePotential {
        annual_mwh_per_m,
        revenue_per_m: annual_mwh_per_m * price_per_mwh,
    }
}

/// One entry of a site ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteRanking {
    /// 1-based position.
    pub rank: usize,
    pub cell: GridCell,
    /// Mean power over every window with data, weighted by timestep count.
    pub mean_power: f64,
    /// Timesteps behind `mean_power`.
    pub count: u64,
}

/// Rank cells by mean power, highest first. Ties keep grid order.
pub fn rank_sites(fused: &FusedDataset, top_n: usize) -> Vec<SiteRanking> {
    let mut per_cell: BTreeMap<GridCell, WelfordState> = BTreeMap::new();
    for stat in fused.stats() {
        if let Some(mean) = stat.mean {
            per_cell
                .entry(stat.cell)
                .or_default()
                .merge(&WelfordState::from_summary(stat.count, mean, 0.0));
        }
    }

    let mut sites: Vec<(GridCell, WelfordState)> = per_cell.into_iter().collect();
    sites.sort_by(|(a_cell, a), (b_cell, b)| b.mean.total_cmp(&a.mean).then(a_cell.cmp(b_cell)));

    sites
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, (cell, state))| SiteRanking {
            rank: i + 1,
            cell,
            mean_power: state.mean,
            count: state.count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, cell, flux_record, fixtures::ts};
    use wave_common::{AggregatedStat, FusedRow, SourceId, TimeBucket};

    #[test]
    fn test_consistency_metrics() {
        let m = consistency_metrics(&[1.0, 2.0, 3.0, 4.0, f64::NAN], 75.0).unwrap();
        assert_approx_eq!(m.mean, 2.5, 1e-12);
        assert_approx_eq!(m.median, 2.5, 1e-12);
        assert_approx_eq!(m.std, 1.25f64.sqrt(), 1e-12);
        assert_approx_eq!(m.threshold, 3.25, 1e-12);
        assert_approx_eq!(m.percent_above_threshold, 25.0, 1e-12);
        assert_approx_eq!(m.coefficient_of_variation.unwrap(), 1.25f64.sqrt() / 2.5, 1e-12);
    }

    #[test]
    fn test_consistency_metrics_edge_cases() {
        assert!(consistency_metrics(&[], 75.0).is_none());
        assert!(consistency_metrics(&[f64::NAN], 75.0).is_none());
        let zero = consistency_metrics(&[0.0, 0.0], 75.0).unwrap();
        assert_eq!(zero.coefficient_of_variation, None);
        assert_eq!(zero.percent_above_threshold, 0.0);
    }

    #[test]
    fn test_seasonal_ratio() {
        let c = cell(0, 0, 46.0, -130.0);
        let records = vec![
            flux_record("s", c, ts(2020, 1, 10, 0), 40.0),
            flux_record("s", c, ts(2020, 12, 10, 0), 20.0),
            flux_record("s", c, ts(2020, 7, 1, 0), 10.0),
            flux_record("s", c, ts(2020, 4, 1, 0), 1000.0),
        ];
        assert_approx_eq!(seasonal_ratio(&records).unwrap(), 3.0, 1e-12);
        assert_eq!(seasonal_ratio(&records[..2]), None);

        let calm = vec![
            flux_record("s", c, ts(2020, 1, 10, 0), 40.0),
            flux_record("s", c, ts(2020, 7, 1, 0), 0.0),
        ];
        assert_eq!(seasonal_ratio(&calm), None);
    }

    #[test]
    fn test_revenue_potential() {
        let r = revenue_potential(30_000.0, DEFAULT_ENERGY_PRICE);
        assert_approx_eq!(r.annual_mwh_per_m, 262.8, 1e-9);
        assert_approx_eq!(r.revenue_per_m, 13_140.0, 1e-6);
    }

    fn row(c: GridCell, month: u32, mean: Option<f64>, count: u64) -> FusedRow {
        let bucket = TimeBucket::new(ts(2020, month, 1, 0), ts(2020, month + 1, 1, 0));
        let source = SourceId::new("s");
        let mut stat = AggregatedStat::gap(c, bucket, vec![source.clone()]);
        if let Some(mean) = mean {
            stat.mean = Some(mean);
            stat.min = Some(mean);
            stat.max = Some(mean);
            stat.stddev = Some(0.0);
            stat.count = count;
            stat.record_count = count;
            stat.gap_filled = false;
            stat.gap_fraction = 0.0;
        }
        FusedRow {
            stat,
            selected_source: source.clone(),
            provenance: vec![source],
        }
    }

    #[test]
    fn test_rank_sites_weights_by_count() {
        let a = cell(0, 0, 46.0, -130.0);
        let b = cell(0, 1, 46.0, -129.8);
        let d = cell(1, 0, 46.2, -130.0);
        let fused = FusedDataset::from_rows(vec![
            row(a, 1, Some(10.0), 3),
            row(a, 2, Some(50.0), 1),
            row(b, 1, Some(30.0), 5),
            row(b, 2, None, 0),
            row(d, 1, Some(20.0), 2),
        ]);

        let ranking = rank_sites(&fused, 10);
        assert_eq!(ranking.len(), 3);
        assert_eq!(ranking[0].cell, b);
        assert_eq!(ranking[0].rank, 1);
        assert_eq!(ranking[0].count, 5);
        // (a: 3 x 10 + 1 x 50) / 4 = 20 ties d; a has the lower row
        assert_eq!(ranking[1].cell, a);
        assert_approx_eq!(ranking[1].mean_power, 20.0, 1e-12);
        assert_eq!(ranking[2].cell, d);

        assert_eq!(rank_sites(&fused, 1).len(), 1);
    }
}
