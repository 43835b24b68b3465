//! Property tests for the flux formula and window aggregation.

use flux_engine::{compute_flux, power_flux, TemporalAggregator, STANDARD_GRAVITY};
use proptest::prelude::*;
use test_utils::{assert_relative_eq, cell, fixtures, flux_record, observation, permute};
use wave_common::{AggregationWindow, FluxRecord, GridCell, QualityFlag};

fn cells() -> [GridCell; 3] {
    [
        cell(0, 0, 46.0, -130.0),
        cell(0, 1, 46.0, -129.8),
        cell(3, 2, 46.6, -129.6),
    ]
}

prop_compose! {
    fn arb_record()(
        which in 0usize..3,
        hour in 0i64..(24 * 200),
        power in 0.0f64..250_000.0,
        source in prop_oneof![Just("buoy"), Just("model")],
    ) -> FluxRecord {
        let timestamp = fixtures::ts(2020, 1, 1, 0) + chrono::Duration::hours(hour);
        flux_record(source, cells()[which], timestamp, power)
    }
}

fn arb_window() -> impl Strategy<Value = AggregationWindow> {
    prop_oneof![
        Just(AggregationWindow::Day),
        Just(AggregationWindow::Month),
        Just(AggregationWindow::Season),
    ]
}

proptest! {
    #[test]
    fn prop_flux_increases_with_height(
        h in 0.0f64..20.0,
        dh in 0.01f64..5.0,
        t in 0.5f64..30.0,
    ) {
        let lower = power_flux(h, t, 1025.0, STANDARD_GRAVITY);
        let higher = power_flux(h + dh, t, 1025.0, STANDARD_GRAVITY);
        prop_assert!(higher > lower);
    }

    #[test]
    fn prop_flux_increases_with_period(
        h in 0.1f64..20.0,
        t in 0.0f64..30.0,
        dt in 0.01f64..5.0,
    ) {
        let lower = power_flux(h, t, 1025.0, STANDARD_GRAVITY);
        let higher = power_flux(h, t + dt, 1025.0, STANDARD_GRAVITY);
        prop_assert!(higher > lower);
    }

    #[test]
    fn prop_aggregation_ignores_input_order(
        records in prop::collection::vec(arb_record(), 1..200),
        window in arb_window(),
        seed in any::<u64>(),
    ) {
        let aggregator = TemporalAggregator::new(window);
        let expected = aggregator.aggregate(&records);
        let shuffled = aggregator.aggregate(&permute(&records, seed));

        prop_assert_eq!(expected.len(), shuffled.len());
        for (a, b) in expected.iter().zip(&shuffled) {
            prop_assert_eq!(a.key(), b.key());
            prop_assert_eq!(a.count, b.count);
            prop_assert_eq!(&a.sources, &b.sources);
            match (a.mean, b.mean) {
                (Some(x), Some(y)) => {
                    let scale = x.abs().max(y.abs()).max(f64::MIN_POSITIVE);
                    prop_assert!((x - y).abs() <= 1e-9 * scale);
                }
                (x, y) => prop_assert_eq!(x, y),
            }
        }
    }

    #[test]
    fn prop_reaggregate_same_window_round_trips(
        records in prop::collection::vec(arb_record(), 1..200),
        window in arb_window(),
    ) {
        let aggregator = TemporalAggregator::new(window);
        let stats = aggregator.aggregate(&records);
        let again = aggregator.reaggregate(&stats).unwrap();

        prop_assert_eq!(stats.len(), again.len());
        for (a, b) in stats.iter().zip(&again) {
            prop_assert_eq!(a.key(), b.key());
            prop_assert_eq!(a.count, b.count);
            prop_assert_eq!(a.record_count, b.record_count);
            prop_assert_eq!(a.mean, b.mean);
            prop_assert_eq!(a.gap_filled, b.gap_filled);
        }
    }

    #[test]
    fn prop_daily_into_monthly_matches_direct(
        records in prop::collection::vec(arb_record(), 1..200),
    ) {
        let daily = TemporalAggregator::new(AggregationWindow::Day).aggregate(&records);
        let monthly = TemporalAggregator::new(AggregationWindow::Month);
        let direct = monthly.aggregate(&records);
        let rolled = monthly.reaggregate(&daily).unwrap();

        prop_assert_eq!(direct.len(), rolled.len());
        for (a, b) in direct.iter().zip(&rolled) {
            prop_assert_eq!(a.key(), b.key());
            prop_assert_eq!(a.count, b.count);
            if let (Some(x), Some(y)) = (a.mean, b.mean) {
                let scale = x.abs().max(y.abs()).max(1.0);
                prop_assert!((x - y).abs() <= 1e-9 * scale);
            }
        }
    }
}

#[test]
fn test_reference_observation() {
    let mut obs = observation(
        "ndbc-46050",
        fixtures::ts(2020, 1, 1, 0),
        44.6,
        -124.5,
        Some(2.0),
        Some(8.0),
    );
    obs.cell = Some(cell(0, 0, 44.6, -124.5));
    obs.quality = Some(QualityFlag::accepted());

    let record = compute_flux(&obs).unwrap();
    let literal = 1025.0 * 9.80665_f64.powi(2) * 2.0_f64.powi(2) * 8.0 / (64.0 * std::f64::consts::PI);
    assert_relative_eq!(record.power, literal, 1e-12);
    assert!(record.power > 15_000.0 && record.power < 16_500.0);
}
