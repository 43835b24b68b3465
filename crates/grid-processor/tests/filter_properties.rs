//! Property tests for region exclusion and deterministic cell assignment.

use grid_processor::SpatialFilter;
use proptest::prelude::*;
use test_utils::{fixtures, observation};

fn filter() -> SpatialFilter {
    SpatialFilter::new(fixtures::pnw_bounds(), 0.2).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn prop_outside_region_is_excluded(
        lat in -90.0f64..90.0,
        lon in -180.0f64..180.0,
    ) {
        let f = filter();
        let obs = observation("s", fixtures::ts(2020, 1, 1, 0), lat, lon, Some(1.0), Some(8.0));
        let kept: Vec<_> = f.filter_and_grid(vec![obs]).collect();

        if f.bounds().contains(lat, lon) {
            prop_assert_eq!(kept.len(), 1);
        } else {
            prop_assert!(kept.is_empty());
        }
    }

    #[test]
    fn prop_inside_region_gets_one_stable_cell(
        lat in 46.0f64..=50.5,
        lon in -130.0f64..=-124.0,
    ) {
        let f = filter();
        let t = fixtures::ts(2020, 1, 1, 0);
        let first: Vec<_> = f
            .filter_and_grid(vec![observation("s", t, lat, lon, Some(1.0), Some(8.0))])
            .collect();
        let second: Vec<_> = f
            .filter_and_grid(vec![observation("s", t, lat, lon, Some(1.0), Some(8.0))])
            .collect();

        prop_assert_eq!(first.len(), 1);
        let cell = first[0].cell.unwrap();
        let again = second[0].cell.unwrap();
        prop_assert_eq!(cell, again);
        prop_assert_eq!(cell.latitude.to_bits(), again.latitude.to_bits());

        // assigned node is within half a cell on each axis
        prop_assert!((cell.latitude - lat).abs() <= 0.1 + 1e-9);
        prop_assert!((cell.longitude - lon).abs() <= 0.1 + 1e-9);
    }
}

#[test]
fn test_documented_tie_example() {
    let cell = filter().snap(47.5, -127.0).unwrap();
    assert_eq!((cell.row, cell.col), (7, 15));
    test_utils::assert_approx_eq!(cell.latitude, 47.4, 1e-9);
}
