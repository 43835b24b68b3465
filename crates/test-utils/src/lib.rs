//! Test support shared by every crate in the workspace.
//!
//! Fixtures (regions, source ids, sample NDBC and reanalysis text), record
//! generators, scratch-directory helpers and float assertions. Pulled in as
//! a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Asserts `|left - right| <= epsilon`.
///
/// ```ignore
/// test_utils::assert_approx_eq!(cell.latitude, 47.4, 1e-9);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let (left, right, epsilon) = ($left as f64, $right as f64, $epsilon as f64);
        let diff = (left - right).abs();
        assert!(
            diff <= epsilon,
            "assertion failed: `(left ≈ right)`: {} vs {}, diff {} exceeds {}",
            left,
            right,
            diff,
            epsilon
        );
    }};
}

/// Macro for relative floating-point equality.
///
/// Passes when `|left - right| <= tolerance * max(|left|, |right|)`, or
/// when both sides are exactly equal.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_relative_eq;
///
/// assert_relative_eq!(15810.1, 15810.2, 1e-4);
/// ```
#[macro_export]
macro_rules! assert_relative_eq {
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let tolerance: f64 = $tolerance as f64;
        let scale = left.abs().max(right.abs());
        let diff = (left - right).abs();
        if left != right && diff > tolerance * scale {
            panic!(
                "assertion failed: `(left ≈ right)` (relative)\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > {:?} * {:?}",
                left, right, diff, tolerance, scale
            );
        }
    }};
}
