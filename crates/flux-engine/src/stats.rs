//! Numerically stable summary statistics.

/// Welford's online algorithm for mean and variance.
///
/// Provides numerically stable computation of mean and variance in a
/// single pass, plus a parallel merge of partial states.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WelfordState {
    /// Number of values seen
    pub count: u64,
    /// Running mean
    pub mean: f64,
    /// Sum of squared differences from mean (M2)
    pub m2: f64,
}

impl WelfordState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a state from a finished summary.
    pub fn from_summary(count: u64, mean: f64, population_stddev: f64) -> Self {
        Self {
            count,
            mean,
            m2: population_stddev * population_stddev * count as f64,
        }
    }

    #[inline]
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    #[inline]
    pub fn variance_population(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    #[inline]
    pub fn stddev_population(&self) -> f64 {
        // m2 can dip a hair below zero through cancellation
        self.variance_population().max(0.0).sqrt()
    }

    /// Merge another Welford state into this one.
    pub fn merge(&mut self, other: &WelfordState) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }

        let combined_count = self.count + other.count;
        let delta = other.mean - self.mean;

        let new_mean = self.mean + delta * (other.count as f64 / combined_count as f64);
        let new_m2 = self.m2
            + other.m2
            + delta * delta * (self.count as f64 * other.count as f64 / combined_count as f64);

        self.count = combined_count;
        self.mean = new_mean;
        self.m2 = new_m2;
    }
}

/// Welford state plus extremes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub welford: WelfordState,
    pub min: f64,
    pub max: f64,
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            welford: WelfordState::new(),
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Summary {
    /// Summarize values in a canonical order so the result does not depend
    /// on the order they were supplied in.
    pub fn of_sorted(values: &mut [f64]) -> Self {
        values.sort_by(f64::total_cmp);
        let mut summary = Self::default();
        for &v in values.iter() {
            summary.add(v);
        }
        summary
    }

    pub fn add(&mut self, value: f64) {
        self.welford.add(value);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn merge(&mut self, other: &Summary) {
        self.welford.merge(&other.welford);
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn count(&self) -> u64 {
        self.welford.count
    }

    pub fn is_empty(&self) -> bool {
        self.welford.count == 0
    }
}

/// Mean of values summed in ascending order.
pub fn sorted_mean(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Percentile of sorted data with linear interpolation between ranks.
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}
