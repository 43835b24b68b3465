//! Time handling: timestamp parsing and aggregation windows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{WaveError, WaveResult};

/// Parse a timestamp as delivered by an upstream source.
///
/// Supports RFC 3339 and the common naive layouts used by buoy and
/// reanalysis exports (interpreted as UTC).
pub fn parse_timestamp(s: &str) -> WaveResult<DateTime<Utc>> {
    let s = s.trim();

    // Try full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
        "%Y%m%dT%H%M%S",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    // Try date only
    if let Ok(ndt) = NaiveDateTime::parse_from_str(&format!("{}T00:00:00", s), "%Y-%m-%dT%H:%M:%S")
    {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(WaveError::InvalidTimestamp(s.to_string()))
}

/// Meteorological seasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    /// December, January, February
    Djf,
    /// March, April, May
    Mam,
    /// June, July, August
    Jja,
    /// September, October, November
    Son,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Season::Djf,
            3..=5 => Season::Mam,
            6..=8 => Season::Jja,
            _ => Season::Son,
        }
    }

    /// First calendar month of the season.
    pub fn start_month(&self) -> u32 {
        match self {
            Season::Djf => 12,
            Season::Mam => 3,
            Season::Jja => 6,
            Season::Son => 9,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Season::Djf => "DJF",
            Season::Mam => "MAM",
            Season::Jja => "JJA",
            Season::Son => "SON",
        }
    }
}

/// A half-open `[start, end)` UTC interval for one aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeBucket {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        dt >= &self.start && dt < &self.end
    }

    /// Check if another bucket lies entirely within this one.
    pub fn encloses(&self, other: &TimeBucket) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Fixed-duration aggregation bucket size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationWindow {
    Day,
    Month,
    Season,
}

impl AggregationWindow {
    /// The bucket containing `ts`.
    pub fn bucket(&self, ts: DateTime<Utc>) -> TimeBucket {
        match self {
            AggregationWindow::Day => {
                let start = utc_midnight(ts.year(), ts.month(), ts.day());
                TimeBucket::new(start, start + Duration::days(1))
            }
            AggregationWindow::Month => {
                let (year, month) = (ts.year(), ts.month());
                let (next_year, next_month) = add_months(year, month, 1);
                TimeBucket::new(
                    utc_midnight(year, month, 1),
                    utc_midnight(next_year, next_month, 1),
                )
            }
            AggregationWindow::Season => {
                let season = Season::from_month(ts.month());
                let start_year = if ts.month() <= 2 { ts.year() - 1 } else { ts.year() };
                let start_month = season.start_month();
                let (end_year, end_month) = add_months(start_year, start_month, 3);
                TimeBucket::new(
                    utc_midnight(start_year, start_month, 1),
                    utc_midnight(end_year, end_month, 1),
                )
            }
        }
    }

    /// The bucket immediately following `bucket`.
    pub fn next_bucket(&self, bucket: &TimeBucket) -> TimeBucket {
        self.bucket(bucket.end)
    }

    /// Every bucket from the one containing `first` through the one containing `last`.
    pub fn buckets_between(&self, first: DateTime<Utc>, last: DateTime<Utc>) -> Vec<TimeBucket> {
        let mut buckets = Vec::new();
        if last < first {
            return buckets;
        }

        let mut current = self.bucket(first);
        while current.start <= last {
            buckets.push(current);
            current = self.next_bucket(&current);
        }
        buckets
    }

    /// Relative coarseness: a window can be re-aggregated into any window
    /// of equal or greater rank.
    pub fn rank(&self) -> u8 {
        match self {
            AggregationWindow::Day => 0,
            AggregationWindow::Month => 1,
            AggregationWindow::Season => 2,
        }
    }

    /// Human-readable label for a bucket of this window.
    pub fn label(&self, bucket: &TimeBucket) -> String {
        match self {
            AggregationWindow::Day => bucket.start.format("%Y-%m-%d").to_string(),
            AggregationWindow::Month => bucket.start.format("%Y-%m").to_string(),
            AggregationWindow::Season => {
                let season = Season::from_month(bucket.start.month());
                format!("{}-{}", bucket.end.year(), season.label())
            }
        }
    }
}

impl FromStr for AggregationWindow {
    type Err = WaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" => Ok(AggregationWindow::Day),
            "month" | "monthly" => Ok(AggregationWindow::Month),
            "season" | "seasonal" => Ok(AggregationWindow::Season),
            other => Err(WaveError::InvalidWindow(format!(
                "{}. Must be one of: day, month, season",
                other
            ))),
        }
    }
}

impl fmt::Display for AggregationWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregationWindow::Day => "day",
            AggregationWindow::Month => "month",
            AggregationWindow::Season => "season",
        };
        f.write_str(s)
    }
}

fn add_months(year: i32, month: u32, months: u32) -> (i32, u32) {
    let zero_based = month - 1 + months;
    (year + (zero_based / 12) as i32, zero_based % 12 + 1)
}

fn utc_midnight(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_timestamp("2020-01-15T12:00:00Z").unwrap();
        assert_eq!(dt.year(), 2020);
        assert_eq!(dt.hour(), 12);
    }

    #[test]
    fn test_parse_buoy_layout() {
        let dt = parse_timestamp("2020-01-15 06:50").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2020, 1, 15, 6, 50, 0).unwrap());
    }

    #[test]
    fn test_parse_offset_is_normalized() {
        let dt = parse_timestamp("2020-01-15T04:00:00-08:00").unwrap();
        assert_eq!(dt, ts(2020, 1, 15, 12));
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(WaveError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_month_bucket() {
        let bucket = AggregationWindow::Month.bucket(ts(2020, 12, 31, 23));
        assert_eq!(bucket.start, ts(2020, 12, 1, 0));
        assert_eq!(bucket.end, ts(2021, 1, 1, 0));
    }

    #[test]
    fn test_winter_season_starts_in_previous_december() {
        let bucket = AggregationWindow::Season.bucket(ts(2021, 2, 10, 0));
        assert_eq!(bucket.start, ts(2020, 12, 1, 0));
        assert_eq!(bucket.end, ts(2021, 3, 1, 0));
        assert_eq!(AggregationWindow::Season.label(&bucket), "2021-DJF");
    }

    #[test]
    fn test_buckets_between() {
        let buckets = AggregationWindow::Month.buckets_between(ts(2020, 1, 20, 0), ts(2020, 4, 1, 0));
        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets[3].start, ts(2020, 4, 1, 0));
    }

    #[test]
    fn test_window_from_str() {
        assert_eq!("Monthly".parse::<AggregationWindow>().unwrap(), AggregationWindow::Month);
        assert!("fortnight".parse::<AggregationWindow>().is_err());
    }
}
