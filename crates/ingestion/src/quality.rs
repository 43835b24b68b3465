//! Quality control of canonical observations.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. schema range check: `REJECTED / OUT_OF_RANGE`
//! 2. required fields present: `REJECTED / MISSING_FIELD`
//! 3. cross-field plausibility: `SUSPECT / PHYSICALLY_INCONSISTENT`
//! 4. temporal duplicate: `SUSPECT / DUPLICATE`
//!
//! The only state involved is the caller-owned [`DuplicateHistory`].

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::Serialize;
use wave_common::{
    CanonicalField, CanonicalObservation, QualityFlag, QualityLevel, ReasonCode, SourceId,
};

use crate::schema::Schema;

/// Default number of (source, cell, timestamp) keys remembered.
pub const DEFAULT_DUPLICATE_LOOKBACK: usize = 100_000;

/// Deep-water breaking limit on wave steepness H/L.
pub const MAX_WAVE_STEEPNESS: f64 = 1.0 / 7.0;

const STANDARD_GRAVITY: f64 = 9.80665;

/// Position used for duplicate detection: the grid cell when assigned,
/// otherwise the raw coordinate in micro-degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Position {
    Cell(u32, u32),
    Coordinate(i64, i64),
}

type DuplicateKey = (SourceId, Position, DateTime<Utc>);

/// Bounded lookback of observations already seen in one source run.
///
/// Owned by the caller and never shared between source pipelines.
pub struct DuplicateHistory {
    seen: LruCache<DuplicateKey, ()>,
    evictions: u64,
}

impl DuplicateHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            seen: LruCache::new(capacity),
            evictions: 0,
        }
    }

    /// Record a key; returns true if it was already present.
    fn check_and_insert(&mut self, key: DuplicateKey) -> bool {
        if self.seen.get(&key).is_some() {
            return true;
        }
        if self.seen.len() == self.seen.cap().get() {
            self.evictions += 1;
        }
        self.seen.put(key, ());
        false
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.seen.cap().get()
    }

    /// Keys dropped to respect the capacity.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.evictions = 0;
    }
}

impl Default for DuplicateHistory {
    fn default() -> Self {
        Self::new(DEFAULT_DUPLICATE_LOOKBACK)
    }
}

fn duplicate_key(obs: &CanonicalObservation) -> DuplicateKey {
    let position = match obs.cell {
        Some(cell) => Position::Cell(cell.row, cell.col),
        None => Position::Coordinate(
            (obs.latitude * 1e6).round() as i64,
            (obs.longitude * 1e6).round() as i64,
        ),
    };
    (obs.source_id().clone(), position, obs.timestamp)
}

/// Validates observations of one source against its schema.
#[derive(Debug, Clone)]
pub struct QualityController {
    schema: Arc<Schema>,
}

impl QualityController {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Assess one observation.
    pub fn validate(
        &self,
        obs: &CanonicalObservation,
        history: &mut DuplicateHistory,
    ) -> QualityFlag {
        if let Some(field) = self.out_of_range_field(obs) {
            return QualityFlag::rejected(ReasonCode::OutOfRange, Some(field));
        }

        if let Some(field) = self
            .schema
            .required_fields()
            .find(|field| obs.field(*field).is_none())
        {
            return QualityFlag::rejected(ReasonCode::MissingField, Some(field));
        }

        if let Some(field) = inconsistent_field(obs) {
            return QualityFlag::suspect(ReasonCode::PhysicallyInconsistent, Some(field));
        }

        if history.check_and_insert(duplicate_key(obs)) {
            return QualityFlag::suspect(ReasonCode::Duplicate, None);
        }

        QualityFlag::accepted()
    }

    /// Validate and attach the verdict to the observation.
    pub fn apply(
        &self,
        mut obs: CanonicalObservation,
        history: &mut DuplicateHistory,
    ) -> CanonicalObservation {
        obs.quality = Some(self.validate(&obs, history));
        obs
    }

    fn out_of_range_field(&self, obs: &CanonicalObservation) -> Option<CanonicalField> {
        self.schema
            .variables
            .iter()
            .filter(|var| !(var.field == CanonicalField::Density && obs.density_defaulted))
            .find(|var| obs.field(var.field).is_some_and(|v| !var.in_range(v)))
            .map(|var| var.field)
    }
}

/// Cross-field plausibility.
///
/// A sea state with height needs a positive period, and no wave can be
/// steeper than the breaking limit for its deep-water wavelength.
fn inconsistent_field(obs: &CanonicalObservation) -> Option<CanonicalField> {
    let (h, t) = (obs.significant_wave_height?, obs.wave_period?);
    if h > 0.0 && t <= 0.0 {
        return Some(CanonicalField::WavePeriod);
    }
    if t > 0.0 {
        let wavelength = STANDARD_GRAVITY * t * t / (2.0 * PI);
        if h / wavelength > MAX_WAVE_STEEPNESS {
            return Some(CanonicalField::SignificantWaveHeight);
        }
    }
    None
}

/// Tally of quality verdicts for one source run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QualityReport {
    pub accepted: u64,
    pub suspect: u64,
    pub rejected: u64,
    pub by_reason: BTreeMap<ReasonCode, u64>,
}

impl QualityReport {
    pub fn record(&mut self, flag: &QualityFlag) {
        match flag.level {
            QualityLevel::Accepted => self.accepted += 1,
            QualityLevel::Suspect => self.suspect += 1,
            QualityLevel::Rejected => self.rejected += 1,
        }
        if let Some(reason) = flag.reason {
            *self.by_reason.entry(reason).or_default() += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.accepted + self.suspect + self.rejected
    }

    /// Observations that may feed the flux engine.
    pub fn usable(&self) -> u64 {
        self.accepted + self.suspect
    }

    pub fn merge(&mut self, other: &QualityReport) {
        self.accepted += other.accepted;
        self.suspect += other.suspect;
        self.rejected += other.rejected;
        for (reason, count) in &other.by_reason {
            *self.by_reason.entry(*reason).or_default() += count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wave_common::{GridCell, Provenance};

    fn controller() -> QualityController {
        QualityController::new(Arc::new(Schema::buoy(SourceId::new("ndbc-46050"))))
    }

    fn obs(h: Option<f64>, t: Option<f64>) -> CanonicalObservation {
        CanonicalObservation {
            timestamp: Utc.with_ymd_and_hms(2020, 1, 15, 6, 0, 0).unwrap(),
            latitude: 47.4,
            longitude: -127.0,
            significant_wave_height: h,
            wave_period: t,
            wind_speed: None,
            wind_direction: None,
            sea_level_pressure: None,
            density: 1025.0,
            density_defaulted: true,
            provenance: Provenance {
                source_id: SourceId::new("ndbc-46050"),
                adapter_version: "test".to_string(),
            },
            cell: Some(GridCell {
                row: 7,
                col: 15,
                latitude: 47.4,
                longitude: -127.0,
            }),
            quality: None,
        }
    }

    #[test]
    fn test_accepted() {
        let flag = controller().validate(&obs(Some(2.0), Some(8.0)), &mut DuplicateHistory::default());
        assert_eq!(flag, QualityFlag::accepted());
    }

    #[test]
    fn test_range_before_missing() {
        let flag = controller().validate(&obs(Some(31.0), None), &mut DuplicateHistory::default());
        assert_eq!(flag.level, QualityLevel::Rejected);
        assert_eq!(flag.reason, Some(ReasonCode::OutOfRange));
        assert_eq!(flag.field, Some(CanonicalField::SignificantWaveHeight));
    }

    #[test]
    fn test_missing_field() {
        let flag = controller().validate(&obs(None, Some(8.0)), &mut DuplicateHistory::default());
        assert_eq!(
            flag,
            QualityFlag::rejected(ReasonCode::MissingField, Some(CanonicalField::SignificantWaveHeight))
        );
    }

    #[test]
    fn test_zero_period_with_height_is_suspect() {
        let flag = controller().validate(&obs(Some(1.5), Some(0.0)), &mut DuplicateHistory::default());
        assert_eq!(flag.level, QualityLevel::Suspect);
        assert_eq!(flag.reason, Some(ReasonCode::PhysicallyInconsistent));
    }

    #[test]
    fn test_too_steep_is_suspect() {
        // 1 s waves are ~1.56 m long
        let flag = controller().validate(&obs(Some(2.0), Some(1.0)), &mut DuplicateHistory::default());
        assert_eq!(flag.reason, Some(ReasonCode::PhysicallyInconsistent));
        assert_eq!(flag.field, Some(CanonicalField::SignificantWaveHeight));
    }

    #[test]
    fn test_flat_sea_is_accepted() {
        let flag = controller().validate(&obs(Some(0.0), Some(0.0)), &mut DuplicateHistory::default());
        assert_eq!(flag.level, QualityLevel::Accepted);
    }

    #[test]
    fn test_duplicate() {
        let qc = controller();
        let mut history = DuplicateHistory::default();
        assert_eq!(qc.validate(&obs(Some(2.0), Some(8.0)), &mut history).level, QualityLevel::Accepted);
        let second = qc.validate(&obs(Some(2.1), Some(8.0)), &mut history);
        assert_eq!(second, QualityFlag::suspect(ReasonCode::Duplicate, None));
    }

    #[test]
    fn test_rejected_records_do_not_enter_history() {
        let qc = controller();
        let mut history = DuplicateHistory::default();
        qc.validate(&obs(None, Some(8.0)), &mut history);
        assert!(history.is_empty());
        assert_eq!(qc.validate(&obs(Some(2.0), Some(8.0)), &mut history).level, QualityLevel::Accepted);
    }

    #[test]
    fn test_history_is_bounded() {
        let qc = controller();
        let mut history = DuplicateHistory::new(1);
        let first = obs(Some(2.0), Some(8.0));
        let mut second = first.clone();
        second.timestamp += chrono::Duration::hours(1);

        qc.validate(&first, &mut history);
        qc.validate(&second, &mut history);
        assert_eq!(history.len(), 1);
        assert_eq!(history.evictions(), 1);
        // first key was evicted, so it is no longer a duplicate
        assert_eq!(qc.validate(&first, &mut history).level, QualityLevel::Accepted);
    }

    #[test]
    fn test_defaulted_density_is_not_range_checked() {
        let mut o = obs(Some(2.0), Some(8.0));
        o.density = 990.0;
        let mut history = DuplicateHistory::default();
        assert_eq!(controller().validate(&o, &mut history).level, QualityLevel::Accepted);

        o.density_defaulted = false;
        o.timestamp += chrono::Duration::hours(1);
        assert_eq!(controller().validate(&o, &mut history).reason, Some(ReasonCode::OutOfRange));
    }

    #[test]
    fn test_report() {
        let mut report = QualityReport::default();
        report.record(&QualityFlag::accepted());
        report.record(&QualityFlag::suspect(ReasonCode::Duplicate, None));
        report.record(&QualityFlag::rejected(ReasonCode::OutOfRange, None));
        assert_eq!(report.total(), 3);
        assert_eq!(report.usable(), 2);
        assert_eq!(report.by_reason.get(&ReasonCode::Duplicate), Some(&1));
    }
}
