//! Source adapters.
//!
//! An adapter turns one upstream [`RawRecord`] into zero or more
//! [`CanonicalObservation`]s in SI units. Each source kind has its own
//! adapter; new kinds add a variant without touching the others.

mod buoy;
mod decode;
mod reanalysis;
mod satellite;

use std::collections::BTreeMap;
use std::sync::Arc;

use wave_common::{CanonicalObservation, Provenance, RawRecord, SourceId, SourceKind};

pub use buoy::BuoyAdapter;
pub use decode::DecodeRules;
pub use reanalysis::ReanalysisAdapter;
pub use satellite::SatelliteAdapter;

use crate::error::Result;
use crate::schema::Schema;
use decode::DecodedFrame;

/// Seawater density used when a source does not report one (kg/m3).
pub const DEFAULT_SEAWATER_DENSITY: f64 = 1025.0;

/// Per-source adapter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterSettings {
    /// Density assigned when the source omits it.
    pub default_density: f64,
    /// Unit labels per raw variable, overriding the schema defaults.
    pub unit_overrides: BTreeMap<String, String>,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            default_density: DEFAULT_SEAWATER_DENSITY,
            unit_overrides: BTreeMap::new(),
        }
    }
}

/// Normalizes raw records of one source.
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &SourceId;

    fn kind(&self) -> SourceKind;

    /// Adapter version recorded in provenance.
    fn version(&self) -> &str;

    /// Normalize one raw record.
    ///
    /// The record is validated as a whole before anything is yielded, so a
    /// malformed record fails here and never produces partial output.
    fn normalize(&self, raw: &RawRecord) -> Result<Normalized>;
}

/// Lazy sequence of observations decoded from one raw record.
///
/// Cloning yields an independent cursor over the same decoded data, and
/// [`Normalized::restart`] rewinds to the first sample.
#[derive(Debug, Clone)]
pub struct Normalized {
    frame: Arc<DecodedFrame>,
    provenance: Provenance,
    index: usize,
}

impl Normalized {
    pub(crate) fn new(frame: DecodedFrame, provenance: Provenance) -> Self {
        Self {
            frame: Arc::new(frame),
            provenance,
            index: 0,
        }
    }

    /// A fresh cursor positioned at the first sample.
    pub fn restart(&self) -> Self {
        Self {
            frame: Arc::clone(&self.frame),
            provenance: self.provenance.clone(),
            index: 0,
        }
    }
}

impl Iterator for Normalized {
    type Item = CanonicalObservation;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.frame.len() {
            let index = self.index;
            self.index += 1;
            if let Some(obs) = self.frame.observation(index, &self.provenance) {
                return Some(obs);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.frame.len().saturating_sub(self.index)))
    }
}

/// Create the adapter for a schema's source kind.
pub fn create_adapter(schema: Arc<Schema>, settings: AdapterSettings) -> Box<dyn SourceAdapter> {
    match schema.kind {
        SourceKind::Buoy => Box::new(BuoyAdapter::new(schema, settings)),
        SourceKind::Reanalysis => Box::new(ReanalysisAdapter::new(schema, settings)),
        SourceKind::Satellite => Box::new(SatelliteAdapter::new(schema, settings)),
    }
}

/// Shared body of every adapter's `normalize`.
fn normalize_with(
    schema: &Schema,
    rules: &DecodeRules,
    settings: &AdapterSettings,
    version: &str,
    raw: &RawRecord,
) -> Result<Normalized> {
    let frame = decode::decode_frame(schema, rules, settings, raw)?;
    let provenance = Provenance {
        source_id: schema.source_id.clone(),
        adapter_version: version.to_string(),
    };
    Ok(Normalized::new(frame, provenance))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_matches_kind() {
        for kind in [SourceKind::Buoy, SourceKind::Reanalysis, SourceKind::Satellite] {
            let schema = Arc::new(Schema::for_kind(SourceId::new("s"), kind));
            let adapter = create_adapter(schema, AdapterSettings::default());
            assert_eq!(adapter.kind(), kind);
            assert_eq!(adapter.source_id().as_str(), "s");
        }
    }

    #[test]
    fn test_normalized_is_restartable() {
        let schema = Arc::new(Schema::satellite(SourceId::new("sat")));
        let adapter = create_adapter(schema, AdapterSettings::default());
        let raw = RawRecord::new(SourceId::new("sat"), "2020-01-15T00:00:00Z")
            .with_value("latitude", serde_json::json!([47.0, 47.1, 47.2]))
            .with_value("longitude", serde_json::json!([-127.0, -127.0, -127.0]))
            .with_value("VAVH", serde_json::json!([2.0, 2.1, 2.2]))
            .with_value("VTM02", serde_json::json!([8.0, 8.0, 8.0]));

        let mut seq = adapter.normalize(&raw).unwrap();
        let first = seq.next().unwrap();
        assert_eq!(seq.count(), 2);

        let again: Vec<_> = adapter.normalize(&raw).unwrap().collect();
        assert_eq!(again.len(), 3);
        assert_eq!(again[0], first);

        let seq = adapter.normalize(&raw).unwrap();
        let copy = seq.clone();
        assert_eq!(seq.collect::<Vec<_>>(), copy.restart().collect::<Vec<_>>());
    }
}
