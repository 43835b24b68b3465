//! End-to-end ingestion tests: reader -> adapter -> quality control.

use std::sync::Arc;

use bytes::Bytes;
use ingestion::{
    create_adapter, open_path, AdapterSettings, Compression, DuplicateHistory, IngestionError,
    InputFormat, InputKind, QualityController, QualityReport, RawRecordReader, ReaderOptions,
    SchemaRegistry,
};
use proptest::prelude::*;
use test_utils::{assert_approx_eq, fixtures, write_input_file};
use wave_common::{QualityLevel, RawRecord, SourceId, SourceKind};

fn registry() -> SchemaRegistry {
    SchemaRegistry::builder()
        .register_builtin(SourceId::new(fixtures::sources::BUOY), SourceKind::Buoy)
        .unwrap()
        .register_builtin(SourceId::new(fixtures::sources::REANALYSIS), SourceKind::Reanalysis)
        .unwrap()
        .build()
}

#[test]
fn test_ndbc_file_through_quality_control() {
    let dir = test_utils::temp_test_dir();
    let path = write_input_file(dir.path(), "46050h2020.txt", fixtures::NDBC_STDMET.as_bytes());

    let source = SourceId::new(fixtures::sources::BUOY);
    let schema = registry().get_schema(&source).unwrap();
    let adapter = create_adapter(Arc::clone(&schema), AdapterSettings::default());
    let qc = QualityController::new(schema);

    let mut options = ReaderOptions::new(source);
    options.default_position = Some(fixtures::NDBC_46050_POSITION);

    let mut history = DuplicateHistory::default();
    let mut report = QualityReport::default();
    let mut malformed = 0;
    let mut kept = Vec::new();

    for record in open_path(&path, options).unwrap() {
        let record = record.unwrap();
        match adapter.normalize(&record) {
            Ok(observations) => {
                for obs in observations {
                    let obs = qc.apply(obs, &mut history);
                    report.record(obs.quality.as_ref().unwrap());
                    kept.push(obs);
                }
            }
            Err(e) if e.is_per_record() => malformed += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(malformed, 0);
    assert_eq!(kept.len(), 3);
    assert_eq!(report.accepted, 2);
    // third row has WVHT/DPD = MM
    assert_eq!(report.rejected, 1);
    assert_approx_eq!(kept[0].sea_level_pressure.unwrap(), 101_230.0, 1e-6);
    assert_eq!(kept[2].quality.unwrap().level, QualityLevel::Rejected);
}

#[test]
fn test_missing_period_is_malformed_and_reading_continues() {
    let source = SourceId::new(fixtures::sources::REANALYSIS);
    let schema = registry().get_schema(&source).unwrap();
    let adapter = create_adapter(schema, AdapterSettings::default());

    let kind = InputKind {
        format: InputFormat::JsonLines,
        compression: Compression::None,
    };
    let reader = RawRecordReader::from_bytes(
        Bytes::from_static(fixtures::REANALYSIS_JSONL.as_bytes()),
        kind,
        ReaderOptions::new(source),
    );

    let mut observations = 0;
    let mut malformed = 0;
    for record in reader {
        match adapter.normalize(&record.unwrap()) {
            Ok(seq) => observations += seq.count(),
            Err(IngestionError::MalformedRecord { reason, .. }) => {
                assert!(reason.contains("VTPK"));
                malformed += 1;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(observations, 2);
    assert_eq!(malformed, 1);
}

#[test]
fn test_unknown_source_is_an_error() {
    let err = registry().get_schema(&SourceId::new("ndbc-00000")).unwrap_err();
    assert!(matches!(err, IngestionError::UnknownSource(_)));
    assert!(!err.is_per_record());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_adapter_never_panics(
        height in prop_oneof![Just("MM".to_string()), "[0-9]{1,2}\\.[0-9]{1,2}", "[a-z]{1,3}"],
        period in prop_oneof![Just("99.00".to_string()), "[0-9]{1,2}\\.[0-9]{1,2}"],
        lat in -100.0f64..100.0,
        lon in -200.0f64..200.0,
    ) {
        let source = SourceId::new(fixtures::sources::BUOY);
        let schema = registry().get_schema(&source).unwrap();
        let adapter = create_adapter(schema, AdapterSettings::default());
        let raw = RawRecord::new(source, "2020-01-15T00:00:00Z")
            .with_position(lat, lon)
            .with_value("WVHT", height)
            .with_value("DPD", period);

        match adapter.normalize(&raw) {
            Ok(seq) => {
                for obs in seq {
                    prop_assert!((-90.0..=90.0).contains(&obs.latitude));
                    prop_assert!((-180.0..=180.0).contains(&obs.longitude));
                }
            }
            Err(e) => prop_assert!(e.is_per_record()),
        }
    }
}
