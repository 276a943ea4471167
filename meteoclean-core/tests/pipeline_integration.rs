//! Integration tests for the cleaning pipeline
//!
//! Runs the orchestrator end to end against the in-memory store: markers,
//! deferral, resume after failure, reference alignment and bias removal.

mod common;

use meteoclean_core::{
    constants::{CLEANED_MEASUREMENT, CONVOLUTION_MEASUREMENT, PRIMARY_SOURCE, RAW_MEASUREMENT},
    pipeline::{CleaningPipeline, PipelineConfig, RunOutcome, RunReport, Stage},
    store::MemoryStore,
    traits::{SeriesQuery, Status},
    CleaningError, Field, FieldValues, PipelineError, PipelineResult, Sample, Series,
    TimeSeriesStore, Watermark,
};

use common::{at, primary, reading, reference, steady, store_with, RecordingSink};

fn run(store: &mut MemoryStore, sink: &RecordingSink) -> PipelineResult<RunOutcome> {
    CleaningPipeline::new(store, sink, PipelineConfig::default()).run()
}

fn cleaned(store: &MemoryStore) -> Series {
    store
        .query(&SeriesQuery::new(CLEANED_MEASUREMENT).source(PRIMARY_SOURCE))
        .unwrap()
}

fn convolution(store: &MemoryStore) -> Series {
    store
        .query(&SeriesQuery::new(CONVOLUTION_MEASUREMENT).source(PRIMARY_SOURCE))
        .unwrap()
}

fn expect_report(outcome: RunOutcome) -> RunReport {
    match outcome {
        RunOutcome::Cleaned(report) => report,
        other => panic!("expected cleaned data, got {other:?}"),
    }
}

#[test]
fn empty_store_writes_nothing() {
    let mut store = MemoryStore::new();
    let sink = RecordingSink::new();

    assert_eq!(run(&mut store, &sink).unwrap(), RunOutcome::NothingToClean);
    assert_eq!(store.write_count(), 0);
    assert_eq!(store.record_count(CONVOLUTION_MEASUREMENT), 0);
    assert_eq!(store.record_count(CLEANED_MEASUREMENT), 0);
    assert_eq!(sink.all(), vec![Status::Measuring, Status::Idle]);
}

#[test]
fn humidity_spike_cleaned_end_to_end() {
    let mut store = store_with(&[primary(&[
        (0, steady().with(Field::Humidity, 10.0)),
        (10, steady().with(Field::Humidity, 100.0)),
        (20, steady().with(Field::Humidity, 12.0)),
    ])]);
    let sink = RecordingSink::new();

    let report = expect_report(run(&mut store, &sink).unwrap());
    assert_eq!(report.convolved, 3);
    assert_eq!(report.cleaned, 3);
    assert_eq!(report.corrections.get(&Field::Humidity), Some(&1));
    assert_eq!(report.offsets, None);
    assert_eq!(report.watermark, Watermark::At(at(20)));

    assert_eq!(convolution(&store).column(Field::Humidity), vec![0.0, 90.0, -88.0]);
    let out = cleaned(&store);
    assert_eq!(out.timestamps(), vec![at(0), at(10), at(20)]);
    assert_eq!(out.column(Field::Humidity), vec![10.0, 11.0, 12.0]);
    assert_eq!(out.column(Field::Pressure), vec![1010.0; 3]);
    assert_eq!(sink.last(), Some(Status::Idle));
}

#[test]
fn second_run_is_a_no_op() {
    let mut store = store_with(&[primary(&[(0, steady()), (10, steady()), (20, steady())])]);
    let sink = RecordingSink::new();

    expect_report(run(&mut store, &sink).unwrap());
    let writes = store.write_count();

    assert_eq!(run(&mut store, &sink).unwrap(), RunOutcome::NothingToClean);
    assert_eq!(store.write_count(), writes);
}

#[test]
fn batch_boundary_uses_continuity_sample() {
    let mut store = store_with(&[primary(&[
        (0, steady()),
        (10, steady()),
        (20, steady()),
    ])]);
    let sink = RecordingSink::new();
    expect_report(run(&mut store, &sink).unwrap());

    // Pressure jumps right at the start of the second batch
    store
        .write(
            RAW_MEASUREMENT,
            &primary(&[
                (30, steady().with(Field::Pressure, 1015.0)),
                (40, steady()),
                (50, steady()),
            ]),
        )
        .unwrap();

    let report = expect_report(run(&mut store, &sink).unwrap());
    assert_eq!(report.convolved, 3);
    assert_eq!(report.corrections.get(&Field::Pressure), Some(&1));

    let signal = convolution(&store);
    assert_eq!(signal.len(), 6);
    // Derivative against the last sample of the first batch, not a cold start
    assert_eq!(signal.samples()[3].get(Field::Pressure), 5.0);

    let out = cleaned(&store);
    assert_eq!(out.len(), 6);
    assert_eq!(out.column(Field::Pressure), vec![1010.0; 6]);
}

#[test]
fn short_batch_is_deferred() {
    let mut store = store_with(&[primary(&[(0, steady()), (10, steady())])]);
    let sink = RecordingSink::new();
    let before = store.write_count();

    assert_eq!(run(&mut store, &sink).unwrap(), RunOutcome::Deferred { pending: 2 });
    assert_eq!(store.write_count(), before);
    assert_eq!(sink.last(), Some(Status::Idle));

    store.write(RAW_MEASUREMENT, &primary(&[(20, steady())])).unwrap();
    let report = expect_report(run(&mut store, &sink).unwrap());
    assert_eq!(report.convolved, 3);
    assert_eq!(cleaned(&store).len(), 3);
}

#[test]
fn failed_cleaned_write_is_completed_next_run() {
    let mut store = store_with(&[primary(&[
        (0, steady()),
        (10, steady().with(Field::Humidity, 90.0)),
        (20, steady()),
    ])]);
    let sink = RecordingSink::new();

    store.set_unreachable(CLEANED_MEASUREMENT);
    let err = run(&mut store, &sink).unwrap_err();
    assert_eq!(err.stage(), Stage::PersistCleaned);
    assert!(err.is_retryable());
    assert_eq!(sink.last(), Some(Status::Error));
    assert_eq!(store.record_count(CONVOLUTION_MEASUREMENT), 3);
    assert_eq!(store.record_count(CLEANED_MEASUREMENT), 0);

    store.set_reachable(CLEANED_MEASUREMENT);
    let report = expect_report(run(&mut store, &sink).unwrap());
    assert_eq!(report.convolved, 0);
    assert_eq!(report.cleaned, 3);
    assert_eq!(cleaned(&store).column(Field::Humidity), vec![40.0, 40.0, 40.0]);
    assert_eq!(sink.last(), Some(Status::Idle));
}

#[test]
fn unreachable_store_aborts_without_writes() {
    let mut store = store_with(&[primary(&[(0, steady()), (10, steady()), (20, steady())])]);
    let sink = RecordingSink::new();
    let before = store.write_count();

    store.set_unreachable(RAW_MEASUREMENT);
    let err = run(&mut store, &sink).unwrap_err();
    assert!(matches!(err, PipelineError::TransientIo { stage: Stage::FetchRaw, .. }));
    assert_eq!(store.write_count(), before);
    assert_eq!(sink.all(), vec![Status::Measuring, Status::Error]);
}

#[test]
fn offline_store_aborts_at_watermark() {
    let mut store = store_with(&[primary(&[(0, steady()), (10, steady()), (20, steady())])]);
    let sink = RecordingSink::new();
    let before = store.write_count();

    store.set_offline(true);
    let err = run(&mut store, &sink).unwrap_err();
    assert!(matches!(err, PipelineError::TransientIo { stage: Stage::FetchWatermark, .. }));
    assert_eq!(store.write_count(), before);
    assert_eq!(sink.last(), Some(Status::Error));
}

#[test]
fn gap_in_convolution_signal_aborts_correction() {
    let mut store = store_with(&[primary(&[(0, steady()), (10, steady()), (20, steady())])]);
    // Signal lost its middle sample: no longer on the raw grid
    store
        .write(
            CONVOLUTION_MEASUREMENT,
            &primary(&[(0, FieldValues::splat(0.0)), (20, FieldValues::splat(0.0))]),
        )
        .unwrap();
    let sink = RecordingSink::new();

    let err = run(&mut store, &sink).unwrap_err();
    assert_eq!(
        err,
        PipelineError::Invariant {
            stage: Stage::Correct,
            violation: CleaningError::LengthMismatch { expected: 3, actual: 2 },
        }
    );
    assert!(!err.is_retryable());
    assert_eq!(store.record_count(CLEANED_MEASUREMENT), 0);
    assert_eq!(sink.all(), vec![Status::Measuring, Status::Error]);
}

#[test]
fn sample_missing_a_field_fails_the_run() {
    let broken = Sample::new(at(10), FieldValues::missing().with(Field::Temperature, 20.0));
    let mut store = store_with(&[
        primary(&[(0, steady()), (20, steady())]),
        Series::new(Some(PRIMARY_SOURCE.into()), vec![broken]).unwrap(),
    ]);
    let sink = RecordingSink::new();
    let before = store.write_count();

    let err = run(&mut store, &sink).unwrap_err();
    assert!(matches!(err, PipelineError::MalformedSample { .. }));
    assert!(!err.is_retryable());
    assert_eq!(store.write_count(), before);
}

#[test]
fn reference_bias_removed() {
    // Station reports 20 minutes off the sensor grid; interpolation lands on 19, 20, 21
    let mut store = store_with(&[
        primary(&[
            (0, reading(21.0, 40.0, 1010.0)),
            (10, reading(22.0, 40.0, 1010.0)),
            (20, reading(23.0, 40.0, 1010.0)),
        ]),
        reference(&[(-10, 18.0, 45.0), (30, 22.0, 45.0)]),
    ]);
    let sink = RecordingSink::new();

    let report = expect_report(run(&mut store, &sink).unwrap());
    let offsets = report.offsets.unwrap();
    assert_eq!(offsets.temperature, Some(2.0));
    assert_eq!(offsets.humidity, Some(-5.0));

    let out = cleaned(&store);
    assert_eq!(out.column(Field::Temperature), vec![19.0, 20.0, 21.0]);
    assert_eq!(out.column(Field::TemperatureHumidity), vec![19.0, 20.0, 21.0]);
    assert_eq!(out.column(Field::TemperaturePressure), vec![19.0, 20.0, 21.0]);
    assert_eq!(out.column(Field::Humidity), vec![45.0; 3]);
    assert_eq!(out.column(Field::Pressure), vec![1010.0; 3]);
}

#[test]
fn reference_outside_margin_is_ignored() {
    let mut store = store_with(&[
        primary(&[(0, steady()), (10, steady()), (20, steady())]),
        reference(&[(-300, 10.0, 80.0)]),
    ]);
    let sink = RecordingSink::new();

    let report = expect_report(run(&mut store, &sink).unwrap());
    assert_eq!(report.offsets, None);
    assert_eq!(cleaned(&store).column(Field::Temperature), vec![20.0; 3]);
}
