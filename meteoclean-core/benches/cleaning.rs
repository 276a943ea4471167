//! Benchmarks for the cleaning components.

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use meteoclean_core::{
    alignment::align,
    convolution::convolve,
    correction::correct,
    Field, FieldValues, Sample, Series, Thresholds,
};

/// A day of ten-minute samples with a spike every fifty samples
fn create_batch(len: usize) -> Series {
    let start = Utc.with_ymd_and_hms(2020, 3, 18, 0, 0, 0).unwrap();
    let samples = (0..len)
        .map(|i| {
            let t = 20.0 + (i as f64 * 0.05).sin();
            let spike = if i % 50 == 25 { 15.0 } else { 0.0 };
            Sample::new(
                start + Duration::minutes(10 * i as i64),
                FieldValues::new(t + spike, t - 0.3, t + 0.2, 40.0 + spike, 1010.0),
            )
        })
        .collect();
    Series::new(Some("sensehat".into()), samples).unwrap()
}

fn benchmark_convolve_correct(c: &mut Criterion) {
    let thresholds = Thresholds::default();
    let day = create_batch(144);
    let week = create_batch(1008);

    c.bench_function("convolve_correct_day", |b| {
        b.iter(|| {
            let signal = convolve(black_box(&day), None).unwrap().unwrap();
            correct(&day, &signal, None, &thresholds).unwrap()
        })
    });

    c.bench_function("convolve_correct_week", |b| {
        b.iter(|| {
            let signal = convolve(black_box(&week), None).unwrap().unwrap();
            correct(&week, &signal, None, &thresholds).unwrap()
        })
    });
}

fn benchmark_align(c: &mut Criterion) {
    let targets = create_batch(1008).timestamps();
    // Hourly reference, offset by five minutes
    let start = Utc.with_ymd_and_hms(2020, 3, 17, 23, 5, 0).unwrap();
    let hourly = (0..170)
        .map(|h| {
            let t = 18.0 + (h as f64 * 0.3).sin();
            Sample::new(start + Duration::hours(h), FieldValues::new(t, 0.0, 0.0, 45.0, 0.0))
        })
        .collect();
    let reference = Series::new(None, hourly).unwrap();

    c.bench_function("align_week", |b| {
        b.iter(|| align(black_box(&reference), &targets, &[Field::Temperature, Field::Humidity]))
    });
}

criterion_group!(benches, benchmark_convolve_correct, benchmark_align);
criterion_main!(benches);
