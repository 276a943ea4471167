//! Common fixtures for the integration tests
//!
//! - Timestamps on a fixed ten-minute grid
//! - Primary (Sense HAT) and reference (weather station) series builders
//! - A status sink that records what it was told

#![allow(dead_code)]

use std::cell::RefCell;

use chrono::{Duration, TimeZone, Utc};

use meteoclean_core::{
    constants::{PRIMARY_SOURCE, RAW_MEASUREMENT, REFERENCE_SOURCE},
    store::MemoryStore,
    traits::{Status, StatusSink},
    FieldValues, Sample, Series, TimeSeriesStore, Timestamp,
};

/// 2020-03-18T10:00:00Z plus `minutes`
pub fn at(minutes: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2020, 3, 18, 10, 0, 0).unwrap() + Duration::minutes(minutes)
}

/// Sensor reading with both proxy temperatures equal to `temperature`
pub fn reading(temperature: f64, humidity: f64, pressure: f64) -> FieldValues {
    FieldValues::new(temperature, temperature, temperature, humidity, pressure)
}

/// Steady indoor conditions
pub fn steady() -> FieldValues {
    reading(20.0, 40.0, 1010.0)
}

/// Primary series from `(minute, values)` rows
pub fn primary(rows: &[(i64, FieldValues)]) -> Series {
    let samples = rows.iter().map(|(m, v)| Sample::new(at(*m), *v)).collect();
    Series::new(Some(PRIMARY_SOURCE.into()), samples).unwrap()
}

/// Reference series from `(minute, temperature, humidity)` rows.
///
/// The station only reports two fields; the others are written as 0.0.
pub fn reference(rows: &[(i64, f64, f64)]) -> Series {
    let samples = rows
        .iter()
        .map(|(m, t, h)| Sample::new(at(*m), FieldValues::new(*t, 0.0, 0.0, *h, 0.0)))
        .collect();
    Series::new(Some(REFERENCE_SOURCE.into()), samples).unwrap()
}

/// Store holding `series` in the raw measurement
pub fn store_with(series: &[Series]) -> MemoryStore {
    let mut store = MemoryStore::new();
    for s in series {
        store.write(RAW_MEASUREMENT, s).unwrap();
    }
    store
}

/// Status sink remembering every signal
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub signals: RefCell<Vec<Status>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<Status> {
        self.signals.borrow().last().copied()
    }

    pub fn all(&self) -> Vec<Status> {
        self.signals.borrow().clone()
    }
}

impl StatusSink for RecordingSink {
    fn signal(&self, status: Status) {
        self.signals.borrow_mut().push(status);
    }
}
