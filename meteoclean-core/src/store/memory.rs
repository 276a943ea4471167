//! In-memory store for testing and dry runs
//!
//! ## Use Cases
//!
//! 1. **Unit Testing**: run the pipeline against known data, no database
//! 2. **Dry Runs**: replay an exported window and inspect the result
//! 3. **Failure Drills**: mark a measurement unreachable and check that a
//!    run aborts without partial writes
//!
//! ## Example
//!
//! ```rust
//! use meteoclean_core::store::MemoryStore;
//! use meteoclean_core::traits::{SeriesQuery, TimeSeriesStore};
//! use meteoclean_core::{FieldValues, Sample, Series};
//! use chrono::{TimeZone, Utc};
//!
//! let mut store = MemoryStore::new();
//! let t = Utc.with_ymd_and_hms(2020, 3, 18, 10, 0, 0).unwrap();
//! let series = Series::new(
//!     Some("sensehat".into()),
//!     vec![Sample::new(t, FieldValues::new(21.0, 20.5, 21.2, 40.0, 1012.0))],
//! ).unwrap();
//!
//! store.write("data", &series).unwrap();
//! let back = store.query(&SeriesQuery::new("data").source("sensehat")).unwrap();
//! assert_eq!(back, series);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    errors::StoreError,
    sample::{FieldValues, Sample, Series},
    time::{format_timestamp, Timestamp},
    traits::{SeriesQuery, TimeSeriesStore},
};

/// Record key: timestamp first so iteration is chronological
type RecordKey = (Timestamp, String);

/// BTreeMap-backed [`TimeSeriesStore`]
///
/// Missing fields are stored as NaN and are never returned for a field
/// the query asks for: such a record yields [`StoreError::MissingField`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    measurements: BTreeMap<String, BTreeMap<RecordKey, FieldValues>>,
    unreachable: BTreeSet<String>,
    offline: bool,
    writes: usize,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call touching `measurement` fail as unreachable
    pub fn set_unreachable(&mut self, measurement: &str) {
        self.unreachable.insert(measurement.to_owned());
    }

    /// Undo [`MemoryStore::set_unreachable`]
    pub fn set_reachable(&mut self, measurement: &str) {
        self.unreachable.remove(measurement);
    }

    /// Make every call fail as unreachable, including `list_measurements`
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Number of successful `write` calls
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Number of records in `measurement`
    pub fn record_count(&self, measurement: &str) -> usize {
        self.measurements.get(measurement).map_or(0, BTreeMap::len)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Unreachable("store offline".into()));
        }
        Ok(())
    }

    fn check_reachable(&self, measurement: &str) -> Result<(), StoreError> {
        self.check_online()?;
        if self.unreachable.contains(measurement) {
            return Err(StoreError::Unreachable(format!("measurement '{measurement}' unavailable")));
        }
        Ok(())
    }
}

impl TimeSeriesStore for MemoryStore {
    fn query(&self, query: &SeriesQuery) -> Result<Series, StoreError> {
        self.check_reachable(&query.measurement)?;
        let Some(records) = self.measurements.get(&query.measurement) else {
            return Ok(Series::empty(query.source.clone()));
        };

        let mut samples = Vec::new();
        for ((timestamp, source), stored) in records {
            if !query.range.contains(timestamp) {
                continue;
            }
            if query.source.as_ref().is_some_and(|wanted| wanted != source) {
                continue;
            }
            let mut values = FieldValues::missing();
            for &field in &query.fields {
                let value = stored.get(field);
                if value.is_nan() {
                    return Err(StoreError::MissingField {
                        timestamp: format_timestamp(timestamp),
                        field: field.name().to_owned(),
                    });
                }
                values.set(field, value);
            }
            samples.push(Sample::new(*timestamp, values));
        }

        Series::new(query.source.clone(), samples).map_err(|violation| StoreError::Invariant {
            measurement: query.measurement.clone(),
            violation,
        })
    }

    fn write(&mut self, measurement: &str, series: &Series) -> Result<(), StoreError> {
        self.check_reachable(measurement)?;
        let source = series.source().unwrap_or_default().to_owned();
        let records = self.measurements.entry(measurement.to_owned()).or_default();
        for sample in series.samples() {
            records.insert((sample.timestamp, source.clone()), sample.values);
        }
        self.writes += 1;
        Ok(())
    }

    fn list_measurements(&self) -> Result<BTreeSet<String>, StoreError> {
        self.check_online()?;
        Ok(self
            .measurements
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn latest_timestamp(&self, measurement: &str, source: Option<&str>) -> Result<Option<Timestamp>, StoreError> {
        self.check_reachable(measurement)?;
        Ok(self.measurements.get(measurement).and_then(|records| {
            records
                .keys()
                .rev()
                .find(|(_, s)| source.map_or(true, |wanted| wanted == s))
                .map(|(t, _)| *t)
        }))
    }
}
