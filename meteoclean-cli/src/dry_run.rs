//! Dry runs
//!
//! [`OverlayStore`] reads through to the real store but keeps every write in
//! memory. Later reads within the same run see those writes, so a full
//! pipeline run behaves exactly as it would live, and the real store is
//! left untouched.

use std::collections::{BTreeMap, BTreeSet};

use log::info;

use meteoclean_core::{
    errors::StoreError,
    store::MemoryStore,
    traits::{SeriesQuery, TimeSeriesStore},
    Series, Timestamp,
};

/// Read-through, write-to-memory store
pub struct OverlayStore<S> {
    inner: S,
    overlay: MemoryStore,
}

impl<S: TimeSeriesStore> OverlayStore<S> {
    /// Wrap `inner`; nothing is ever written to it
    pub fn new(inner: S) -> Self {
        Self { inner, overlay: MemoryStore::new() }
    }

    /// Records held back per measurement
    pub fn pending(&self, measurement: &str) -> usize {
        self.overlay.record_count(measurement)
    }
}

impl<S: TimeSeriesStore> TimeSeriesStore for OverlayStore<S> {
    fn query(&self, query: &SeriesQuery) -> Result<Series, StoreError> {
        let below = self.inner.query(query)?;
        let above = self.overlay.query(query)?;
        if above.is_empty() {
            return Ok(below);
        }

        // Overlay wins on equal timestamps, like a rewrite would
        let merged: BTreeMap<Timestamp, _> = below
            .into_samples()
            .into_iter()
            .chain(above.into_samples())
            .map(|s| (s.timestamp, s))
            .collect();
        Series::new(query.source.clone(), merged.into_values().collect()).map_err(|violation| {
            StoreError::Invariant { measurement: query.measurement.clone(), violation }
        })
    }

    fn write(&mut self, measurement: &str, series: &Series) -> Result<(), StoreError> {
        info!("dry run: {} sample(s) for '{}' not written", series.len(), measurement);
        self.overlay.write(measurement, series)
    }

    fn list_measurements(&self) -> Result<BTreeSet<String>, StoreError> {
        let mut names = self.inner.list_measurements()?;
        names.extend(self.overlay.list_measurements()?);
        Ok(names)
    }

    fn latest_timestamp(&self, measurement: &str, source: Option<&str>) -> Result<Option<Timestamp>, StoreError> {
        let below = self.inner.latest_timestamp(measurement, source)?;
        let above = self.overlay.latest_timestamp(measurement, source)?;
        Ok(below.max(above))
    }
}
