//! Derivative Signal ("Convolution") for Anomaly Detection
//!
//! ## Overview
//!
//! Spikes in the sensor feed show up as large first differences. For every
//! field the batch is convolved with the difference kernel `[1, -1]`:
//!
//! ```text
//! derivative[i] = value[i] - value[i-1]        for i ≥ 1
//! derivative[0] = value[0] - continuity[field]  if the previous batch is known
//!               = 0                             on a cold start
//! ```
//!
//! The result has the same length and timestamps as its input and is
//! persisted as its own series, both as an audit trail and as the marker
//! of how far cleaning has progressed.
//!
//! ## Batch Continuity
//!
//! Batches are cut at the watermark, so the first sample of a batch has its
//! predecessor in the previous batch. Passing that predecessor as the
//! continuity sample makes `derivative[0]` identical to what convolving the
//! concatenated history would give, without re-reading the history:
//!
//! ```text
//! batch A: ... 20.1 20.3 │ batch B: 20.2 27.9 20.4
//!                   ↑    │          ↑
//!          continuity    │   derivative[0] = 20.2 - 20.3
//! ```
//!
//! Batches shorter than [`MIN_CONVOLUTION_BATCH`] produce no signal at all.

use crate::{
    constants::MIN_CONVOLUTION_BATCH,
    errors::{CleaningError, CleaningResult},
    sample::{Field, FieldValues, Sample, Series},
};

/// First difference of `values`, seeded with the value preceding the slice.
///
/// A missing or NaN `previous` yields `0.0` at index 0.
pub fn derivative(values: &[f64], previous: Option<f64>) -> Vec<f64> {
    let seed = previous.filter(|p| !p.is_nan());
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| match i {
            0 => seed.map_or(0.0, |p| value - p),
            _ => value - values[i - 1],
        })
        .collect()
}

/// Compute the derivative signal of a batch.
///
/// Returns `Ok(None)` when the batch is too short to convolve. The
/// continuity sample, when given, must be older than the first sample.
pub fn convolve(series: &Series, continuity: Option<&Sample>) -> CleaningResult<Option<Series>> {
    if series.len() < MIN_CONVOLUTION_BATCH {
        return Ok(None);
    }
    if let (Some(c), Some(first)) = (continuity, series.first()) {
        if c.timestamp >= first.timestamp {
            return Err(CleaningError::NonMonotonic { index: 0 });
        }
    }

    let mut signal: Vec<Sample> = series
        .samples()
        .iter()
        .map(|s| Sample::new(s.timestamp, FieldValues::missing()))
        .collect();

    for field in Field::ALL {
        let column = series.column(field);
        let seed = continuity.map(|c| c.get(field));
        for (slot, d) in signal.iter_mut().zip(derivative(&column, seed)) {
            slot.values.set(field, d);
        }
    }

    Series::new(series.source().map(str::to_owned), signal).map(Some)
}
