//! Temporal Alignment of the Reference Feed
//!
//! ## Overview
//!
//! The weather station reports every ten minutes on its own clock; the
//! sensor samples on another. Bias adjustment needs one reference value per
//! sensor timestamp, so the reference series is resampled onto the sensor's
//! grid by linear interpolation in time.
//!
//! ## Algorithm
//!
//! Two cursors walk the target grid (`i`) and the reference series (`s`):
//!
//! ```text
//! reference:        r0 ─────────── r1 ─────────── r2
//! targets:    t0         t1   t2        t3 = r1         t4     t5 (after r2)
//! result:     NaN        interpolated   copied          interp NaN
//! ```
//!
//! - targets before the first reference sample are missing (NaN)
//! - a target stamped exactly like a reference sample copies its value
//! - otherwise the target lies between `s-1` and `s` and is interpolated
//!   with elapsed minutes as the x-axis:
//!   `y1 + (y2 - y1) * Δt(start, target) / Δt(start, end)`
//! - once the reference is exhausted every remaining target is missing
//!
//! Both cursors only move forward, so alignment is O(n + m).

use crate::{
    errors::CleaningResult,
    sample::{AlignedSeries, Field, Series},
    time::{minutes_between, Timestamp},
};

/// Resample `reference` onto `targets` for each of `fields`.
///
/// `targets` must be strictly increasing. An empty reference yields an
/// all-missing result.
pub fn align(reference: &Series, targets: &[Timestamp], fields: &[Field]) -> CleaningResult<AlignedSeries> {
    let mut aligned = AlignedSeries::new(targets.to_vec())?;
    let reference_times = reference.timestamps();

    for &field in fields {
        let column = align_column(&reference_times, &reference.column(field), targets);
        aligned.insert_column(field, column)?;
    }
    Ok(aligned)
}

/// Resample one reference column onto `targets`.
///
/// `times` and `values` describe the reference and must have equal length.
pub fn align_column(times: &[Timestamp], values: &[f64], targets: &[Timestamp]) -> Vec<f64> {
    let mut out = vec![f64::NAN; targets.len()];
    let Some(first) = times.first() else {
        return out;
    };

    let mut i = 0;
    while i < targets.len() && targets[i] < *first {
        i += 1;
    }

    let mut s = 0;
    while i < targets.len() {
        while s < times.len() && times[s] < targets[i] {
            s += 1;
        }
        if s >= times.len() {
            // Reached the end of the reference
            break;
        }

        out[i] = if times[s] == targets[i] {
            values[s]
        } else {
            // times[s-1] < targets[i] < times[s]; s ≥ 1 since targets[i] ≥ times[0]
            let start = &times[s - 1];
            let duration = minutes_between(start, &times[s]);
            let elapsed = minutes_between(start, &targets[i]);
            let (y1, y2) = (values[s - 1], values[s]);
            y1 + (y2 - y1) * (elapsed / duration)
        };
        i += 1;
    }
    out
}
