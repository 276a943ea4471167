//! Threshold-Driven Value Correction
//!
//! ## Overview
//!
//! Every (index, field) whose derivative magnitude exceeds the field's
//! threshold is repaired. Fields are processed strictly in this order:
//!
//! ```text
//! humidity → pressure → temperature_humidity → temperature_pressure → temperature
//! ```
//!
//! The order matters: temperature is repaired by copying the *already
//! corrected* humidity-sensor temperature at the same index. The two track
//! each other closely on the Sense HAT, so the copy beats interpolation.
//!
//! ## Average Policy
//!
//! For every other field a flagged value is replaced from its neighbours:
//!
//! | previous | next | continuity | replacement                  |
//! |----------|------|------------|------------------------------|
//! | yes      | yes  | -          | mean(previous, next)         |
//! | yes      | no   | -          | previous                     |
//! | no       | yes  | yes        | mean(continuity, next)       |
//! | no       | yes  | no         | next                         |
//! | no       | no   | yes        | continuity                   |
//! | no       | no   | no         | unchanged                    |
//!
//! "previous" is the already-repaired value at `i-1`. A spike produces two
//! flags, the jump up and the jump back down. Once the spike has been
//! replaced, the jump back down no longer exceeds the threshold against the
//! repaired value and is left alone:
//!
//! ```text
//! raw         10   100    12
//! derivative   0    90   -88      (threshold 7: indices 1 and 2 flagged)
//! corrected   10    11    12      (index 2: |12 - 11| ≤ 7, kept)
//! ```

use std::collections::BTreeMap;

use log::debug;

use crate::{
    constants::thresholds::Thresholds,
    errors::CleaningResult,
    sample::{Field, Sample, Series},
};

/// How flagged values of a field are repaired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionPolicy {
    /// Interpolate from neighbouring samples
    Average,
    /// Copy the value of another field at the same index
    CopyFrom(Field),
}

/// Fields in processing order with their policies
pub const CORRECTION_ORDER: [(Field, CorrectionPolicy); Field::COUNT] = [
    (Field::Humidity, CorrectionPolicy::Average),
    (Field::Pressure, CorrectionPolicy::Average),
    (Field::TemperatureHumidity, CorrectionPolicy::Average),
    (Field::TemperaturePressure, CorrectionPolicy::Average),
    (Field::Temperature, CorrectionPolicy::CopyFrom(Field::TemperatureHumidity)),
];

/// Corrected batch plus per-field repair counts
#[derive(Debug, Clone, PartialEq)]
pub struct Corrected {
    /// The repaired series, same grid as the input
    pub series: Series,
    /// Number of values replaced per field
    pub counts: BTreeMap<Field, usize>,
}

impl Corrected {
    /// Values replaced in `field`
    pub fn count(&self, field: Field) -> usize {
        self.counts.get(&field).copied().unwrap_or(0)
    }

    /// Values replaced across all fields
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Repair the anomalies of a batch.
///
/// `signal` must be the derivative signal of `series` (same timestamps).
/// `continuity` is the last raw sample of the previous batch.
pub fn correct(
    series: &Series,
    signal: &Series,
    continuity: Option<&Sample>,
    thresholds: &Thresholds,
) -> CleaningResult<Corrected> {
    series.check_same_grid(signal)?;

    let mut working = series.clone();
    let mut counts = BTreeMap::new();

    for (field, policy) in CORRECTION_ORDER {
        let mut values = working.column(field);
        let flagged: Vec<usize> = signal
            .column(field)
            .iter()
            .enumerate()
            .filter(|(_, d)| thresholds.exceeded(field, **d))
            .map(|(i, _)| i)
            .collect();

        let repaired = match policy {
            CorrectionPolicy::Average => {
                let seed = continuity.map(|c| c.get(field)).filter(|v| !v.is_nan());
                average_repair(&mut values, &flagged, seed, thresholds.get(field))
            }
            CorrectionPolicy::CopyFrom(source) => {
                copy_repair(&mut values, &flagged, &working.column(source))
            }
        };

        if repaired > 0 {
            debug!("{}: {} of {} flagged values repaired", field, repaired, flagged.len());
        }
        counts.insert(field, repaired);
        working = working.with_column(field, &values)?;
    }

    Ok(Corrected { series: working, counts })
}

/// Neighbour-based repair, in index order. Returns the number of values changed.
pub fn average_repair(
    values: &mut [f64],
    flagged: &[usize],
    continuity: Option<f64>,
    threshold: f64,
) -> usize {
    let mut repaired = 0;
    for &i in flagged {
        let previous = i.checked_sub(1).map(|p| values[p]);
        if let Some(p) = previous {
            // Rebound from a spike that is already repaired
            if (values[i] - p).abs() <= threshold {
                continue;
            }
        }
        let next = values.get(i + 1).copied();

        let replacement = match (previous, next, continuity) {
            (Some(p), Some(n), _) => (p + n) / 2.0,
            (Some(p), None, _) => p,
            (None, Some(n), Some(c)) => (c + n) / 2.0,
            (None, Some(n), None) => n,
            (None, None, Some(c)) => c,
            (None, None, None) => continue,
        };
        debug!("index {}: {} -> {}", i, values[i], replacement);
        values[i] = replacement;
        repaired += 1;
    }
    repaired
}

/// Cross-field repair. Returns the number of values changed.
pub fn copy_repair(values: &mut [f64], flagged: &[usize], source: &[f64]) -> usize {
    let mut repaired = 0;
    for &i in flagged {
        if let Some(&v) = source.get(i) {
            debug!("index {}: {} -> {} (copied)", i, values[i], v);
            values[i] = v;
            repaired += 1;
        }
    }
    repaired
}
