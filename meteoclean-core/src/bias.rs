//! Bias Adjustment Against the Reference Feed
//!
//! The Sense HAT sits next to a warm Raspberry Pi and reads high. Over the
//! overlap with the aligned reference series the mean offset is estimated
//! per field and subtracted from the cleaned series:
//!
//! ```text
//! offset[f] = mean over i of (primary[f][i] - reference[f][i])
//!             (indices where either side is missing are ignored)
//! ```
//!
//! Temperature's offset also applies to the two proxy temperatures.
//! Pressure is never adjusted: the station does not report it.

use crate::{
    errors::{CleaningError, CleaningResult},
    sample::{AlignedSeries, Field, Series},
};

/// Fields compared against the reference feed
pub const BIAS_FIELDS: [Field; 2] = [Field::Temperature, Field::Humidity];

/// Per-field mean offsets; `None` when the overlap is empty for that field
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BiasOffsets {
    /// Temperature offset (°C), applied to all three temperature fields
    pub temperature: Option<f64>,
    /// Humidity offset (%RH)
    pub humidity: Option<f64>,
}

impl BiasOffsets {
    /// Offset subtracted from `field`
    pub fn for_field(&self, field: Field) -> Option<f64> {
        match field {
            Field::Temperature | Field::TemperaturePressure | Field::TemperatureHumidity => {
                self.temperature
            }
            Field::Humidity => self.humidity,
            Field::Pressure => None,
        }
    }

    /// Whether no offset could be estimated
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.humidity.is_none()
    }
}

/// Mean of `primary - reference` over indices where both are present
pub fn mean_offset(primary: &[f64], reference: &[f64]) -> Option<f64> {
    let (sum, n) = primary
        .iter()
        .zip(reference)
        .filter(|(p, r)| !p.is_nan() && !r.is_nan())
        .fold((0.0, 0usize), |(sum, n), (p, r)| (sum + (p - r), n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Estimate offsets of `primary` against `reference` on the same grid
pub fn compute_offsets(primary: &Series, reference: &AlignedSeries) -> CleaningResult<BiasOffsets> {
    let grid = primary.timestamps();
    if grid.len() != reference.len() {
        return Err(CleaningError::LengthMismatch {
            expected: grid.len(),
            actual: reference.len(),
        });
    }
    if let Some(index) = grid.iter().zip(reference.timestamps()).position(|(a, b)| a != b) {
        return Err(CleaningError::TimestampMismatch { index });
    }

    let offset = |field: Field| {
        reference
            .column(field)
            .and_then(|r| mean_offset(&primary.column(field), r))
    };
    Ok(BiasOffsets {
        temperature: offset(Field::Temperature),
        humidity: offset(Field::Humidity),
    })
}

/// Subtract `offsets` from `series`
pub fn apply_offsets(series: &Series, offsets: &BiasOffsets) -> CleaningResult<Series> {
    let mut adjusted = series.clone();
    for field in Field::ALL {
        if let Some(offset) = offsets.for_field(field) {
            let shifted: Vec<f64> = adjusted.column(field).iter().map(|v| v - offset).collect();
            adjusted = adjusted.with_column(field, &shifted)?;
        }
    }
    Ok(adjusted)
}
