//! Samples and Series
//!
//! ## Data Model
//!
//! A [`Sample`] is one timestamped reading across the five monitored fields.
//! A [`Series`] is a time-ordered run of samples from one source:
//!
//! ```text
//! Series (source = "sensehat")
//! ┌──────────────────────┬──────┬──────┬──────┬──────┬────────┐
//! │ timestamp            │ temp │ t_p  │ t_h  │ hum  │ press  │
//! ├──────────────────────┼──────┼──────┼──────┼──────┼────────┤
//! │ 2020-03-18T10:00:00Z │ 21.3 │ 20.8 │ 21.1 │ 41.0 │ 1012.4 │  ← index 0 (oldest)
//! │ 2020-03-18T10:10:00Z │ 21.4 │ 20.9 │ 21.2 │ 40.7 │ 1012.3 │
//! └──────────────────────┴──────┴──────┴──────┴──────┴────────┘
//! ```
//!
//! Series are values: every pipeline step takes one by reference and
//! returns a new one, nothing is patched in place across steps.
//!
//! ## Missing Values
//!
//! NaN is the missing sentinel. It shows up where a field was not requested
//! from the store and in [`AlignedSeries`] wherever the reference feed does
//! not cover a target timestamp.

use core::fmt;
use core::ops::{Index, IndexMut};
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{CleaningError, CleaningResult};
use crate::time::Timestamp;

/// Monitored field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Primary temperature (°C)
    Temperature,
    /// Temperature from the pressure sensor (°C)
    TemperaturePressure,
    /// Temperature from the humidity sensor (°C)
    TemperatureHumidity,
    /// Relative humidity (%)
    Humidity,
    /// Barometric pressure (hPa)
    Pressure,
}

impl Field {
    /// Number of monitored fields
    pub const COUNT: usize = 5;

    /// All fields, in store order
    pub const ALL: [Field; Field::COUNT] = [
        Field::Temperature,
        Field::TemperaturePressure,
        Field::TemperatureHumidity,
        Field::Humidity,
        Field::Pressure,
    ];

    /// Name used as the store column
    pub const fn name(&self) -> &'static str {
        match self {
            Field::Temperature => "temperature",
            Field::TemperaturePressure => "temperature_pressure",
            Field::TemperatureHumidity => "temperature_humidity",
            Field::Humidity => "humidity",
            Field::Pressure => "pressure",
        }
    }

    /// Parse a store column name
    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.name() == name)
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value per field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldValues([f64; Field::COUNT]);

impl FieldValues {
    /// Every field missing
    pub const fn missing() -> Self {
        Self([f64::NAN; Field::COUNT])
    }

    /// Build from explicit values
    pub const fn new(
        temperature: f64,
        temperature_pressure: f64,
        temperature_humidity: f64,
        humidity: f64,
        pressure: f64,
    ) -> Self {
        Self([temperature, temperature_pressure, temperature_humidity, humidity, pressure])
    }

    /// Same value in every field
    pub const fn splat(value: f64) -> Self {
        Self([value; Field::COUNT])
    }

    /// Value of one field
    pub fn get(&self, field: Field) -> f64 {
        self.0[field.index()]
    }

    /// Overwrite one field
    pub fn set(&mut self, field: Field, value: f64) {
        self.0[field.index()] = value;
    }

    /// Copy with one field replaced
    pub fn with(mut self, field: Field, value: f64) -> Self {
        self.set(field, value);
        self
    }

    /// Fields paired with their values, in store order
    pub fn iter(&self) -> impl Iterator<Item = (Field, f64)> + '_ {
        Field::ALL.into_iter().map(move |f| (f, self.get(f)))
    }
}

impl Default for FieldValues {
    fn default() -> Self {
        Self::missing()
    }
}

impl Index<Field> for FieldValues {
    type Output = f64;

    fn index(&self, field: Field) -> &f64 {
        &self.0[field.index()]
    }
}

impl IndexMut<Field> for FieldValues {
    fn index_mut(&mut self, field: Field) -> &mut f64 {
        &mut self.0[field.index()]
    }
}

/// One timestamped reading across all fields
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// UTC, second resolution
    pub timestamp: Timestamp,
    /// Field values
    pub values: FieldValues,
}

impl Sample {
    /// Create a sample
    pub fn new(timestamp: Timestamp, values: FieldValues) -> Self {
        Self { timestamp, values }
    }

    /// Value of one field
    pub fn get(&self, field: Field) -> f64 {
        self.values.get(field)
    }
}

/// Time-ordered samples from one source
///
/// Invariant: timestamps strictly increase with the index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    source: Option<String>,
    samples: Vec<Sample>,
}

impl Series {
    /// Build a series, checking timestamp order
    pub fn new(source: Option<String>, samples: Vec<Sample>) -> CleaningResult<Self> {
        check_increasing(samples.iter().map(|s| &s.timestamp))?;
        Ok(Self { source, samples })
    }

    /// Series with no samples
    pub fn empty(source: Option<String>) -> Self {
        Self { source, samples: Vec::new() }
    }

    /// Source tag, if the series carries one
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Same samples under another source tag
    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    /// Samples, oldest first
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Take the samples out
    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the series has no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Oldest sample
    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    /// Newest sample
    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Timestamp grid of the series
    pub fn timestamps(&self) -> Vec<Timestamp> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    /// Values of one field, oldest first
    pub fn column(&self, field: Field) -> Vec<f64> {
        self.samples.iter().map(|s| s.get(field)).collect()
    }

    /// Copy with one field's values replaced
    pub fn with_column(mut self, field: Field, values: &[f64]) -> CleaningResult<Self> {
        if values.len() != self.samples.len() {
            return Err(CleaningError::LengthMismatch {
                expected: self.samples.len(),
                actual: values.len(),
            });
        }
        for (sample, value) in self.samples.iter_mut().zip(values) {
            sample.values.set(field, *value);
        }
        Ok(self)
    }

    /// Check that `other` is stamped exactly like this series
    pub fn check_same_grid(&self, other: &Series) -> CleaningResult<()> {
        if other.len() != self.len() {
            return Err(CleaningError::LengthMismatch {
                expected: self.len(),
                actual: other.len(),
            });
        }
        match self
            .samples
            .iter()
            .zip(other.samples())
            .position(|(a, b)| a.timestamp != b.timestamp)
        {
            Some(index) => Err(CleaningError::TimestampMismatch { index }),
            None => Ok(()),
        }
    }
}

/// Reference values resampled onto a target timestamp grid
///
/// Holds exactly one value per target timestamp for each aligned field;
/// NaN where the reference does not cover the timestamp.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignedSeries {
    timestamps: Vec<Timestamp>,
    columns: BTreeMap<Field, Vec<f64>>,
}

impl AlignedSeries {
    /// Grid with no columns yet
    pub fn new(timestamps: Vec<Timestamp>) -> CleaningResult<Self> {
        check_increasing(timestamps.iter())?;
        Ok(Self { timestamps, columns: BTreeMap::new() })
    }

    /// Attach a column, which must match the grid length
    pub fn insert_column(&mut self, field: Field, values: Vec<f64>) -> CleaningResult<()> {
        if values.len() != self.timestamps.len() {
            return Err(CleaningError::LengthMismatch {
                expected: self.timestamps.len(),
                actual: values.len(),
            });
        }
        self.columns.insert(field, values);
        Ok(())
    }

    /// Target grid
    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    /// Values aligned for `field`, if it was aligned
    pub fn column(&self, field: Field) -> Option<&[f64]> {
        self.columns.get(&field).map(Vec::as_slice)
    }

    /// Aligned fields
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.columns.keys().copied()
    }

    /// Grid length
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the grid is empty
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Whether any aligned value is present
    pub fn has_data(&self) -> bool {
        self.columns.values().flatten().any(|v| !v.is_nan())
    }
}

fn check_increasing<'a>(timestamps: impl Iterator<Item = &'a Timestamp>) -> CleaningResult<()> {
    let mut previous: Option<&Timestamp> = None;
    for (index, t) in timestamps.enumerate() {
        if let Some(prev) = previous {
            if t <= prev {
                return Err(CleaningError::NonMonotonic { index });
            }
        }
        previous = Some(t);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn at(minutes: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2020, 3, 18, 10, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn field_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_name(field.name()), Some(field));
        }
        assert_eq!(Field::from_name("voc"), None);
    }

    #[test]
    fn field_values_indexing() {
        let mut values = FieldValues::new(20.0, 19.5, 20.5, 40.0, 1013.0);
        assert_eq!(values[Field::TemperatureHumidity], 20.5);
        values[Field::Pressure] = 1000.0;
        assert_eq!(values.get(Field::Pressure), 1000.0);
        assert!(FieldValues::missing().get(Field::Humidity).is_nan());
    }

    #[test]
    fn series_rejects_unordered() {
        let samples = vec![
            Sample::new(at(0), FieldValues::splat(1.0)),
            Sample::new(at(10), FieldValues::splat(2.0)),
            Sample::new(at(10), FieldValues::splat(3.0)),
        ];
        assert_eq!(
            Series::new(None, samples),
            Err(CleaningError::NonMonotonic { index: 2 })
        );
    }

    #[test]
    fn column_replacement() {
        let series = Series::new(
            Some("sensehat".into()),
            vec![
                Sample::new(at(0), FieldValues::splat(1.0)),
                Sample::new(at(10), FieldValues::splat(2.0)),
            ],
        )
        .unwrap();

        let replaced = series.clone().with_column(Field::Humidity, &[5.0, 6.0]).unwrap();
        assert_eq!(replaced.column(Field::Humidity), vec![5.0, 6.0]);
        assert_eq!(replaced.column(Field::Pressure), vec![1.0, 2.0]);
        assert_eq!(replaced.source(), Some("sensehat"));

        assert!(series.with_column(Field::Humidity, &[5.0]).is_err());
    }

    #[test]
    fn grid_check() {
        let a = Series::new(None, vec![Sample::new(at(0), FieldValues::splat(1.0))]).unwrap();
        let b = Series::new(None, vec![Sample::new(at(1), FieldValues::splat(1.0))]).unwrap();
        assert_eq!(a.check_same_grid(&a), Ok(()));
        assert_eq!(a.check_same_grid(&b), Err(CleaningError::TimestampMismatch { index: 0 }));
        assert_eq!(
            a.check_same_grid(&Series::empty(None)),
            Err(CleaningError::LengthMismatch { expected: 1, actual: 0 })
        );
    }

    #[test]
    fn aligned_series_columns() {
        let mut aligned = AlignedSeries::new(vec![at(0), at(10)]).unwrap();
        aligned.insert_column(Field::Temperature, vec![f64::NAN, f64::NAN]).unwrap();
        assert!(!aligned.has_data());
        aligned.insert_column(Field::Humidity, vec![f64::NAN, 50.0]).unwrap();
        assert!(aligned.has_data());
        assert!(aligned.insert_column(Field::Pressure, vec![1.0]).is_err());
        assert_eq!(aligned.fields().collect::<Vec<_>>(), vec![Field::Temperature, Field::Humidity]);
    }
}
