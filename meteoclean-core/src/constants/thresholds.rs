//! Anomaly Thresholds
//!
//! A derivative sample whose magnitude strictly exceeds its field's
//! threshold marks that (timestamp, field) as anomalous.
//!
//! Values are in the field's own unit per sampling interval, tuned for a
//! Sense HAT sampled every ten minutes.

use serde::{Deserialize, Serialize};

use crate::sample::Field;

/// Largest plausible temperature step between consecutive samples (°C).
pub const TEMPERATURE_THRESHOLD_C: f64 = 5.0;

/// Largest plausible step of the pressure-sensor temperature (°C).
pub const TEMPERATURE_PRESSURE_THRESHOLD_C: f64 = 5.0;

/// Largest plausible step of the humidity-sensor temperature (°C).
pub const TEMPERATURE_HUMIDITY_THRESHOLD_C: f64 = 5.0;

/// Largest plausible relative humidity step (%RH).
pub const HUMIDITY_THRESHOLD_PCT: f64 = 7.0;

/// Largest plausible pressure step (hPa).
///
/// Weather fronts move pressure by a few hPa per hour at most.
pub const PRESSURE_THRESHOLD_HPA: f64 = 1.0;

/// Per-field threshold table
///
/// Static configuration. Deserialising a partial table keeps the defaults
/// for the fields it does not mention:
///
/// ```rust
/// use meteoclean_core::{Field, Thresholds};
///
/// let table: Thresholds = serde_json::from_str(r#"{ "pressure": 2.5 }"#).unwrap();
/// assert_eq!(table.get(Field::Pressure), 2.5);
/// assert_eq!(table.get(Field::Humidity), 7.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    /// Primary temperature
    pub temperature: f64,
    /// Temperature reported by the pressure sensor
    pub temperature_pressure: f64,
    /// Temperature reported by the humidity sensor
    pub temperature_humidity: f64,
    /// Relative humidity
    pub humidity: f64,
    /// Barometric pressure
    pub pressure: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temperature: TEMPERATURE_THRESHOLD_C,
            temperature_pressure: TEMPERATURE_PRESSURE_THRESHOLD_C,
            temperature_humidity: TEMPERATURE_HUMIDITY_THRESHOLD_C,
            humidity: HUMIDITY_THRESHOLD_PCT,
            pressure: PRESSURE_THRESHOLD_HPA,
        }
    }
}

impl Thresholds {
    /// Threshold for one field
    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::Temperature => self.temperature,
            Field::TemperaturePressure => self.temperature_pressure,
            Field::TemperatureHumidity => self.temperature_humidity,
            Field::Humidity => self.humidity,
            Field::Pressure => self.pressure,
        }
    }

    /// Override one field's threshold
    pub fn with(mut self, field: Field, value: f64) -> Self {
        let slot = match field {
            Field::Temperature => &mut self.temperature,
            Field::TemperaturePressure => &mut self.temperature_pressure,
            Field::TemperatureHumidity => &mut self.temperature_humidity,
            Field::Humidity => &mut self.humidity,
            Field::Pressure => &mut self.pressure,
        };
        *slot = value.abs();
        self
    }

    /// Whether a derivative value marks an anomaly for `field`
    pub fn exceeded(&self, field: Field, derivative: f64) -> bool {
        derivative.abs() > self.get(field)
    }
}
