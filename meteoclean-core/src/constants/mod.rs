//! Constants for MeteoClean Core
//!
//! Numeric values and names used throughout the pipeline, grouped by domain:
//! - **Thresholds**: anomaly thresholds per field
//! - **Store**: measurement and source tag names
//! - **Time**: time conversions and timeouts

/// Anomaly thresholds on the derivative signal.
pub mod thresholds;

/// Measurement names and source tags used in the time-series store.
pub mod store;

/// Time-related constants for conversions, timeouts and windows.
pub mod time;

pub use store::{
    CLEANED_MEASUREMENT, CONVOLUTION_MEASUREMENT, RAW_MEASUREMENT,
    PRIMARY_SOURCE, REFERENCE_SOURCE, SOURCE_TAG_KEY,
};

pub use time::{
    SECONDS_PER_MINUTE, DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_REFERENCE_MARGIN_MINUTES,
};

/// Fewest samples a batch needs before a derivative signal is computed.
///
/// Shorter batches are left in the raw store until more samples arrive.
pub const MIN_CONVOLUTION_BATCH: usize = 3;
