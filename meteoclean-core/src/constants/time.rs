//! Time Constants
//!
//! Conversions and default durations for queries and alignment windows.

/// Seconds in one minute.
pub const SECONDS_PER_MINUTE: u32 = 60;

/// Bound on a single store query or feed fetch (seconds).
///
/// A timed-out call fails the run; the next scheduled run retries.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 10;

/// Reference data fetched around the batch (minutes).
///
/// The weather station reports every ten minutes, so one hour on each side
/// is enough to interpolate the first and last sensor samples.
pub const DEFAULT_REFERENCE_MARGIN_MINUTES: i64 = 60;
