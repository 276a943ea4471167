//! Timestamps and watermarks
//!
//! All samples are stamped in UTC at second resolution. The store speaks
//! RFC 3339; everything inside the crate uses [`Timestamp`] and its native
//! ordering and subtraction.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use core::fmt;

use crate::constants::time::SECONDS_PER_MINUTE;

/// UTC timestamp, second resolution
pub type Timestamp = DateTime<Utc>;

/// Parse an RFC 3339 timestamp, truncated to whole seconds
pub fn parse_timestamp(text: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc).trunc_subsecs(0))
}

/// Format as `YYYY-MM-DDTHH:MM:SSZ`
pub fn format_timestamp(timestamp: &Timestamp) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Elapsed minutes from `start` to `end`, negative if `end` is earlier.
///
/// Works across day, month and year boundaries since it is a plain
/// duration computation.
pub fn minutes_between(start: &Timestamp, end: &Timestamp) -> f64 {
    (*end - *start).num_seconds() as f64 / SECONDS_PER_MINUTE as f64
}

/// Progress marker for incremental cleaning
///
/// Derived from the store on every run, never kept in a side file. Moves
/// forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Watermark {
    /// Nothing processed yet: start from the beginning of the raw data
    Start,
    /// Everything up to and including this timestamp has been processed
    At(Timestamp),
}

impl Watermark {
    /// Watermark from an optional "latest timestamp" lookup
    pub fn from_latest(latest: Option<Timestamp>) -> Self {
        latest.map_or(Watermark::Start, Watermark::At)
    }

    /// Timestamp of the last processed sample, if any
    pub fn timestamp(&self) -> Option<Timestamp> {
        match self {
            Watermark::Start => None,
            Watermark::At(t) => Some(*t),
        }
    }

    /// Whether a sample at `timestamp` lies beyond this watermark
    pub fn admits(&self, timestamp: &Timestamp) -> bool {
        match self {
            Watermark::Start => true,
            Watermark::At(t) => timestamp > t,
        }
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Watermark::Start => f.write_str("start"),
            Watermark::At(t) => f.write_str(&format_timestamp(t)),
        }
    }
}
