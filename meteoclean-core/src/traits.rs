//! Collaborator traits
//!
//! The pipeline reaches the outside world only through these traits.
//! Keep them narrow - a store needs four calls, a feed one, a sink one.

use core::fmt;
use core::ops::Bound;
use std::collections::BTreeSet;

use log::{info, warn};

use crate::errors::{FeedError, StoreError};
use crate::sample::{Field, Sample, Series};
use crate::time::{format_timestamp, Timestamp, Watermark};

/// Time filter of a query, bounded independently at each end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Lower bound
    pub start: Bound<Timestamp>,
    /// Upper bound
    pub end: Bound<Timestamp>,
}

impl TimeRange {
    /// No time filter
    pub const fn all() -> Self {
        Self { start: Bound::Unbounded, end: Bound::Unbounded }
    }

    /// Everything strictly after the watermark (everything for `Start`)
    pub fn after(watermark: Watermark) -> Self {
        let start = match watermark {
            Watermark::Start => Bound::Unbounded,
            Watermark::At(t) => Bound::Excluded(t),
        };
        Self { start, end: Bound::Unbounded }
    }

    /// Strictly after `watermark`, up to and including `until`
    pub fn after_until(watermark: Watermark, until: Timestamp) -> Self {
        Self { end: Bound::Included(until), ..Self::after(watermark) }
    }

    /// Exactly one instant
    pub const fn at(timestamp: Timestamp) -> Self {
        Self { start: Bound::Included(timestamp), end: Bound::Included(timestamp) }
    }

    /// Closed interval
    pub const fn between(start: Timestamp, end: Timestamp) -> Self {
        Self { start: Bound::Included(start), end: Bound::Included(end) }
    }

    /// Whether `t` passes the filter
    pub fn contains(&self, t: &Timestamp) -> bool {
        let above = match &self.start {
            Bound::Unbounded => true,
            Bound::Included(s) => t >= s,
            Bound::Excluded(s) => t > s,
        };
        let below = match &self.end {
            Bound::Unbounded => true,
            Bound::Included(e) => t <= e,
            Bound::Excluded(e) => t < e,
        };
        above && below
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.start {
            Bound::Unbounded => f.write_str("(-∞")?,
            Bound::Included(t) => write!(f, "[{}", format_timestamp(t))?,
            Bound::Excluded(t) => write!(f, "({}", format_timestamp(t))?,
        }
        match &self.end {
            Bound::Unbounded => f.write_str(", ∞)"),
            Bound::Included(t) => write!(f, ", {}]", format_timestamp(t)),
            Bound::Excluded(t) => write!(f, ", {})", format_timestamp(t)),
        }
    }
}

/// A read against the time-series store
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesQuery {
    /// Measurement (table) to read
    pub measurement: String,
    /// Source tag filter
    pub source: Option<String>,
    /// Time filter
    pub range: TimeRange,
    /// Fields to return; the others come back missing
    pub fields: Vec<Field>,
}

impl SeriesQuery {
    /// All fields, all time, any source
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            source: None,
            range: TimeRange::all(),
            fields: Field::ALL.to_vec(),
        }
    }

    /// Restrict to one source tag
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Restrict the time range
    pub fn range(mut self, range: TimeRange) -> Self {
        self.range = range;
        self
    }

    /// Restrict the returned fields
    pub fn fields(mut self, fields: &[Field]) -> Self {
        self.fields = fields.to_vec();
        self
    }
}

/// Append/query backend holding raw, convolution and cleaned series
pub trait TimeSeriesStore {
    /// Samples matching the query, oldest first.
    ///
    /// A record lacking a requested field is [`StoreError::MissingField`].
    fn query(&self, query: &SeriesQuery) -> Result<Series, StoreError>;

    /// Append a series to `measurement`, tagged with its source if it has one.
    ///
    /// Rewriting a sample at an existing timestamp replaces it.
    fn write(&mut self, measurement: &str, series: &Series) -> Result<(), StoreError>;

    /// Names of the measurements that hold data
    fn list_measurements(&self) -> Result<BTreeSet<String>, StoreError>;

    /// Timestamp of the newest record in `measurement`, optionally per source
    fn latest_timestamp(&self, measurement: &str, source: Option<&str>) -> Result<Option<Timestamp>, StoreError>;
}

impl<T: TimeSeriesStore + ?Sized> TimeSeriesStore for &mut T {
    fn query(&self, query: &SeriesQuery) -> Result<Series, StoreError> {
        (**self).query(query)
    }

    fn write(&mut self, measurement: &str, series: &Series) -> Result<(), StoreError> {
        (**self).write(measurement, series)
    }

    fn list_measurements(&self) -> Result<BTreeSet<String>, StoreError> {
        (**self).list_measurements()
    }

    fn latest_timestamp(&self, measurement: &str, source: Option<&str>) -> Result<Option<Timestamp>, StoreError> {
        (**self).latest_timestamp(measurement, source)
    }
}

/// External weather observation source
pub trait ReferenceFeed {
    /// Most recent observation (temperature and humidity)
    fn latest(&self) -> Result<Sample, FeedError>;
}

/// Run status shown on a display or indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// A run is in progress
    Measuring,
    /// Last run finished
    Idle,
    /// Last run failed
    Error,
}

impl Status {
    /// Lowercase name
    pub const fn name(&self) -> &'static str {
        match self {
            Status::Measuring => "measuring",
            Status::Idle => "idle",
            Status::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fire-and-forget status receiver
///
/// Implementations must not fail the run: delivery problems are logged
/// and swallowed.
pub trait StatusSink {
    /// Report a status change
    fn signal(&self, status: Status);
}

impl<T: StatusSink + ?Sized> StatusSink for &T {
    fn signal(&self, status: Status) {
        (**self).signal(status)
    }
}

/// Status sink that writes to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn signal(&self, status: Status) {
        match status {
            Status::Error => warn!("status: {}", status),
            _ => info!("status: {}", status),
        }
    }
}

/// Status sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStatusSink;

impl StatusSink for NullStatusSink {
    fn signal(&self, _status: Status) {}
}
