//! Connectors for the MeteoClean Pipeline
//!
//! ## Overview
//!
//! `meteoclean-core` only knows its collaborators as traits. This crate
//! provides the implementations a Raspberry Pi deployment runs against:
//!
//! | Connector                   | Trait              | Feature       |
//! |-----------------------------|--------------------|---------------|
//! | [`influx::InfluxStore`]     | `TimeSeriesStore`  | `influx`      |
//! | [`meteoswiss::MeteoSwissFeed`] | `ReferenceFeed` | `meteoswiss`  |
//! | [`status::HttpStatusSink`]  | `StatusSink`       | `status-http` |
//!
//! All three speak plain HTTP through the shared [`http::HttpClient`]
//! (blocking `ureq`, bounded timeout, basic auth).
//!
//! ## Failure Policy
//!
//! Connectors never retry. A run is started by cron every few minutes and
//! resumes from the store's own markers, so the next tick is the retry:
//!
//! ```text
//! transport error / timeout  → StoreError::Unreachable  → TransientIo
//! non-2xx status             → StoreError::Rejected     → TransientIo
//! undecodable body           → StoreError::Protocol     → TransientIo
//! row lacks a requested field → StoreError::MissingField → MalformedSample
//! rows out of time order      → StoreError::Invariant    → Invariant
//! ```
//!
//! The status sink is the exception: delivery failures are logged and
//! dropped, a dark indicator must not fail a cleaning run.
//!
//! ## Example Usage
//!
//! ```no_run
//! use meteoclean_connectors::influx::{InfluxConfig, InfluxStore};
//! use meteoclean_core::TimeSeriesStore;
//!
//! let store = InfluxStore::new(InfluxConfig {
//!     url: "http://192.168.1.124:8086".into(),
//!     database: "db".into(),
//!     ..InfluxConfig::default()
//! })?;
//! println!("{:?}", store.list_measurements()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "influx")]
pub mod influx;

#[cfg(feature = "meteoswiss")]
pub mod meteoswiss;

#[cfg(feature = "status-http")]
pub mod status;

// Re-export common types
#[cfg(feature = "influx")]
pub use influx::{InfluxConfig, InfluxStore};
#[cfg(feature = "meteoswiss")]
pub use meteoswiss::{FeedConfig, MeteoSwissFeed};
#[cfg(feature = "status-http")]
pub use status::HttpStatusSink;

use meteoclean_core::errors::{FeedError, StoreError};
use thiserror::Error;

/// Common connector errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectorError {
    /// Connection refused, DNS failure, timeout
    #[error("Request failed: {0}")]
    Request(String),

    /// The server answered with a non-2xx status
    #[error("Server error {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// The response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid connector configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ConnectorError> for StoreError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Request(message) | ConnectorError::Config(message) => {
                StoreError::Unreachable(message)
            }
            ConnectorError::Status { status, message } => StoreError::Rejected { status, message },
            ConnectorError::Decode(message) => StoreError::Protocol(message),
        }
    }
}

impl From<ConnectorError> for FeedError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Decode(message) => FeedError::Malformed(message),
            other => FeedError::Unreachable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_mapping() {
        assert_eq!(
            StoreError::from(ConnectorError::Request("refused".into())),
            StoreError::Unreachable("refused".into())
        );
        assert_eq!(
            StoreError::from(ConnectorError::Status { status: 401, message: "unauthorized".into() }),
            StoreError::Rejected { status: 401, message: "unauthorized".into() }
        );
        assert!(matches!(
            StoreError::from(ConnectorError::Decode("eof".into())),
            StoreError::Protocol(_)
        ));
    }

    #[test]
    fn feed_error_mapping() {
        assert_eq!(
            FeedError::from(ConnectorError::Decode("bad row".into())),
            FeedError::Malformed("bad row".into())
        );
        assert!(matches!(
            FeedError::from(ConnectorError::Status { status: 503, message: String::new() }),
            FeedError::Unreachable(_)
        ));
    }
}
