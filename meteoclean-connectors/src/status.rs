//! HTTP Status Indicator
//!
//! Posts each run status to a small HTTP endpoint (an LED matrix driver on
//! the Pi, a dashboard, a push gateway) as JSON:
//!
//! ```json
//! {"status":"measuring","source":"sensehat"}
//! ```
//!
//! Delivery is best effort. Failures are logged at `warn` and dropped.

use log::warn;
use serde::{Deserialize, Serialize};

use meteoclean_core::{
    constants::{DEFAULT_QUERY_TIMEOUT_SECS, PRIMARY_SOURCE},
    traits::{Status, StatusSink},
};

use crate::{
    http::{HttpClient, HttpConfig},
    ConnectorError,
};

/// Indicator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatusConfig {
    /// Endpoint receiving the POST
    pub url: String,
    /// Source reported alongside the status
    pub source: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/status".into(),
            source: PRIMARY_SOURCE.into(),
            timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

#[derive(Serialize)]
struct StatusMessage<'a> {
    status: &'a str,
    source: &'a str,
}

/// [`StatusSink`] posting to an HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpStatusSink {
    client: HttpClient,
    source: String,
}

impl HttpStatusSink {
    /// Create a sink; invalid URLs are rejected here, not on first signal
    pub fn new(config: StatusConfig) -> Result<Self, ConnectorError> {
        let client = HttpClient::new(HttpConfig::new(&config.url).timeout_secs(config.timeout_secs))?;
        Ok(Self { client, source: config.source })
    }

    fn send(&self, status: Status) -> Result<(), ConnectorError> {
        let body = serde_json::to_string(&StatusMessage {
            status: status.name(),
            source: &self.source,
        })
        .map_err(|e| ConnectorError::Decode(e.to_string()))?;
        self.client.post("", &[], "application/json", &body)?;
        Ok(())
    }
}

impl StatusSink for HttpStatusSink {
    fn signal(&self, status: Status) {
        if let Err(e) = self.send(status) {
            warn!("status '{}' not delivered: {}", status, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::one_shot_server;

    #[test]
    fn posts_status() {
        let (url, server) = one_shot_server("204 No Content", "");
        let sink = HttpStatusSink::new(StatusConfig { url, ..StatusConfig::default() }).unwrap();

        assert!(sink.send(Status::Measuring).is_ok());
        let head = server.join().unwrap();
        assert!(head.starts_with("POST / "));
        assert!(head.to_ascii_lowercase().contains("content-type: application/json"));
    }

    #[test]
    fn unreachable_endpoint_does_not_panic() {
        // Port 9 (discard) is closed on test machines
        let sink = HttpStatusSink::new(StatusConfig {
            url: "http://127.0.0.1:9".into(),
            timeout_secs: 1,
            ..StatusConfig::default()
        })
        .unwrap();
        assert!(sink.send(Status::Error).is_err());
        sink.signal(Status::Error);
    }

    #[test]
    fn rejects_bad_url() {
        let config = StatusConfig { url: "led-matrix".into(), ..StatusConfig::default() };
        assert!(HttpStatusSink::new(config).is_err());
    }
}
