//! Blocking HTTP Client Shared by the Connectors
//!
//! ## Overview
//!
//! A thin layer over a `ureq::Agent`: base URL, timeout, user agent and
//! authentication are fixed at construction, every call returns the body
//! as a string or a [`ConnectorError`].
//!
//! ## Implementation Choices
//!
//! - Blocking I/O: one run, one thread, a handful of requests
//! - One attempt per call, no backoff: the scheduler re-runs the pipeline
//! - The timeout covers connect and read, so no call blocks indefinitely
//!
//! ## Example Usage
//!
//! ```no_run
//! use meteoclean_connectors::http::{HttpClient, HttpConfig};
//!
//! let client = HttpClient::new(
//!     HttpConfig::new("http://localhost:8086")
//!         .basic_auth("collector", "secret")
//!         .timeout_secs(10),
//! )?;
//! let body = client.get("/query", &[("q", "SHOW DATABASES")])?;
//! # Ok::<(), meteoclean_connectors::ConnectorError>(())
//! ```

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::debug;
use meteoclean_core::constants::DEFAULT_QUERY_TIMEOUT_SECS;

use crate::ConnectorError;

/// Authentication methods
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// No authentication
    None,
    /// Basic authentication
    Basic {
        /// User name
        username: String,
        /// Password
        password: String,
    },
}

// Keep passwords out of debug output
impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::None => f.write_str("None"),
            AuthMethod::Basic { username, .. } => {
                f.debug_struct("Basic").field("username", username).finish_non_exhaustive()
            }
        }
    }
}

/// HTTP configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Authentication method
    pub auth: AuthMethod,
    /// User agent string
    pub user_agent: String,
}

impl HttpConfig {
    /// Create new configuration with base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            auth: AuthMethod::None,
            user_agent: format!("MeteoClean/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set basic authentication
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Set request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

/// HTTP client using the lightweight ureq agent
#[derive(Debug, Clone)]
pub struct HttpClient {
    config: HttpConfig,
    agent: ureq::Agent,
}

impl HttpClient {
    /// Create new HTTP client
    pub fn new(config: HttpConfig) -> Result<Self, ConnectorError> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(ConnectorError::Config(format!(
                "base URL must start with http:// or https://, got '{}'",
                config.base_url
            )));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();

        Ok(Self { config, agent })
    }

    /// Configuration in use
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Send GET request with query parameters
    pub fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<String, ConnectorError> {
        let request = self.build_request("GET", path, params);
        Self::execute(request.call())
    }

    /// Send POST request with a text body
    pub fn post(
        &self,
        path: &str,
        params: &[(&str, &str)],
        content_type: &str,
        body: &str,
    ) -> Result<String, ConnectorError> {
        let request = self
            .build_request("POST", path, params)
            .set("Content-Type", content_type);
        Self::execute(request.send_string(body))
    }

    /// Build request with authentication and parameters
    fn build_request(&self, method: &str, path: &str, params: &[(&str, &str)]) -> ureq::Request {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self.agent.request(method, &url);
        for (name, value) in params {
            request = request.query(name, value);
        }
        if let AuthMethod::Basic { username, password } = &self.config.auth {
            let credentials = STANDARD.encode(format!("{username}:{password}"));
            request = request.set("Authorization", &format!("Basic {credentials}"));
        }
        request
    }

    fn execute(response: Result<ureq::Response, ureq::Error>) -> Result<String, ConnectorError> {
        match response {
            Ok(resp) => resp
                .into_string()
                .map_err(|e| ConnectorError::Decode(e.to_string())),
            Err(ureq::Error::Status(status, resp)) => Err(ConnectorError::Status {
                status,
                message: resp.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(e)) => Err(ConnectorError::Request(e.to_string())),
        }
    }
}
