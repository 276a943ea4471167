//! Configuration file
//!
//! One JSON file, read once at start-up. Every section is optional:
//!
//! ```json
//! {
//!   "store": { "url": "http://192.168.1.124:8086", "database": "db",
//!              "username": "collector", "timeout_secs": 10 },
//!   "sources": { "primary": "sensehat", "reference": "meteosuisse" },
//!   "measurements": { "raw": "data", "convolution": "convol_signals", "cleaned": "clean_data" },
//!   "thresholds": { "humidity": 7.0 },
//!   "reference_margin_minutes": 60,
//!   "feed": { "station": "MAS", "utc_offset_minutes": 60 },
//!   "status": { "url": "http://localhost:8000/status" }
//! }
//! ```
//!
//! The store password is better kept out of the file: `METEOCLEAN_STORE_PASSWORD`
//! overrides `store.password`.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use meteoclean_connectors::{influx::InfluxConfig, meteoswiss::FeedConfig, status::StatusConfig};
use meteoclean_core::{pipeline::PipelineConfig, Field};

/// Environment variable overriding the store password
pub const PASSWORD_ENV: &str = "METEOCLEAN_STORE_PASSWORD";

/// Whole configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// InfluxDB connection
    pub store: InfluxConfig,
    /// Sources, measurements, thresholds and reference margin
    #[serde(flatten)]
    pub pipeline: PipelineConfig,
    /// Reference feed
    pub feed: FeedConfig,
    /// Optional status endpoint
    pub status: Option<StatusConfig>,
}

impl Config {
    /// Read, override from the environment and validate
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config = Self::from_json(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse without touching the environment
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Apply overrides from `lookup` (the process environment in production)
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(password) = lookup(PASSWORD_ENV).filter(|p| !p.is_empty()) {
            self.store.password = Some(password);
        }
    }

    /// Reject settings no run could succeed with
    pub fn validate(&self) -> Result<()> {
        let pipeline = &self.pipeline;
        if pipeline.reference_margin_minutes < 0 {
            bail!(
                "reference_margin_minutes must not be negative, got {}",
                pipeline.reference_margin_minutes
            );
        }
        if pipeline.sources.primary == pipeline.sources.reference {
            bail!("primary and reference sources are both '{}'", pipeline.sources.primary);
        }
        let m = &pipeline.measurements;
        if m.raw == m.convolution || m.raw == m.cleaned || m.convolution == m.cleaned {
            bail!("raw, convolution and cleaned measurements must be distinct");
        }
        if self.store.timeout_secs == 0 || self.feed.timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }
        for field in Field::ALL {
            let threshold = pipeline.thresholds.get(field);
            if !threshold.is_finite() || threshold < 0.0 {
                bail!(
                    "threshold for {} must be a finite non-negative number, got {}",
                    field,
                    threshold
                );
            }
        }
        Ok(())
    }
}
