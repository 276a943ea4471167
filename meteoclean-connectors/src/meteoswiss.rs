//! MeteoSwiss Open-Data Reference Feed
//!
//! ## Overview
//!
//! MeteoSwiss publishes the current ten-minute observations of every
//! automatic station as one CSV file (source: MeteoSwiss, Federal Office of
//! Meteorology and Climatology). The feed reads one station's row:
//!
//! ```text
//! MeteoSchweiz / MeteoSuisse / MeteoSvizzera / MeteoSwiss      ← preamble
//!                                                               ← preamble
//! stn;time;tre200s0;rre150z0;sre000z0;gre000z0;ure200s0;...     ← header
//! MAS;202003181000;11.4;0.0;10;452;63.1;...                    ← rows
//! ```
//!
//! | Column     | Meaning                                 |
//! |------------|-----------------------------------------|
//! | `stn`      | Station abbreviation                    |
//! | `time`     | Observation time, `YYYYMMDDHHmm`         |
//! | `tre200s0` | Air temperature 2 m above ground (°C)   |
//! | `ure200s0` | Relative humidity 2 m above ground (%)  |
//!
//! Stations report `-` when a sensor is out; that is a malformed sample,
//! never a default value. The station only measures temperature and
//! humidity, the other three fields are written as `0.0`.
//!
//! ## Time Base
//!
//! The published time is shifted by `utc_offset_minutes` before use, so the
//! observation lands on the same UTC axis as the sensor samples.

use chrono::{Duration, NaiveDateTime, TimeZone, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use meteoclean_core::{
    constants::DEFAULT_QUERY_TIMEOUT_SECS,
    errors::FeedError,
    sample::{FieldValues, Sample},
    traits::ReferenceFeed,
};

use crate::{
    http::{HttpClient, HttpConfig},
    ConnectorError,
};

/// Current observations of all automatic stations
pub const DEFAULT_FEED_URL: &str =
    "https://data.geo.admin.ch/ch.meteoschweiz.messwerte-aktuell/VQHA80.csv";

/// Default station abbreviation
pub const DEFAULT_STATION: &str = "MAS";

/// Offset subtracted from the published observation time
pub const DEFAULT_UTC_OFFSET_MINUTES: i64 = 60;

const STATION_COLUMN: &str = "stn";
const TIME_COLUMN: &str = "time";
const TEMPERATURE_COLUMN: &str = "tre200s0";
const HUMIDITY_COLUMN: &str = "ure200s0";
const MISSING_VALUE: &str = "-";

/// Feed settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    /// CSV location
    pub url: String,
    /// Station abbreviation
    pub station: String,
    /// Minutes subtracted from the published time
    pub utc_offset_minutes: i64,
    /// Lines before the header row
    pub preamble_lines: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.into(),
            station: DEFAULT_STATION.into(),
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            preamble_lines: 2,
            timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

/// [`ReferenceFeed`] reading the MeteoSwiss current-observations CSV
#[derive(Debug, Clone)]
pub struct MeteoSwissFeed {
    client: HttpClient,
    config: FeedConfig,
}

impl MeteoSwissFeed {
    /// Create a feed; the CSV is fetched on every [`ReferenceFeed::latest`]
    pub fn new(config: FeedConfig) -> Result<Self, ConnectorError> {
        let client = HttpClient::new(HttpConfig::new(&config.url).timeout_secs(config.timeout_secs))?;
        Ok(Self { client, config })
    }
}

impl ReferenceFeed for MeteoSwissFeed {
    fn latest(&self) -> Result<Sample, FeedError> {
        let body = self.client.get("", &[])?;
        debug!("fetched {} bytes of observations", body.len());
        parse_observation(&body, &self.config)
    }
}

/// Extract the configured station's observation from the CSV body
pub fn parse_observation(csv: &str, config: &FeedConfig) -> Result<Sample, FeedError> {
    let mut lines = csv.lines().skip(config.preamble_lines).filter(|l| !l.trim().is_empty());
    let header: Vec<&str> = lines
        .next()
        .ok_or_else(|| FeedError::Malformed("no header row".into()))?
        .split(';')
        .map(str::trim)
        .collect();

    let column = |name: &str| {
        header
            .iter()
            .position(|c| *c == name)
            .ok_or_else(|| FeedError::Malformed(format!("no '{name}' column")))
    };
    let (stn, time, temperature, humidity) = (
        column(STATION_COLUMN)?,
        column(TIME_COLUMN)?,
        column(TEMPERATURE_COLUMN)?,
        column(HUMIDITY_COLUMN)?,
    );

    let row: Vec<&str> = lines
        .map(|l| l.split(';').map(str::trim).collect::<Vec<_>>())
        .find(|cells| cells.get(stn) == Some(&config.station.as_str()))
        .ok_or_else(|| FeedError::Malformed(format!("station '{}' not in feed", config.station)))?;

    let station = config.station.as_str();
    let published = cell(&row, time, "time", station)?;
    let naive = NaiveDateTime::parse_from_str(published, "%Y%m%d%H%M")
        .map_err(|e| FeedError::Malformed(format!("time '{published}': {e}")))?;
    let timestamp = Utc.from_utc_datetime(&naive) - Duration::minutes(config.utc_offset_minutes);

    let values = FieldValues::new(
        number(&row, temperature, "temperature", station)?,
        0.0,
        0.0,
        number(&row, humidity, "humidity", station)?,
        0.0,
    );
    Ok(Sample::new(timestamp, values))
}

fn cell<'a>(row: &[&'a str], index: usize, name: &str, station: &str) -> Result<&'a str, FeedError> {
    match row.get(index) {
        Some(&value) if value != MISSING_VALUE && !value.is_empty() => Ok(value),
        _ => Err(FeedError::Malformed(format!("station '{station}' reports no {name}"))),
    }
}

fn number(row: &[&str], index: usize, name: &str, station: &str) -> Result<f64, FeedError> {
    let text = cell(row, index, name, station)?;
    text.parse()
        .map_err(|_| FeedError::Malformed(format!("{name} '{text}' is not a number")))
}
