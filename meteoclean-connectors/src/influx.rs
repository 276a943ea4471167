//! InfluxDB 1.x Store
//!
//! ## Overview
//!
//! Implements [`TimeSeriesStore`] over the InfluxDB 1.x HTTP API:
//!
//! ```text
//! query               GET  /query?db=..&q=SELECT "f1","f2" FROM "db"."autogen"."m" WHERE ...
//! list_measurements   GET  /query?db=..&q=SHOW MEASUREMENTS
//! latest_timestamp    GET  /query?db=..&q=SELECT LAST("temperature") FROM ...
//! write               POST /write?db=..&precision=s   (line protocol)
//! ```
//!
//! Every sample is one point; the source is a tag, the five fields are
//! float fields. Missing values (NaN) are left out of the line, Influx has
//! no representation for them.
//!
//! ## Query Responses
//!
//! ```json
//! {"results":[{"statement_id":0,"series":[{"name":"data",
//!   "columns":["time","temperature","humidity"],
//!   "values":[["2020-03-18T10:00:00Z",20.5,41.2]]}]}]}
//! ```
//!
//! A `null` cell in a requested column fails the query with
//! [`StoreError::MissingField`].

use core::ops::Bound;
use std::collections::BTreeSet;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use meteoclean_core::{
    constants::{DEFAULT_QUERY_TIMEOUT_SECS, SOURCE_TAG_KEY},
    errors::StoreError,
    sample::{Field, FieldValues, Sample, Series},
    time::{format_timestamp, parse_timestamp, Timestamp},
    traits::{SeriesQuery, TimeSeriesStore},
};

use crate::{
    http::{HttpClient, HttpConfig},
    ConnectorError,
};

/// Connection settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InfluxConfig {
    /// Server URL, e.g. `http://192.168.1.124:8086`
    pub url: String,
    /// Database name
    pub database: String,
    /// Retention policy used in fully qualified measurement names
    pub retention_policy: String,
    /// User name for basic auth
    pub username: Option<String>,
    /// Password for basic auth
    pub password: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".into(),
            database: "db".into(),
            retention_policy: "autogen".into(),
            username: None,
            password: None,
            timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

impl core::fmt::Debug for InfluxConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InfluxConfig")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("retention_policy", &self.retention_policy)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// [`TimeSeriesStore`] backed by an InfluxDB 1.x server
#[derive(Debug, Clone)]
pub struct InfluxStore {
    client: HttpClient,
    database: String,
    retention_policy: String,
}

impl InfluxStore {
    /// Create a store handle; no request is made until first use
    pub fn new(config: InfluxConfig) -> Result<Self, ConnectorError> {
        let mut http = HttpConfig::new(&config.url).timeout_secs(config.timeout_secs);
        if let Some(username) = &config.username {
            http = http.basic_auth(username, config.password.clone().unwrap_or_default());
        }
        Ok(Self {
            client: HttpClient::new(http)?,
            database: config.database,
            retention_policy: config.retention_policy,
        })
    }

    /// Fully qualified measurement name
    fn qualified(&self, measurement: &str) -> String {
        format!(
            "{}.{}.{}",
            quote_ident(&self.database),
            quote_ident(&self.retention_policy),
            quote_ident(measurement)
        )
    }

    fn run_query(&self, statement: &str) -> Result<Vec<ResultSeries>, StoreError> {
        debug!("influxql: {}", statement);
        let body = self
            .client
            .get("/query", &[("db", self.database.as_str()), ("q", statement)])?;
        parse_response(&body)
    }
}

impl TimeSeriesStore for InfluxStore {
    fn query(&self, query: &SeriesQuery) -> Result<Series, StoreError> {
        let statement = select_statement(&self.qualified(&query.measurement), query);
        let rows = self.run_query(&statement)?;
        series_from_rows(&rows, query)
    }

    fn write(&mut self, measurement: &str, series: &Series) -> Result<(), StoreError> {
        let body = line_protocol(measurement, series);
        if body.is_empty() {
            return Ok(());
        }
        self.client.post(
            "/write",
            &[("db", self.database.as_str()), ("precision", "s")],
            "text/plain; charset=utf-8",
            &body,
        )?;
        Ok(())
    }

    fn list_measurements(&self) -> Result<BTreeSet<String>, StoreError> {
        let rows = self.run_query("SHOW MEASUREMENTS")?;
        Ok(rows
            .iter()
            .flat_map(|s| &s.values)
            .filter_map(|row| row.first().and_then(Value::as_str))
            .map(str::to_owned)
            .collect())
    }

    fn latest_timestamp(&self, measurement: &str, source: Option<&str>) -> Result<Option<Timestamp>, StoreError> {
        let mut statement = format!(
            "SELECT LAST({}) FROM {}",
            quote_ident(Field::Temperature.name()),
            self.qualified(measurement)
        );
        if let Some(source) = source {
            statement.push_str(&format!(" WHERE {}={}", quote_ident(SOURCE_TAG_KEY), quote_literal(source)));
        }
        let rows = self.run_query(&statement)?;
        rows.iter()
            .flat_map(|s| &s.values)
            .next()
            .map(|row| row_timestamp(row))
            .transpose()
    }
}

/// One `series` object of a query response
#[derive(Debug, Clone, Default, Deserialize)]
struct ResultSeries {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<ResultSeries>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

fn parse_response(body: &str) -> Result<Vec<ResultSeries>, StoreError> {
    let response: QueryResponse =
        serde_json::from_str(body).map_err(|e| StoreError::Protocol(e.to_string()))?;
    if let Some(error) = response.error {
        return Err(StoreError::Protocol(error));
    }

    let mut series = Vec::new();
    for result in response.results {
        if let Some(error) = result.error {
            return Err(StoreError::Protocol(error));
        }
        series.extend(result.series);
    }
    Ok(series)
}

fn row_timestamp(row: &[Value]) -> Result<Timestamp, StoreError> {
    row.first()
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .ok_or_else(|| StoreError::Protocol(format!("row without a valid time: {row:?}")))
}

fn series_from_rows(rows: &[ResultSeries], query: &SeriesQuery) -> Result<Series, StoreError> {
    let mut samples = Vec::new();
    for result in rows {
        let positions: Vec<(Field, Option<usize>)> = query
            .fields
            .iter()
            .map(|f| (*f, result.columns.iter().position(|c| c == f.name())))
            .collect();

        for row in &result.values {
            let timestamp = row_timestamp(row)?;
            let mut values = FieldValues::missing();
            for (field, position) in &positions {
                let value = position
                    .and_then(|p| row.get(p))
                    .and_then(Value::as_f64)
                    .ok_or_else(|| StoreError::MissingField {
                        timestamp: format_timestamp(&timestamp),
                        field: field.name().to_owned(),
                    })?;
                values.set(*field, value);
            }
            samples.push(Sample::new(timestamp, values));
        }
    }

    Series::new(query.source.clone(), samples).map_err(|violation| StoreError::Invariant {
        measurement: query.measurement.clone(),
        violation,
    })
}

/// InfluxQL `SELECT` for a query against `from`
fn select_statement(from: &str, query: &SeriesQuery) -> String {
    let columns: Vec<String> = query.fields.iter().map(|f| quote_ident(f.name())).collect();
    let mut conditions = Vec::new();
    if let Some(source) = &query.source {
        conditions.push(format!("{}={}", quote_ident(SOURCE_TAG_KEY), quote_literal(source)));
    }
    match query.range.start {
        Bound::Included(t) => conditions.push(format!("time >= '{}'", format_timestamp(&t))),
        Bound::Excluded(t) => conditions.push(format!("time > '{}'", format_timestamp(&t))),
        Bound::Unbounded => {}
    }
    match query.range.end {
        Bound::Included(t) => conditions.push(format!("time <= '{}'", format_timestamp(&t))),
        Bound::Excluded(t) => conditions.push(format!("time < '{}'", format_timestamp(&t))),
        Bound::Unbounded => {}
    }

    let mut statement = format!("SELECT {} FROM {}", columns.join(","), from);
    if !conditions.is_empty() {
        statement.push_str(" WHERE ");
        statement.push_str(&conditions.join(" AND "));
    }
    statement
}

/// Line protocol body for `series`, one line per sample with a value
fn line_protocol(measurement: &str, series: &Series) -> String {
    let mut key = escape_key(measurement);
    if let Some(source) = series.source() {
        key.push_str(&format!(",{}={}", escape_key(SOURCE_TAG_KEY), escape_key(source)));
    }

    let mut body = String::new();
    for sample in series.samples() {
        let fields: Vec<String> = sample
            .values
            .iter()
            .filter(|(_, v)| v.is_finite())
            .map(|(f, v)| format!("{}={}", escape_key(f.name()), v))
            .collect();
        if fields.is_empty() {
            continue;
        }
        body.push_str(&format!("{} {} {}\n", key, fields.join(","), sample.timestamp.timestamp()));
    }
    body
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Escape measurement names, tag keys/values and field keys
fn escape_key(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, ',' | '=' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
