#![forbid(unsafe_code)]

//! `meteoclean` - one cleaning step per invocation, meant for cron.
//!
//! ```text
//! */10 * * * *  meteoclean fetch-reference --config /etc/meteoclean.json
//! */10 * * * *  meteoclean clean --config /etc/meteoclean.json
//! ```
//!
//! Exit status: 0 on success, 75 when the store or feed was unreachable
//! (retry later), 65 on malformed data, 70 on an internal invariant
//! violation, 1 for anything else (bad arguments, bad configuration).

mod config;
mod dry_run;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use env_logger::{Builder, Env};
use log::{error, info};

use meteoclean_connectors::{HttpStatusSink, InfluxStore, MeteoSwissFeed};
use meteoclean_core::{
    pipeline::{CleaningPipeline, Stage},
    time::format_timestamp,
    traits::{LogStatusSink, StatusSink},
    PipelineError, ReferenceFeed, Series, TimeSeriesStore,
};

use crate::config::Config;
use crate::dry_run::OverlayStore;

const DEFAULT_CONFIG_PATH: &str = "meteoclean.json";

const EXIT_TEMPORARY: u8 = 75;
const EXIT_DATA: u8 = 65;
const EXIT_SOFTWARE: u8 = 70;

#[derive(Debug, PartialEq, Eq)]
struct Cli {
    command: Command,
    options: Options,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Clean,
    FetchReference,
}

#[derive(Debug, PartialEq, Eq)]
struct Options {
    config: PathBuf,
    verbose: bool,
    dry_run: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: PathBuf::from(DEFAULT_CONFIG_PATH),
            verbose: false,
            dry_run: false,
        }
    }
}

fn main() -> ExitCode {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let cli = match parse_cli(&args) {
        Ok(Some(cli)) => cli,
        Ok(None) => return ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(cli.options.verbose);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(&cli.options.config)?;
    let store = InfluxStore::new(config.store.clone()).context("configuring the store")?;

    if cli.options.dry_run {
        info!("dry run: nothing will be written to {}", config.store.url);
        dispatch(cli.command, &config, OverlayStore::new(store))
    } else {
        dispatch(cli.command, &config, store)
    }
}

fn dispatch<S: TimeSeriesStore>(command: Command, config: &Config, store: S) -> Result<()> {
    match command {
        Command::Clean => clean(config, store),
        Command::FetchReference => {
            let feed = MeteoSwissFeed::new(config.feed.clone()).context("configuring the feed")?;
            fetch_reference(config, &feed, store)
        }
    }
}

fn clean<S: TimeSeriesStore>(config: &Config, store: S) -> Result<()> {
    let sink: Box<dyn StatusSink> = match &config.status {
        Some(status) => Box::new(
            HttpStatusSink::new(status.clone()).context("configuring the status indicator")?,
        ),
        None => Box::new(LogStatusSink),
    };

    let outcome = CleaningPipeline::new(store, &*sink, config.pipeline.clone())
        .run()
        .context("cleaning run failed")?;
    println!("{outcome}");
    Ok(())
}

fn fetch_reference<S: TimeSeriesStore>(
    config: &Config,
    feed: &impl ReferenceFeed,
    mut store: S,
) -> Result<()> {
    let stage = Stage::FetchReference;
    let sample = feed
        .latest()
        .map_err(|e| PipelineError::from_feed(stage, e))
        .context("reading the reference feed")?;

    let source = config.pipeline.sources.reference.clone();
    let series = Series::new(Some(source.clone()), vec![sample])?;
    store
        .write(&config.pipeline.measurements.raw, &series)
        .map_err(|e| PipelineError::from_store(stage, e))
        .context("storing the reference observation")?;

    let at = format_timestamp(&sample.timestamp);
    info!("stored '{}' observation at {}", source, at);
    println!("{at}");
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::TransientIo { .. }) => EXIT_TEMPORARY,
        Some(PipelineError::MalformedSample { .. }) => EXIT_DATA,
        Some(PipelineError::Invariant { .. }) => EXIT_SOFTWARE,
        None => 1,
    }
}

fn parse_cli(args: &[String]) -> Result<Option<Cli>> {
    let Some(first) = args.first() else {
        print_help();
        return Ok(None);
    };
    if args.iter().any(|a| matches!(a.as_str(), "-h" | "--help")) {
        print_help();
        return Ok(None);
    }
    if args.iter().any(|a| matches!(a.as_str(), "-V" | "--version")) {
        print_version();
        return Ok(None);
    }

    let command = match first.as_str() {
        "clean" => Command::Clean,
        "fetch-reference" => Command::FetchReference,
        other => bail!("unknown command '{other}'; expected one of: clean, fetch-reference"),
    };
    let options = parse_options(&args[1..])?;
    Ok(Some(Cli { command, options }))
}

fn parse_options(tokens: &[String]) -> Result<Options> {
    let mut options = Options::default();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(&tokens[idx])?;
        match flag {
            "--config" | "-c" => {
                options.config = PathBuf::from(take_flag_value(flag, inline_value, tokens, &mut idx)?);
            }
            "--verbose" | "-v" => {
                ensure_no_inline_value(flag, inline_value)?;
                options.verbose = true;
            }
            "--dry-run" => {
                ensure_no_inline_value(flag, inline_value)?;
                options.dry_run = true;
            }
            other => bail!("unknown option '{other}'"),
        }
        idx += 1;
    }
    Ok(options)
}

fn split_flag(token: &str) -> Result<(&str, Option<String>)> {
    if !token.starts_with('-') {
        bail!("unexpected positional argument '{token}'");
    }
    if let Some((flag, value)) = token.split_once('=') {
        return Ok((flag, Some(value.to_owned())));
    }
    Ok((token, None))
}

fn take_flag_value(
    flag: &str,
    inline_value: Option<String>,
    tokens: &[String],
    idx: &mut usize,
) -> Result<String> {
    if let Some(value) = inline_value {
        return Ok(value);
    }
    *idx += 1;
    let value = tokens
        .get(*idx)
        .ok_or_else(|| anyhow!("{flag} requires a value"))?;
    if value.starts_with('-') {
        bail!("{flag} requires a value, but got option '{value}'");
    }
    Ok(value.clone())
}

fn ensure_no_inline_value(flag: &str, inline_value: Option<String>) -> Result<()> {
    if inline_value.is_some() {
        bail!("{flag} does not accept a value");
    }
    Ok(())
}

fn print_version() {
    println!("meteoclean {}", env!("CARGO_PKG_VERSION"));
}

fn print_help() {
    println!(
        "meteoclean {}\n\nUSAGE:\n  meteoclean <COMMAND> [OPTIONS]\n\nCOMMANDS:\n  clean             Convolve, correct and bias-adjust new sensor samples\n  fetch-reference   Store the latest weather-station observation\n\nOPTIONS:\n  -c, --config <path>   Configuration file (default: {})\n  -v, --verbose         Debug logging (RUST_LOG takes precedence)\n      --dry-run         Read the store but write nothing\n  -h, --help            Show help\n  -V, --version         Show version",
        env!("CARGO_PKG_VERSION"),
        DEFAULT_CONFIG_PATH
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use meteoclean_core::{
        constants::RAW_MEASUREMENT,
        errors::{CleaningError, FeedError},
        store::MemoryStore,
        traits::SeriesQuery,
        FieldValues, Sample,
    };

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    struct FixedFeed(Result<Sample, FeedError>);

    impl ReferenceFeed for FixedFeed {
        fn latest(&self) -> Result<Sample, FeedError> {
            self.0.clone()
        }
    }

    fn observation() -> Sample {
        Sample::new(
            Utc.with_ymd_and_hms(2020, 3, 18, 9, 10, 0).unwrap(),
            FieldValues::new(11.4, 0.0, 0.0, 63.1, 0.0),
        )
    }

    #[test]
    fn parses_command_and_flags() {
        let cli = parse_cli(&args(&["clean", "--config=/etc/m.json", "-v", "--dry-run"]))
            .unwrap()
            .unwrap();
        assert_eq!(cli.command, Command::Clean);
        assert_eq!(cli.options.config, PathBuf::from("/etc/m.json"));
        assert!(cli.options.verbose);
        assert!(cli.options.dry_run);

        let cli = parse_cli(&args(&["fetch-reference", "--config", "x.json"])).unwrap().unwrap();
        assert_eq!(cli.command, Command::FetchReference);
        assert_eq!(cli.options.config, PathBuf::from("x.json"));
        assert!(!cli.options.dry_run);
    }

    #[test]
    fn defaults_to_local_config() {
        let cli = parse_cli(&args(&["clean"])).unwrap().unwrap();
        assert_eq!(cli.options, Options::default());
        assert_eq!(cli.options.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_cli(&args(&["purge"])).is_err());
        assert!(parse_cli(&args(&["clean", "--config"])).is_err());
        assert!(parse_cli(&args(&["clean", "--config", "--verbose"])).is_err());
        assert!(parse_cli(&args(&["clean", "--dry-run=yes"])).is_err());
        assert!(parse_cli(&args(&["clean", "extra"])).is_err());
        assert!(parse_cli(&args(&["clean", "--force"])).is_err());
    }

    #[test]
    fn help_and_version_short_circuit() {
        assert_eq!(parse_cli(&[]).unwrap(), None);
        assert_eq!(parse_cli(&args(&["clean", "--help"])).unwrap(), None);
        assert_eq!(parse_cli(&args(&["-V"])).unwrap(), None);
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let transient = anyhow::Error::new(PipelineError::transient(Stage::FetchRaw, "refused"))
            .context("cleaning run failed");
        assert_eq!(exit_code(&transient), EXIT_TEMPORARY);

        let malformed = anyhow::Error::new(PipelineError::from_feed(
            Stage::FetchReference,
            FeedError::Malformed("no humidity".into()),
        ));
        assert_eq!(exit_code(&malformed), EXIT_DATA);

        let invariant = anyhow::Error::new(PipelineError::invariant(
            Stage::Align,
            CleaningError::NonMonotonic { index: 2 },
        ));
        assert_eq!(exit_code(&invariant), EXIT_SOFTWARE);

        assert_eq!(exit_code(&anyhow!("bad config")), 1);
    }

    #[test]
    fn fetch_reference_writes_tagged_observation() {
        let config = Config::default();
        let mut store = MemoryStore::new();
        fetch_reference(&config, &FixedFeed(Ok(observation())), &mut store).unwrap();

        let stored = store
            .query(&SeriesQuery::new(RAW_MEASUREMENT).source("meteosuisse"))
            .unwrap();
        assert_eq!(stored.samples(), &[observation()]);

        // Same observation again rewrites the same point
        fetch_reference(&config, &FixedFeed(Ok(observation())), &mut store).unwrap();
        assert_eq!(store.record_count(RAW_MEASUREMENT), 1);
    }

    #[test]
    fn fetch_reference_dry_run_leaves_store_alone() {
        let config = Config::default();
        let mut store = MemoryStore::new();
        fetch_reference(&config, &FixedFeed(Ok(observation())), OverlayStore::new(&mut store)).unwrap();
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn unreachable_feed_is_temporary() {
        let config = Config::default();
        let feed = FixedFeed(Err(FeedError::Unreachable("timed out".into())));
        let err = fetch_reference(&config, &feed, MemoryStore::new()).unwrap_err();
        assert_eq!(exit_code(&err), EXIT_TEMPORARY);
    }
}
