//! Incremental Cleaning Pipeline
//!
//! ## Overview
//!
//! One [`CleaningPipeline::run`] cleans everything that arrived since the
//! previous run. It is the only part of the crate that talks to the store;
//! the components it sequences are pure.
//!
//! ```text
//! FETCH_WATERMARK → FETCH_RAW ──(nothing new)──────────────────────────→ STOP
//!                      │
//!                      ├─(1-2 samples)─→ deferred ─(nothing pending)───→ STOP
//!                      ↓
//!                  CONVOLVE → PERSIST_CONVOLUTION
//!                      ↓
//!            REFETCH_CONVOLUTION → CORRECT → FETCH_REFERENCE
//!                                                  │
//!                         ┌─(no reference data)────┤
//!                         ↓                        ↓
//!                  PERSIST_CLEANED  ←──  ADJUST ← ALIGN
//! ```
//!
//! ## Progress Markers
//!
//! Nothing is kept outside the store. Each run derives two markers:
//!
//! - **convolution watermark**: newest timestamp in the convolution
//!   measurement. Raw samples after it still need a derivative signal.
//! - **cleaned marker**: newest timestamp in the cleaned measurement.
//!   Convolved samples after it still need correction.
//!
//! Correction covers `(cleaned marker, convolution watermark]`. Normally
//! that is exactly the batch just convolved; after a run that died between
//! the two writes it also covers the batch the failed run left behind.
//!
//! ## Failure Semantics
//!
//! Any store or feed failure aborts the run at the stage it happened in.
//! Nothing computed after the failure is written, and the next run resumes
//! from the markers. There are no retries inside a run.

use core::fmt;
use std::collections::BTreeMap;

use chrono::Duration;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    alignment::align,
    bias::{apply_offsets, compute_offsets, BiasOffsets, BIAS_FIELDS},
    constants::{
        thresholds::Thresholds, CLEANED_MEASUREMENT, CONVOLUTION_MEASUREMENT,
        DEFAULT_REFERENCE_MARGIN_MINUTES, MIN_CONVOLUTION_BATCH, PRIMARY_SOURCE, RAW_MEASUREMENT,
        REFERENCE_SOURCE,
    },
    convolution::convolve,
    correction::correct,
    errors::{PipelineError, PipelineResult},
    sample::{Field, Sample, Series},
    time::{Timestamp, Watermark},
    traits::{SeriesQuery, Status, StatusSink, TimeRange, TimeSeriesStore},
};

/// Pipeline state, reported with every error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Deriving the progress markers
    FetchWatermark,
    /// Reading raw primary samples
    FetchRaw,
    /// Computing the derivative signal
    Convolve,
    /// Writing the derivative signal
    PersistConvolution,
    /// Reading back the signal for the correction range
    RefetchConvolution,
    /// Repairing anomalies
    Correct,
    /// Reading the reference window
    FetchReference,
    /// Interpolating the reference onto the sensor grid
    Align,
    /// Estimating and removing the bias
    Adjust,
    /// Writing the cleaned series
    PersistCleaned,
}

impl Stage {
    /// Lowercase name, as used in log lines
    pub const fn name(&self) -> &'static str {
        match self {
            Stage::FetchWatermark => "fetch_watermark",
            Stage::FetchRaw => "fetch_raw",
            Stage::Convolve => "convolve",
            Stage::PersistConvolution => "persist_convolution",
            Stage::RefetchConvolution => "refetch_convolution",
            Stage::Correct => "correct",
            Stage::FetchReference => "fetch_reference",
            Stage::Align => "align",
            Stage::Adjust => "adjust",
            Stage::PersistCleaned => "persist_cleaned",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Source tags of the two feeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Sources {
    /// Tag of the local sensor samples
    pub primary: String,
    /// Tag of the weather station samples
    pub reference: String,
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            primary: PRIMARY_SOURCE.to_owned(),
            reference: REFERENCE_SOURCE.to_owned(),
        }
    }
}

/// Measurement names in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Measurements {
    /// Raw samples of both sources
    pub raw: String,
    /// Derivative signal
    pub convolution: String,
    /// Cleaned output
    pub cleaned: String,
}

impl Default for Measurements {
    fn default() -> Self {
        Self {
            raw: RAW_MEASUREMENT.to_owned(),
            convolution: CONVOLUTION_MEASUREMENT.to_owned(),
            cleaned: CLEANED_MEASUREMENT.to_owned(),
        }
    }
}

/// Everything a run needs besides its collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Source tags
    pub sources: Sources,
    /// Measurement names
    pub measurements: Measurements,
    /// Anomaly thresholds
    pub thresholds: Thresholds,
    /// Reference window extends this far beyond the batch on both sides
    pub reference_margin_minutes: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: Sources::default(),
            measurements: Measurements::default(),
            thresholds: Thresholds::default(),
            reference_margin_minutes: DEFAULT_REFERENCE_MARGIN_MINUTES,
        }
    }
}

/// Summary of a run that wrote cleaned data
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// New raw samples convolved this run
    pub convolved: usize,
    /// Samples written to the cleaned measurement
    pub cleaned: usize,
    /// Values replaced per field
    pub corrections: BTreeMap<Field, usize>,
    /// Offsets removed; `None` when bias adjustment was skipped
    pub offsets: Option<BiasOffsets>,
    /// Convolution watermark after the run
    pub watermark: Watermark,
}

impl RunReport {
    /// Values replaced across all fields
    pub fn total_corrections(&self) -> usize {
        self.corrections.values().sum()
    }
}

/// How a successful run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No raw samples after the watermark and nothing pending
    NothingToClean,
    /// Too few new samples to convolve; left for a later run
    Deferred {
        /// New raw samples waiting
        pending: usize,
    },
    /// Cleaned data was written
    Cleaned(RunReport),
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::NothingToClean => f.write_str("nothing to clean"),
            RunOutcome::Deferred { pending } => write!(
                f,
                "deferred: {pending} new sample(s), waiting for {MIN_CONVOLUTION_BATCH}"
            ),
            RunOutcome::Cleaned(report) => {
                write!(
                    f,
                    "cleaned {} sample(s), {} correction(s), ",
                    report.cleaned,
                    report.total_corrections()
                )?;
                match report.offsets {
                    Some(_) => f.write_str("bias adjusted")?,
                    None => f.write_str("bias not adjusted")?,
                }
                write!(f, ", watermark {}", report.watermark)
            }
        }
    }
}

/// Orchestrates one cleaning run against a store
pub struct CleaningPipeline<S, K> {
    store: S,
    sink: K,
    config: PipelineConfig,
}

impl<S: TimeSeriesStore, K: StatusSink> CleaningPipeline<S, K> {
    /// Wire a pipeline; nothing is queried until [`CleaningPipeline::run`]
    pub fn new(store: S, sink: K, config: PipelineConfig) -> Self {
        Self { store, sink, config }
    }

    /// Configuration in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Release the store
    pub fn into_store(self) -> S {
        self.store
    }

    /// Run once. Signals the status sink on entry and exit.
    pub fn run(&mut self) -> PipelineResult<RunOutcome> {
        self.sink.signal(Status::Measuring);
        match self.execute() {
            Ok(outcome) => {
                info!("run finished: {}", outcome);
                self.sink.signal(Status::Idle);
                Ok(outcome)
            }
            Err(e) => {
                error!("run aborted: {}", e);
                self.sink.signal(Status::Error);
                Err(e)
            }
        }
    }

    fn execute(&mut self) -> PipelineResult<RunOutcome> {
        let primary = self.config.sources.primary.clone();
        let m = self.config.measurements.clone();

        // FETCH_WATERMARK
        let present = self
            .store
            .list_measurements()
            .map_err(|e| PipelineError::from_store(Stage::FetchWatermark, e))?;
        let marker = |name: &str| -> PipelineResult<Watermark> {
            if !present.contains(name) {
                return Ok(Watermark::Start);
            }
            self.store
                .latest_timestamp(name, Some(&primary))
                .map(Watermark::from_latest)
                .map_err(|e| PipelineError::from_store(Stage::FetchWatermark, e))
        };
        let watermark = marker(&m.convolution)?;
        let cleaned_marker = marker(&m.cleaned)?;
        info!("convolution watermark {}, cleaned up to {}", watermark, cleaned_marker);

        // FETCH_RAW
        let raw = self.query(
            Stage::FetchRaw,
            SeriesQuery::new(&m.raw).source(&primary).range(TimeRange::after(watermark)),
        )?;
        info!("{} new raw sample(s)", raw.len());

        let fetched = raw.len();
        let mut convolved = 0;
        let mut new_watermark = watermark;
        let mut pending_batch = None;

        if fetched >= MIN_CONVOLUTION_BATCH {
            // CONVOLVE
            let continuity = self.sample_at(Stage::Convolve, watermark)?;
            let signal = convolve(&raw, continuity.as_ref())
                .map_err(|e| PipelineError::invariant(Stage::Convolve, e))?;
            if let (Some(signal), Some(last)) = (signal, raw.last()) {
                // PERSIST_CONVOLUTION
                self.store
                    .write(&m.convolution, &signal)
                    .map_err(|e| PipelineError::from_store(Stage::PersistConvolution, e))?;
                info!("persisted {} convolution sample(s)", signal.len());
                convolved = fetched;
                new_watermark = Watermark::At(last.timestamp);
            }
            if cleaned_marker == watermark {
                pending_batch = Some(raw);
            }
        } else if fetched > 0 {
            warn!(
                "{} new sample(s), fewer than {}: convolution deferred",
                fetched, MIN_CONVOLUTION_BATCH
            );
        }

        let Some(until) = new_watermark.timestamp().filter(|_| cleaned_marker < new_watermark) else {
            return Ok(match fetched {
                0 => RunOutcome::NothingToClean,
                pending => RunOutcome::Deferred { pending },
            });
        };
        let range = TimeRange::after_until(cleaned_marker, until);

        // The batch just fetched is the correction range unless an earlier
        // run left convolved samples uncleaned
        let batch = match pending_batch {
            Some(batch) => batch,
            None => {
                info!("resuming correction over {}", range);
                self.query(
                    Stage::FetchRaw,
                    SeriesQuery::new(&m.raw).source(&primary).range(range),
                )?
            }
        };

        // REFETCH_CONVOLUTION
        let signal = self.query(
            Stage::RefetchConvolution,
            SeriesQuery::new(&m.convolution).source(&primary).range(range),
        )?;

        // CORRECT
        let continuity = self.sample_at(Stage::Correct, cleaned_marker)?;
        let corrected = correct(&batch, &signal, continuity.as_ref(), &self.config.thresholds)
            .map_err(|e| PipelineError::invariant(Stage::Correct, e))?;
        info!("corrected {} value(s) over {} sample(s)", corrected.total(), batch.len());

        // FETCH_REFERENCE / ALIGN / ADJUST
        let (cleaned, offsets) = self.adjust(corrected.series)?;

        // PERSIST_CLEANED
        self.store
            .write(&m.cleaned, &cleaned)
            .map_err(|e| PipelineError::from_store(Stage::PersistCleaned, e))?;
        info!("persisted {} cleaned sample(s)", cleaned.len());

        Ok(RunOutcome::Cleaned(RunReport {
            convolved,
            cleaned: cleaned.len(),
            corrections: corrected.counts,
            offsets,
            watermark: new_watermark,
        }))
    }

    /// Align the reference onto `series` and remove the bias if possible
    fn adjust(&self, series: Series) -> PipelineResult<(Series, Option<BiasOffsets>)> {
        let (Some(first), Some(last)) = (series.first(), series.last()) else {
            return Ok((series, None));
        };
        let margin = Duration::minutes(self.config.reference_margin_minutes);
        let window = TimeRange::between(first.timestamp - margin, last.timestamp + margin);

        let reference = self.query(
            Stage::FetchReference,
            SeriesQuery::new(&self.config.measurements.raw)
                .source(&self.config.sources.reference)
                .range(window)
                .fields(&BIAS_FIELDS),
        )?;
        if reference.is_empty() {
            warn!("no reference data in {}: bias adjustment skipped", window);
            return Ok((series, None));
        }

        let targets: Vec<Timestamp> = series.timestamps();
        let aligned = align(&reference, &targets, &BIAS_FIELDS)
            .map_err(|e| PipelineError::invariant(Stage::Align, e))?;
        let offsets = compute_offsets(&series, &aligned)
            .map_err(|e| PipelineError::invariant(Stage::Adjust, e))?;
        if offsets.is_empty() {
            warn!("reference does not overlap the batch: bias adjustment skipped");
            return Ok((series, None));
        }

        info!(
            "bias offsets: temperature {:?}, humidity {:?}",
            offsets.temperature, offsets.humidity
        );
        let adjusted = apply_offsets(&series, &offsets)
            .map_err(|e| PipelineError::invariant(Stage::Adjust, e))?;
        Ok((adjusted, Some(offsets)))
    }

    /// Raw primary sample exactly at `watermark`
    fn sample_at(&self, stage: Stage, watermark: Watermark) -> PipelineResult<Option<Sample>> {
        let Some(t) = watermark.timestamp() else {
            return Ok(None);
        };
        let found = self.query(
            stage,
            SeriesQuery::new(&self.config.measurements.raw)
                .source(&self.config.sources.primary)
                .range(TimeRange::at(t)),
        )?;
        Ok(found.last().copied())
    }

    fn query(&self, stage: Stage, query: SeriesQuery) -> PipelineResult<Series> {
        self.store
            .query(&query)
            .map_err(|e| PipelineError::from_store(stage, e))
    }
}
