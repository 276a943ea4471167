//! Core cleaning engine for MeteoClean
//!
//! Turns a raw environmental telemetry series (temperature, humidity,
//! pressure) into a cleaned, bias-adjusted series.
//!
//! Data flows one way:
//!
//! ```text
//! raw store → pipeline → convolution → correction → alignment/bias → cleaned store
//! ```
//!
//! Only [`pipeline::CleaningPipeline`] touches the outside world. The four
//! components it sequences are pure functions over in-memory series:
//!
//! - [`convolution::convolve`] - per-field finite difference with batch continuity
//! - [`correction::correct`] - threshold-driven repair in a fixed field order
//! - [`alignment::align`] - interpolates the reference feed onto the sensor grid
//! - [`bias::compute_offsets`] / [`bias::apply_offsets`] - mean offset removal
//!
//! ```no_run
//! use meteoclean_core::{
//!     pipeline::{CleaningPipeline, PipelineConfig},
//!     store::MemoryStore,
//!     traits::LogStatusSink,
//! };
//!
//! let mut store = MemoryStore::new();
//! let mut pipeline = CleaningPipeline::new(&mut store, LogStatusSink, PipelineConfig::default());
//! match pipeline.run() {
//!     Ok(outcome) => println!("{outcome}"),
//!     Err(e) => eprintln!("run aborted: {e}"),
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod alignment;
pub mod bias;
pub mod constants;
pub mod convolution;
pub mod correction;
pub mod errors;
pub mod pipeline;
pub mod sample;
pub mod store;
pub mod time;
pub mod traits;

// Public API
pub use errors::{CleaningError, CleaningResult, PipelineError, PipelineResult};
pub use sample::{AlignedSeries, Field, FieldValues, Sample, Series};
pub use constants::thresholds::Thresholds;
pub use time::{Timestamp, Watermark};
pub use traits::{ReferenceFeed, StatusSink, TimeSeriesStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
