//! Error Types for the Cleaning Pipeline
//!
//! ## Error Categories
//!
//! Failures fall into a small taxonomy that decides how a run ends:
//!
//! ### Transient I/O
//! - Store or reference feed unreachable, rejected or timed out
//! - The run aborts before writing anything else; the next scheduled run
//!   starts again from the watermark
//!
//! ### Malformed samples
//! - A fetched record is missing a field the thresholds rely on
//! - Fails the run instead of defaulting the value
//!
//! ### Invariant violations
//! - Raised by the pure components ([`CleaningError`]) when their inputs
//!   disagree: mismatched lengths, unordered timestamps
//! - Also raised when the store hands back records out of time order
//! - Fatal for the run, never written to the store
//!
//! "No new samples" and "no reference data" are not errors. They surface as
//! [`crate::pipeline::RunOutcome::NothingToClean`] and as a skipped bias
//! adjustment respectively.
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use meteoclean_core::{PipelineError, pipeline::Stage};
//!
//! fn exit_code(err: &PipelineError) -> i32 {
//!     match err {
//!         // Retry happens on the next cron tick
//!         PipelineError::TransientIo { .. } => 75,
//!         // Upstream data needs fixing first
//!         PipelineError::MalformedSample { .. } => 65,
//!         PipelineError::Invariant { .. } => 70,
//!     }
//! }
//! # let _ = exit_code(&PipelineError::transient(Stage::FetchRaw, "timeout"));
//! ```

use crate::pipeline::Stage;
use thiserror_no_std::Error;

/// Result type for the pure cleaning components
pub type CleaningResult<T> = Result<T, CleaningError>;

/// Result type for pipeline runs
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Invariant violations detected by the pure components
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleaningError {
    /// Two inputs that must be index-aligned have different lengths
    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Length of the reference input
        expected: usize,
        /// Length of the input that disagrees
        actual: usize,
    },

    /// Timestamps must be strictly increasing within a series or grid
    #[error("Timestamps not strictly increasing at index {index}")]
    NonMonotonic {
        /// First index whose timestamp is not after its predecessor
        index: usize,
    },

    /// Two index-aligned inputs disagree on the timestamp at an index
    #[error("Timestamp mismatch at index {index}")]
    TimestampMismatch {
        /// Index of the first disagreement
        index: usize,
    },
}

/// Errors raised by a [`crate::traits::TimeSeriesStore`] implementation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Connection refused, DNS failure, timeout
    #[error("Store unreachable: {0}")]
    Unreachable(String),

    /// The store answered with an error status
    #[error("Store rejected request ({status}): {message}")]
    Rejected {
        /// Status code reported by the store
        status: u16,
        /// Body or reason returned alongside
        message: String,
    },

    /// The response could not be decoded
    #[error("Unreadable store response: {0}")]
    Protocol(String),

    /// The returned records break a series invariant (unordered or
    /// duplicate timestamps); re-reading will not fix it
    #[error("Inconsistent store records in '{measurement}': {violation}")]
    Invariant {
        /// Measurement that was read
        measurement: String,
        /// The violated invariant
        violation: CleaningError,
    },

    /// A returned record lacks a requested field
    #[error("Record at {timestamp} missing field '{field}'")]
    MissingField {
        /// Timestamp of the offending record
        timestamp: String,
        /// Name of the absent field
        field: String,
    },
}

/// Errors raised by a [`crate::traits::ReferenceFeed`] implementation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    /// Feed could not be fetched
    #[error("Feed unreachable: {0}")]
    Unreachable(String),

    /// Feed fetched but its content is unusable
    #[error("Malformed feed data: {0}")]
    Malformed(String),
}

/// Errors that abort a pipeline run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Store or feed unreachable or timed out; safe to retry from the watermark
    #[error("Transient I/O failure during {stage}: {message}")]
    TransientIo {
        /// Stage the run was in
        stage: Stage,
        /// Underlying failure
        message: String,
    },

    /// A fetched sample is missing an expected field
    #[error("Malformed sample during {stage}: {message}")]
    MalformedSample {
        /// Stage the run was in
        stage: Stage,
        /// Description of the missing data
        message: String,
    },

    /// A pure component rejected its input
    #[error("Invariant violation during {stage}: {violation}")]
    Invariant {
        /// Stage the run was in
        stage: Stage,
        /// The violated invariant
        violation: CleaningError,
    },
}

impl PipelineError {
    /// Shorthand for a transient failure
    pub fn transient(stage: Stage, message: impl Into<String>) -> Self {
        Self::TransientIo { stage, message: message.into() }
    }

    /// Classify a store error raised during `stage`
    pub fn from_store(stage: Stage, err: StoreError) -> Self {
        match err {
            StoreError::MissingField { .. } => Self::MalformedSample {
                stage,
                message: err.to_string(),
            },
            StoreError::Invariant { violation, .. } => Self::invariant(stage, violation),
            StoreError::Unreachable(_) | StoreError::Rejected { .. } | StoreError::Protocol(_) => {
                Self::transient(stage, err.to_string())
            }
        }
    }

    /// Classify a feed error raised during `stage`
    pub fn from_feed(stage: Stage, err: FeedError) -> Self {
        match err {
            FeedError::Unreachable(_) => Self::transient(stage, err.to_string()),
            FeedError::Malformed(_) => Self::MalformedSample {
                stage,
                message: err.to_string(),
            },
        }
    }

    /// Wrap an invariant violation raised during `stage`
    pub fn invariant(stage: Stage, violation: CleaningError) -> Self {
        Self::Invariant { stage, violation }
    }

    /// Stage at which the run aborted
    pub fn stage(&self) -> Stage {
        match self {
            Self::TransientIo { stage, .. }
            | Self::MalformedSample { stage, .. }
            | Self::Invariant { stage, .. } => *stage,
        }
    }

    /// Whether re-running later can be expected to succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientIo { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_classified() {
        let err = PipelineError::from_store(Stage::FetchRaw, StoreError::Unreachable("refused".into()));
        assert!(err.is_retryable());
        assert_eq!(err.stage(), Stage::FetchRaw);

        let err = PipelineError::from_store(
            Stage::FetchRaw,
            StoreError::MissingField {
                timestamp: "2020-03-18T10:00:00Z".into(),
                field: "pressure".into(),
            },
        );
        assert!(matches!(err, PipelineError::MalformedSample { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn unordered_records_are_not_retryable() {
        let err = PipelineError::from_store(
            Stage::FetchRaw,
            StoreError::Invariant {
                measurement: "data".into(),
                violation: CleaningError::NonMonotonic { index: 1 },
            },
        );
        assert_eq!(
            err,
            PipelineError::invariant(Stage::FetchRaw, CleaningError::NonMonotonic { index: 1 })
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn feed_errors_classified() {
        let err = PipelineError::from_feed(Stage::FetchReference, FeedError::Malformed("-".into()));
        assert!(matches!(err, PipelineError::MalformedSample { .. }));

        let err = PipelineError::from_feed(Stage::FetchReference, FeedError::Unreachable("dns".into()));
        assert!(err.is_retryable());
    }

    #[test]
    fn display_mentions_stage() {
        let err = PipelineError::invariant(
            Stage::Correct,
            CleaningError::LengthMismatch { expected: 3, actual: 2 },
        );
        let text = err.to_string();
        assert!(text.contains("correct"));
        assert!(text.contains("expected 3, got 2"));
    }
}
