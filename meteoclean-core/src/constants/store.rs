//! Store Layout
//!
//! Raw, convolution and cleaned records share one field schema but live in
//! separate measurements, all indexed by timestamp.

/// Measurement holding raw samples from every source.
pub const RAW_MEASUREMENT: &str = "data";

/// Measurement holding the derivative signal of the primary source.
///
/// Its last timestamp doubles as the cleaning watermark.
pub const CONVOLUTION_MEASUREMENT: &str = "convol_signals";

/// Measurement holding corrected (and possibly bias-adjusted) samples.
pub const CLEANED_MEASUREMENT: &str = "clean_data";

/// Tag value of the local sensor feed.
pub const PRIMARY_SOURCE: &str = "sensehat";

/// Tag value of the external weather-station feed.
pub const REFERENCE_SOURCE: &str = "meteosuisse";

/// Name of the tag key carrying the source.
pub const SOURCE_TAG_KEY: &str = "source";
