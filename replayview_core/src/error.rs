//! Error types for the ReplayView drawing helpers.

use thiserror::Error;

/// Errors raised by projection, configuration and plotting.
///
/// Out-of-bounds points are never errors; they are dropped at the
/// pixel-write boundary. Only malformed inputs end up here.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Calibration matrix does not fit the point batch
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A batch or sequence that must contain points was empty
    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    /// Paired sequences differ in length
    #[error("Length mismatch: lateral has {lateral} samples, longitudinal has {longitudinal}")]
    LengthMismatch { lateral: usize, longitudinal: usize },

    /// Configuration values are out of range
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Plot layout references a telemetry series that does not exist
    #[error("Unknown series: {0}")]
    UnknownSeries(String),

    /// Plot layout uses a colour code outside the plot palette
    #[error("Unknown color code: {0}")]
    UnknownColor(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl ReplayError {
    /// Creates a dimension mismatch error.
    pub fn dimension(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    /// Creates an invalid config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ReplayError>;
