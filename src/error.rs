//! Error types for calibration, configuration and frame replay.

use thiserror::Error;

/// Result alias used across the crate.
pub type CaptureResult<T> = Result<T, CaptureError>;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// Fewer than 89 calibration boundaries were supplied.
    #[error("invalid calibration: expected 89 boundaries (one extra for the width of the 88th key), got {found}")]
    InvalidCalibration { found: usize },

    /// A calibration token could not be read as a pixel coordinate.
    #[error("invalid calibration boundary #{position}: {token:?} is not an integer")]
    InvalidBoundary { position: usize, token: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("frame file error: {0}")]
    FrameFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
