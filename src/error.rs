//! Error types for gait kinematics

use thiserror::Error;

/// Errors that abort a single analysis run.
///
/// Per-joint conditions (degenerate geometry, too few cycles, unmatched bands)
/// are never errors; they are reported as status values inside the report.
#[derive(Debug, Error)]
pub enum GaitError {
    #[error("Landmark stream contains no frames")]
    NoFrames,

    #[error("No frame in the stream has a usable landmark set ({0} frames dropped)")]
    NoDetections(usize),

    #[error("Corrupt landmark source: {0}")]
    CorruptSource(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No reference bands for {view}/{activity}")]
    MissingBands { view: String, activity: String },

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
