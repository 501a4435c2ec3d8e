//! Error types for clip tracking.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for tracking operations.
pub type TrackResult<T> = Result<T, TrackError>;

/// Errors that can occur while tracking a clip or handling its record.
///
/// A single lost frame is not an error: it is absorbed into a sentinel
/// record (see [`UpdateOutcome::Lost`](crate::tracker::UpdateOutcome)).
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("Invalid frame range [{start}, {end}) for a clip of {frame_count} frames")]
    InvalidRange {
        start: usize,
        end: usize,
        frame_count: usize,
    },

    #[error("Tracker initialization failed on frame {frame_id}: {reason}")]
    InitializationFailed { frame_id: u64, reason: String },

    #[error("Tracker updated before a successful initialization")]
    NotInitialized,

    #[error("Unknown tracker algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Frame {index} unavailable: {reason}")]
    FrameUnavailable { index: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt track record: {0}")]
    CorruptRecord(String),

    #[error("Track record not found: {0}")]
    NotFound(PathBuf),

    #[error("No tracked data for frame {0}")]
    FrameNotTracked(u64),
}

impl TrackError {
    /// Create an initialization failure error.
    pub fn init_failed(frame_id: u64, reason: impl Into<String>) -> Self {
        Self::InitializationFailed {
            frame_id,
            reason: reason.into(),
        }
    }

    /// Create a frame source failure error.
    pub fn frame_unavailable(index: usize, reason: impl Into<String>) -> Self {
        Self::FrameUnavailable {
            index,
            reason: reason.into(),
        }
    }

    /// Create a corrupt record error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptRecord(message.into())
    }
}
