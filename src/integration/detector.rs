//! Trait for optional per-frame detection backends.

use crate::frame::Frame;
use crate::tracker::Detection;

/// Source of object detections fed to the association cross-check.
///
/// Detections are an optional extra signal next to the single-object
/// estimate; a failing source is logged and skipped, never fatal.
///
/// # Example
///
/// ```ignore
/// use clip_tracker::{DetectionSource, Frame};
/// use clip_tracker::tracker::Detection;
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
///         // Run inference and return detections
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource: Send {
    type Error: std::fmt::Display;

    /// Detect objects on `frame`, boxes in frame pixel space.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error>;
}

/// Placeholder source for pipelines that run without a detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDetector;

impl DetectionSource for NoDetector {
    type Error = std::convert::Infallible;

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
        Ok(Vec::new())
    }
}
