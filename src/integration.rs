//! Clip-level tracking: configuration, the pipeline that drives the tracker
//! engine across a clip, and the collaborators it talks to.

mod association;
mod config;
mod controller;
mod detector;
mod pipeline;

pub use association::{AssociatedTrack, AssociationConfig, Associator};
pub use config::{LossPolicy, TrackingConfig};
pub use controller::{ProcessingController, SharedController};
pub use detector::{DetectionSource, NoDetector};
pub use pipeline::{ClipTrackingPipeline, RunStatus, TrackingOutcome};
