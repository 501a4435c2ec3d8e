//! Offline single-object tracking across video clips.
//!
//! A [`ClipTrackingPipeline`] seeds a tracker primitive with a user-selected
//! box on the first frame of a clip (or interval), updates it frame by frame
//! and collects one [`TrackRecord`] per frame. Lost frames are kept as
//! sentinel records, runs can be cancelled through a
//! [`ProcessingController`], and results are persisted by a [`RecordStore`]
//! for later lookup by frame id.

pub mod error;
pub mod frame;
pub mod integration;
pub mod persistence;
pub mod record;
pub mod tracker;

pub use error::{TrackError, TrackResult};
pub use frame::{Frame, FrameSource, InMemoryClip};
pub use integration::{
    AssociationConfig, ClipTrackingPipeline, DetectionSource, LossPolicy, NoDetector,
    ProcessingController, RunStatus, SharedController, TrackingConfig, TrackingOutcome,
};
pub use persistence::RecordStore;
pub use record::{BoundingBox, TrackRecord, TrackedData};
pub use tracker::{Algorithm, TrackerEngine, TrackerPrimitive, UpdateOutcome};
