mod byte_tracker;
mod camshift;
mod engine;
mod kalman_filter;
mod matching;
mod primitive;
mod rect;
mod strack;
mod template;
mod track_state;

pub use byte_tracker::{BYTETracker, ByteTrackConfig};
pub use camshift::{CamShiftParams, CamShiftTracker};
pub use engine::{TrackerEngine, UpdateOutcome};
pub use kalman_filter::KalmanFilter;
pub use matching::Detection;
pub use primitive::{Algorithm, Estimate, TrackerPrimitive};
pub use rect::Rect;
pub use strack::STrack;
pub use template::{TemplateParams, TemplateTracker};
pub use track_state::TrackState;
