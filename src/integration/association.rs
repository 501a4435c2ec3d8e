//! Narrow wrapper over the ByteTrack association tracker.

use serde::{Deserialize, Serialize};

use crate::tracker::{BYTETracker, ByteTrackConfig, Detection, Rect};

/// How the association cross-check participates in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    pub enabled: bool,
    /// Replace the estimate with the matched track's smoothed box.
    pub smooth: bool,
    /// IoU an associated track needs with the estimate to count as agreeing.
    pub min_iou: f32,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smooth: false,
            min_iou: 0.5,
        }
    }
}

/// A confirmed track reported by the association tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssociatedTrack {
    pub track_id: u64,
    pub rect: Rect,
    pub score: f32,
}

/// Owns the association tracker state; only `associate` is exposed.
pub struct Associator {
    tracker: BYTETracker,
}

impl Default for Associator {
    fn default() -> Self {
        Self::new(ByteTrackConfig::default())
    }
}

impl Associator {
    pub fn new(config: ByteTrackConfig) -> Self {
        Self {
            tracker: BYTETracker::new(config),
        }
    }

    /// Feed one frame of detections and return the confirmed tracks.
    pub fn associate(&mut self, detections: Vec<Detection>) -> Vec<AssociatedTrack> {
        self.tracker
            .update(detections)
            .into_iter()
            .map(|t| AssociatedTrack {
                track_id: t.track_id,
                rect: t.rect(),
                score: t.score,
            })
            .collect()
    }

    /// Track overlapping `rect` the most, with its IoU.
    pub fn best_match(tracks: &[AssociatedTrack], rect: &Rect) -> Option<(AssociatedTrack, f32)> {
        tracks
            .iter()
            .map(|t| (*t, t.rect.iou(rect)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}
