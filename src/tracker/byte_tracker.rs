//! ByteTrack multi-object association.
//!
//! High-score detections are matched to predicted tracks first; tracks left
//! over get a second chance against low-score detections before being marked
//! lost. Lost tracks are kept for `track_buffer` frames so a briefly occluded
//! object keeps its identity.

use std::collections::HashSet;

use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, AssignmentResult, Detection};
use crate::tracker::rect::{Rect, iou_batch};
use crate::tracker::strack::STrack;
use crate::tracker::track_state::TrackState;

/// Floor below which low-score detections are discarded entirely.
const LOW_SCORE_FLOOR: f32 = 0.1;
/// IoU above which a tracked and a lost track are considered duplicates.
const DUPLICATE_IOU: f32 = 0.85;

#[derive(Debug, Clone)]
pub struct ByteTrackConfig {
    pub track_thresh: f32,
    pub match_thresh: f32,
    pub track_buffer: u32,
    pub frame_rate: f32,
}

impl Default for ByteTrackConfig {
    fn default() -> Self {
        Self {
            track_thresh: 0.5,
            match_thresh: 0.8,
            track_buffer: 30,
            frame_rate: 30.0,
        }
    }
}

pub struct BYTETracker {
    tracked_stracks: Vec<STrack>,
    lost_stracks: Vec<STrack>,
    frame_id: u32,
    next_track_id: u64,
    config: ByteTrackConfig,
    max_time_lost: u32,
    kalman_filter: KalmanFilter,
}

impl BYTETracker {
    pub fn new(config: ByteTrackConfig) -> Self {
        let max_time_lost = (config.frame_rate / 30.0 * config.track_buffer as f32) as u32;
        Self {
            tracked_stracks: Vec::new(),
            lost_stracks: Vec::new(),
            frame_id: 0,
            next_track_id: 0,
            config,
            max_time_lost,
            kalman_filter: KalmanFilter::default(),
        }
    }

    /// Number of frames fed so far.
    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    fn next_id(&mut self) -> u64 {
        self.next_track_id += 1;
        self.next_track_id
    }

    /// Advance one frame and return the confirmed tracks.
    pub fn update(&mut self, detections: Vec<Detection>) -> Vec<STrack> {
        self.frame_id += 1;

        let mut activated_stracks = Vec::new();
        let mut refind_stracks = Vec::new();
        let mut lost_stracks = Vec::new();

        // Step 1: split detections by score
        let (detections_high, detections_low): (Vec<_>, Vec<_>) = detections
            .into_iter()
            .filter(|d| d.score > LOW_SCORE_FLOOR)
            .partition(|d| d.score >= self.config.track_thresh);

        let detections: Vec<STrack> = detections_high
            .into_iter()
            .map(|d| STrack::new(d.bbox, d.score))
            .collect();

        let (tracked, unconfirmed): (Vec<_>, Vec<_>) = self
            .tracked_stracks
            .drain(..)
            .partition(|t| t.is_activated);
        let mut unconfirmed = unconfirmed;

        let mut strack_pool = joint_stracks(tracked, &self.lost_stracks);

        // Step 2: first association, high score detections
        STrack::multi_predict(&mut strack_pool, &self.kalman_filter);

        let mut dists = matching::iou_distance(&rects(&strack_pool), &rects(&detections));
        matching::fuse_score(&mut dists, &as_detections(&detections));

        let AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = matching::linear_assignment(&dists, self.config.match_thresh);

        for (itracked, idet) in matches {
            let mut track = strack_pool[itracked].clone();
            let det = &detections[idet];
            if track.state == TrackState::Tracked {
                track.update(det, &self.kalman_filter, self.frame_id);
                activated_stracks.push(track);
            } else {
                track.re_activate(det, &self.kalman_filter, self.frame_id);
                refind_stracks.push(track);
            }
        }

        // Step 3: second association, low score detections
        let detections_second: Vec<STrack> = detections_low
            .into_iter()
            .map(|d| STrack::new(d.bbox, d.score))
            .collect();

        let r_tracked_stracks: Vec<STrack> = unmatched_tracks
            .iter()
            .map(|&idx| &strack_pool[idx])
            .filter(|t| t.state == TrackState::Tracked)
            .cloned()
            .collect();

        let dists_second =
            matching::iou_distance(&rects(&r_tracked_stracks), &rects(&detections_second));

        let AssignmentResult {
            matches: matches_second,
            unmatched_tracks: unmatched_tracks_second,
            ..
        } = matching::linear_assignment(&dists_second, 0.5);

        for (itracked, idet) in matches_second {
            let mut track = r_tracked_stracks[itracked].clone();
            let det = &detections_second[idet];
            if track.state == TrackState::Tracked {
                track.update(det, &self.kalman_filter, self.frame_id);
                activated_stracks.push(track);
            } else {
                track.re_activate(det, &self.kalman_filter, self.frame_id);
                refind_stracks.push(track);
            }
        }

        for idx in unmatched_tracks_second {
            let mut track = r_tracked_stracks[idx].clone();
            if track.state != TrackState::Lost {
                track.mark_lost();
                lost_stracks.push(track);
            }
        }

        // Unconfirmed tracks, usually tracks with only one beginning frame
        let detections_rem: Vec<STrack> = unmatched_detections
            .into_iter()
            .map(|idx| detections[idx].clone())
            .collect();

        let mut dist_unconfirmed =
            matching::iou_distance(&rects(&unconfirmed), &rects(&detections_rem));
        matching::fuse_score(&mut dist_unconfirmed, &as_detections(&detections_rem));

        let AssignmentResult {
            matches: matches_unconfirmed,
            unmatched_detections: unmatched_new,
            ..
        } = matching::linear_assignment(&dist_unconfirmed, 0.7);

        for (itracked, idet) in matches_unconfirmed {
            unconfirmed[itracked].update(&detections_rem[idet], &self.kalman_filter, self.frame_id);
            activated_stracks.push(unconfirmed[itracked].clone());
        }

        // Step 4: init new tracks
        for idx in unmatched_new {
            let mut track = detections_rem[idx].clone();
            if track.score < self.config.track_thresh + 0.1 {
                continue;
            }
            let track_id = self.next_id();
            track.activate(&self.kalman_filter, track_id, self.frame_id);
            activated_stracks.push(track);
        }

        // Step 5: expire lost tracks
        for track in self.lost_stracks.drain(..) {
            if self.frame_id - track.end_frame() <= self.max_time_lost {
                lost_stracks.push(track);
            }
        }

        self.tracked_stracks = activated_stracks
            .into_iter()
            .chain(refind_stracks)
            .filter(|t| t.state == TrackState::Tracked)
            .collect();

        let lost = sub_stracks(lost_stracks, &self.tracked_stracks);
        let (tracked, lost) = remove_duplicate_stracks(&self.tracked_stracks, &lost);
        self.tracked_stracks = tracked;
        self.lost_stracks = lost;

        self.tracked_stracks
            .iter()
            .filter(|t| t.is_activated)
            .cloned()
            .collect()
    }
}

fn rects(stracks: &[STrack]) -> Vec<Rect> {
    stracks.iter().map(STrack::rect).collect()
}

fn as_detections(stracks: &[STrack]) -> Vec<Detection> {
    stracks
        .iter()
        .map(|t| Detection::from_rect(t.rect(), t.score))
        .collect()
}

fn joint_stracks(tlista: Vec<STrack>, tlistb: &[STrack]) -> Vec<STrack> {
    let mut exists: HashSet<u64> = tlista.iter().map(|t| t.track_id).collect();
    let mut res = tlista;
    for t in tlistb {
        if exists.insert(t.track_id) {
            res.push(t.clone());
        }
    }
    res
}

fn sub_stracks(tlista: Vec<STrack>, tlistb: &[STrack]) -> Vec<STrack> {
    let b_ids: HashSet<u64> = tlistb.iter().map(|t| t.track_id).collect();
    tlista
        .into_iter()
        .filter(|t| !b_ids.contains(&t.track_id))
        .collect()
}

/// Drop near-identical tracks, keeping whichever has lived longer.
fn remove_duplicate_stracks(
    stracksa: &[STrack],
    stracksb: &[STrack],
) -> (Vec<STrack>, Vec<STrack>) {
    if stracksa.is_empty() || stracksb.is_empty() {
        return (stracksa.to_vec(), stracksb.to_vec());
    }

    let ious = iou_batch(&rects(stracksa), &rects(stracksb));

    let mut dupa = vec![false; stracksa.len()];
    let mut dupb = vec![false; stracksb.len()];

    for ((i, j), &iou) in ious.indexed_iter() {
        if iou > DUPLICATE_IOU {
            let time_a = stracksa[i].frame_id - stracksa[i].start_frame;
            let time_b = stracksb[j].frame_id - stracksb[j].start_frame;
            if time_a > time_b {
                dupb[j] = true;
            } else {
                dupa[i] = true;
            }
        }
    }

    let keep = |stracks: &[STrack], dup: &[bool]| -> Vec<STrack> {
        stracks
            .iter()
            .zip(dup)
            .filter(|(_, d)| !**d)
            .map(|(t, _)| t.clone())
            .collect()
    };

    (keep(stracksa, &dupa), keep(stracksb, &dupb))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_per_tracker() {
        let mut a = BYTETracker::new(ByteTrackConfig::default());
        let mut b = BYTETracker::new(ByteTrackConfig::default());
        let det = Detection::new(10.0, 10.0, 50.0, 50.0, 0.9);

        let ta = a.update(vec![det]);
        let tb = b.update(vec![det]);
        assert_eq!(ta.len(), 1);
        assert_eq!(ta[0].track_id, 1);
        assert_eq!(tb[0].track_id, 1);
    }

    #[test]
    fn test_low_score_detections_do_not_spawn_tracks() {
        let mut tracker = BYTETracker::new(ByteTrackConfig::default());
        let tracks = tracker.update(vec![Detection::new(0.0, 0.0, 10.0, 10.0, 0.3)]);
        assert!(tracks.is_empty());
        assert_eq!(tracker.frame_id(), 1);
    }
}
