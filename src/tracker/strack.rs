//! Single track held by the association tracker.

use ndarray::{Array1, Array2};

use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

#[derive(Debug, Clone)]
pub struct STrack {
    /// Identifier, 0 until activated
    pub track_id: u64,
    pub state: TrackState,
    /// Whether the track has been confirmed
    pub is_activated: bool,
    pub score: f32,
    /// Last frame the track was matched on
    pub frame_id: u32,
    pub start_frame: u32,
    pub tracklet_len: u32,
    /// Kalman state mean (8-dim), set once activated
    pub mean: Option<Array1<f64>>,
    /// Kalman state covariance (8x8)
    pub covariance: Option<Array2<f64>>,
    /// Box of the detection the track was created from
    pub tlwh: Rect,
}

impl STrack {
    pub fn new(tlwh: Rect, score: f32) -> Self {
        Self {
            track_id: 0,
            state: TrackState::New,
            is_activated: false,
            score,
            frame_id: 0,
            start_frame: 0,
            tracklet_len: 0,
            mean: None,
            covariance: None,
            tlwh,
        }
    }

    /// Current box: the Kalman estimate once activated, the detection box before.
    pub fn rect(&self) -> Rect {
        match &self.mean {
            Some(mean) => Rect::from_xyah(
                mean[0] as f32,
                mean[1] as f32,
                mean[2] as f32,
                mean[3] as f32,
            ),
            None => self.tlwh,
        }
    }

    pub fn end_frame(&self) -> u32 {
        self.frame_id
    }

    /// Start a new tracklet under `track_id`.
    pub fn activate(&mut self, kalman_filter: &KalmanFilter, track_id: u64, frame_id: u32) {
        self.track_id = track_id;

        let (mean, covariance) = kalman_filter.initiate(self.tlwh.to_xyah_f64());
        self.mean = Some(mean);
        self.covariance = Some(covariance);
        self.tracklet_len = 0;
        self.state = TrackState::Tracked;
        // Tracks born on the very first frame are trusted immediately.
        self.is_activated = frame_id == 1;
        self.frame_id = frame_id;
        self.start_frame = frame_id;
    }

    /// Bring a lost track back with a fresh detection.
    pub fn re_activate(&mut self, new_track: &STrack, kalman_filter: &KalmanFilter, frame_id: u32) {
        self.correct(new_track, kalman_filter);
        self.tracklet_len = 0;
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.frame_id = frame_id;
        self.score = new_track.score;
    }

    /// Continue a tracked track with a matched detection.
    pub fn update(&mut self, new_track: &STrack, kalman_filter: &KalmanFilter, frame_id: u32) {
        self.frame_id = frame_id;
        self.tracklet_len += 1;
        self.correct(new_track, kalman_filter);
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.score = new_track.score;
    }

    fn correct(&mut self, new_track: &STrack, kalman_filter: &KalmanFilter) {
        if let (Some(mean), Some(cov)) = (&self.mean, &self.covariance) {
            if let Some((mean, cov)) = kalman_filter.update(mean, cov, new_track.tlwh.to_xyah_f64())
            {
                self.mean = Some(mean);
                self.covariance = Some(cov);
            }
        }
    }

    pub fn predict(&mut self, kalman_filter: &KalmanFilter) {
        if let (Some(mean), Some(cov)) = (&self.mean, &self.covariance) {
            let mut mean_to_predict = mean.clone();
            if self.state != TrackState::Tracked {
                // Height velocity is frozen while the track is lost.
                mean_to_predict[7] = 0.0;
            }
            let (new_mean, new_cov) = kalman_filter.predict(&mean_to_predict, cov);
            self.mean = Some(new_mean);
            self.covariance = Some(new_cov);
        }
    }

    pub fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
    }

    pub fn mark_removed(&mut self) {
        self.state = TrackState::Removed;
    }

    pub fn multi_predict(stracks: &mut [STrack], kalman_filter: &KalmanFilter) {
        for strack in stracks.iter_mut() {
            strack.predict(kalman_filter);
        }
    }
}
