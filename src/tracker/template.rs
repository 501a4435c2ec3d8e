//! Template matching tracker with a Kalman motion prior.

use ndarray::{Array1, Array2, Zip, s};
use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::primitive::{Estimate, TrackerPrimitive};
use crate::tracker::rect::Rect;

/// Scores closer than this are treated as ties.
const SCORE_EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateParams {
    /// Pixels searched in each direction around the predicted position.
    pub search_radius: usize,
    /// Match quality `1 - rmse / 255` below which the object counts as lost.
    pub min_similarity: f32,
}

impl Default for TemplateParams {
    fn default() -> Self {
        Self {
            search_radius: 16,
            min_similarity: 0.8,
        }
    }
}

struct MotionState {
    mean: Array1<f64>,
    covariance: Array2<f64>,
}

/// Tracks a fixed grayscale template captured from the seed box.
///
/// Each update searches a square window around the position predicted by a
/// constant-velocity Kalman filter for the lowest mean squared difference.
/// Equal scores resolve to the candidate closest to the prediction, so flat
/// regions do not make the box drift.
pub struct TemplateTracker {
    params: TemplateParams,
    kalman_filter: KalmanFilter,
    template: Option<Array2<f32>>,
    motion: Option<MotionState>,
}

impl TemplateTracker {
    pub fn new(params: TemplateParams) -> Self {
        Self {
            params,
            kalman_filter: KalmanFilter::new(),
            template: None,
            motion: None,
        }
    }

    fn mean_squared_diff(luma: &Array2<f32>, template: &Array2<f32>, x: usize, y: usize) -> f32 {
        let (h, w) = template.dim();
        let window = luma.slice(s![y..y + h, x..x + w]);
        let sum = Zip::from(&window)
            .and(template)
            .fold(0.0f32, |acc, &a, &b| acc + (a - b) * (a - b));
        sum / (w * h) as f32
    }
}

impl TrackerPrimitive for TemplateTracker {
    fn init(&mut self, frame: &Frame, seed: Rect) -> bool {
        let (x, y, w, h) = seed.to_pixel_window();
        if w == 0 || h == 0 || x + w > frame.width() || y + h > frame.height() {
            return false;
        }

        let luma = frame.luma();
        self.template = Some(luma.slice(s![y..y + h, x..x + w]).to_owned());

        let anchored = Rect::new(x as f32, y as f32, w as f32, h as f32);
        let (mean, covariance) = self.kalman_filter.initiate(anchored.to_xyah_f64());
        self.motion = Some(MotionState { mean, covariance });
        true
    }

    fn update(&mut self, frame: &Frame) -> Option<Estimate> {
        let template = self.template.as_ref()?;
        let motion = self.motion.as_ref()?;
        let (th, tw) = template.dim();
        let (fw, fh) = (frame.width(), frame.height());
        if tw > fw || th > fh {
            return None;
        }

        let (mean, covariance) = self.kalman_filter.predict(&motion.mean, &motion.covariance);
        let predicted = Rect::centered(mean[0] as f32, mean[1] as f32, tw as f32, th as f32)
            .clamp_to(fw, fh);
        let (px, py, _, _) = predicted.to_pixel_window();
        let (px, py) = (px.min(fw - tw), py.min(fh - th));

        let r = self.params.search_radius;
        let luma = frame.luma();
        let mut best: Option<(f32, usize, usize, usize)> = None;

        for y in py.saturating_sub(r)..=(py + r).min(fh - th) {
            for x in px.saturating_sub(r)..=(px + r).min(fw - tw) {
                let score = Self::mean_squared_diff(&luma, template, x, y);
                let dist = x.abs_diff(px).pow(2) + y.abs_diff(py).pow(2);
                let better = match best {
                    None => true,
                    Some((best_score, best_dist, _, _)) => {
                        score < best_score - SCORE_EPSILON
                            || (score <= best_score + SCORE_EPSILON && dist < best_dist)
                    }
                };
                if better {
                    best = Some((score, dist, x, y));
                }
            }
        }

        let (score, _, bx, by) = best?;
        let similarity = 1.0 - score.sqrt() / 255.0;
        if similarity < self.params.min_similarity {
            // Coast on the prediction so the next search starts where the object should be.
            self.motion = Some(MotionState { mean, covariance });
            return None;
        }

        let matched = Rect::new(bx as f32, by as f32, tw as f32, th as f32);
        let (mean, covariance) = self
            .kalman_filter
            .update(&mean, &covariance, matched.to_xyah_f64())
            .unwrap_or((mean, covariance));
        self.motion = Some(MotionState { mean, covariance });

        Some(Estimate::new(matched, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_frame(index: usize, x: usize, y: usize) -> Frame {
        let mut gray = Array2::from_elem((100, 100), 20u8);
        gray.slice_mut(s![y..y + 20, x..x + 20]).fill(220);
        // A second, dimmer feature inside the square keeps the template textured.
        gray.slice_mut(s![y + 5..y + 10, x + 5..x + 10]).fill(120);
        Frame::from_gray(index, gray)
    }

    #[test]
    fn test_follows_moving_square() {
        let mut tracker = TemplateTracker::new(TemplateParams::default());
        assert!(tracker.init(&square_frame(0, 10, 10), Rect::new(10.0, 10.0, 20.0, 20.0)));

        for i in 1..10 {
            let est = tracker.update(&square_frame(i, 10 + 3 * i, 10 + 2 * i)).unwrap();
            assert_eq!(est.rect.x, (10 + 3 * i) as f32);
            assert_eq!(est.rect.y, (10 + 2 * i) as f32);
            assert_eq!(est.rotation, 0.0);
        }
    }

    #[test]
    fn test_static_scene_keeps_box() {
        let mut tracker = TemplateTracker::new(TemplateParams::default());
        let frame = Frame::from_gray(0, Array2::from_elem((64, 64), 50u8));
        let seed = Rect::new(10.0, 10.0, 40.0, 40.0);
        assert!(tracker.init(&frame, seed));
        for _ in 0..5 {
            assert_eq!(tracker.update(&frame).unwrap().rect, seed);
        }
    }

    #[test]
    fn test_reports_loss_when_object_vanishes() {
        let mut tracker = TemplateTracker::new(TemplateParams::default());
        assert!(tracker.init(&square_frame(0, 40, 40), Rect::new(40.0, 40.0, 20.0, 20.0)));
        let empty = Frame::from_gray(1, Array2::from_elem((100, 100), 20u8));
        assert!(tracker.update(&empty).is_none());
        // Object back in place is found again.
        assert!(tracker.update(&square_frame(2, 40, 40)).is_some());
    }

    #[test]
    fn test_rejects_seed_outside_frame() {
        let mut tracker = TemplateTracker::new(TemplateParams::default());
        let frame = Frame::from_gray(0, Array2::zeros((32, 32)));
        assert!(!tracker.init(&frame, Rect::new(20.0, 20.0, 20.0, 20.0)));
        assert!(tracker.update(&frame).is_none());
    }
}
