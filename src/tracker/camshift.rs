//! Histogram back-projection tracker with orientation estimate.

use ndarray::{Array2, s};
use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::tracker::primitive::{Estimate, TrackerPrimitive};
use crate::tracker::rect::Rect;

/// Window shift, in pixels, under which mean-shift stops iterating.
const CONVERGENCE_SHIFT: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CamShiftParams {
    /// Intensity histogram bins.
    pub bins: usize,
    pub max_iterations: usize,
    /// Fraction of the seed window's back-projected mass that must remain.
    pub min_mass: f32,
}

impl Default for CamShiftParams {
    fn default() -> Self {
        Self {
            bins: 16,
            max_iterations: 10,
            min_mass: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    m00: f32,
    cx: f32,
    cy: f32,
    mu20: f32,
    mu02: f32,
    mu11: f32,
}

impl Moments {
    fn of(weights: &Array2<f32>, window: &Rect) -> Self {
        let (fh, fw) = weights.dim();
        let (x, y, w, h) = window.to_pixel_window();
        let (x_end, y_end) = ((x + w).min(fw), (y + h).min(fh));
        if x >= x_end || y >= y_end {
            return Self::default();
        }

        let region = weights.slice(s![y..y_end, x..x_end]);
        let (mut m00, mut m10, mut m01) = (0.0f32, 0.0f32, 0.0f32);
        for ((ry, rx), &p) in region.indexed_iter() {
            let (px, py) = ((x + rx) as f32 + 0.5, (y + ry) as f32 + 0.5);
            m00 += p;
            m10 += p * px;
            m01 += p * py;
        }
        if m00 <= f32::EPSILON {
            return Self::default();
        }

        let (cx, cy) = (m10 / m00, m01 / m00);
        let (mut mu20, mut mu02, mut mu11) = (0.0f32, 0.0f32, 0.0f32);
        for ((ry, rx), &p) in region.indexed_iter() {
            let dx = (x + rx) as f32 + 0.5 - cx;
            let dy = (y + ry) as f32 + 0.5 - cy;
            mu20 += p * dx * dx;
            mu02 += p * dy * dy;
            mu11 += p * dx * dy;
        }

        Self {
            m00,
            cx,
            cy,
            mu20,
            mu02,
            mu11,
        }
    }

    /// Major axis angle in degrees, measured from +x towards +y (image down).
    fn orientation(&self) -> f32 {
        let spread = self.mu20 + self.mu02;
        let anisotropy = (2.0 * self.mu11).abs() + (self.mu20 - self.mu02).abs();
        if spread <= f32::EPSILON || anisotropy < 1e-4 * spread {
            return 0.0;
        }
        (0.5 * (2.0 * self.mu11).atan2(self.mu20 - self.mu02)).to_degrees()
    }
}

/// Mean-shift over the back-projection of the seed region's intensity
/// histogram. The window keeps its seed size; orientation comes from the
/// second-order central moments of the converged window.
///
/// A seed whose intensities are no more frequent than in its surroundings has
/// nothing to follow and is rejected.
pub struct CamShiftTracker {
    params: CamShiftParams,
    histogram: Vec<f32>,
    window: Option<Rect>,
    seed_mass: f32,
}

impl CamShiftTracker {
    pub fn new(params: CamShiftParams) -> Self {
        Self {
            params,
            histogram: Vec::new(),
            window: None,
            seed_mass: 0.0,
        }
    }

    fn bin(&self, value: f32) -> usize {
        let bins = self.params.bins.max(1);
        ((value / 256.0 * bins as f32) as usize).min(bins - 1)
    }

    fn back_project(&self, luma: &Array2<f32>) -> Array2<f32> {
        luma.mapv(|v| self.histogram[self.bin(v)])
    }
}

impl TrackerPrimitive for CamShiftTracker {
    fn init(&mut self, frame: &Frame, seed: Rect) -> bool {
        let (x, y, w, h) = seed.to_pixel_window();
        let (fw, fh) = (frame.width(), frame.height());
        if w == 0 || h == 0 || x + w > fw || y + h > fh {
            return false;
        }

        let luma = frame.luma();
        let bins = self.params.bins.max(1);
        let mut object = vec![0.0f32; bins];
        let mut context = vec![0.0f32; bins];
        let (mut object_area, mut context_area) = (0.0f32, 0.0f32);

        let margin = w.max(h) / 2;
        let (x0, y0) = (x.saturating_sub(margin), y.saturating_sub(margin));
        let (x1, y1) = ((x + w + margin).min(fw), (y + h + margin).min(fh));
        for ((ry, rx), &v) in luma.slice(s![y0..y1, x0..x1]).indexed_iter() {
            let (px, py) = (x0 + rx, y0 + ry);
            let inside = px >= x && px < x + w && py >= y && py < y + h;
            if inside {
                object[self.bin(v)] += 1.0;
                object_area += 1.0;
            } else {
                context[self.bin(v)] += 1.0;
                context_area += 1.0;
            }
        }

        // Weight each intensity by how much more common it is on the object
        // than around it, so background inside the seed box is suppressed.
        self.histogram = object
            .iter()
            .zip(&context)
            .map(|(&o, &c)| {
                let o = o / object_area;
                let c = if context_area > 0.0 { c / context_area } else { 0.0 };
                if o > 0.0 { ((o - c) / o).max(0.0) } else { 0.0 }
            })
            .collect();

        let window = Rect::new(x as f32, y as f32, w as f32, h as f32);
        self.seed_mass = Moments::of(&self.back_project(&luma), &window).m00;
        self.window = Some(window);
        self.seed_mass > 0.0
    }

    fn update(&mut self, frame: &Frame) -> Option<Estimate> {
        let mut window = self.window?.clamp_to(frame.width(), frame.height());
        let weights = self.back_project(&frame.luma());

        for _ in 0..self.params.max_iterations {
            let moments = Moments::of(&weights, &window);
            if moments.m00 <= 0.0 {
                return None;
            }
            let (cx, cy) = window.center();
            window = Rect::centered(moments.cx, moments.cy, window.width, window.height)
                .clamp_to(frame.width(), frame.height());
            let (nx, ny) = window.center();
            if (nx - cx).hypot(ny - cy) < CONVERGENCE_SHIFT {
                break;
            }
        }

        let moments = Moments::of(&weights, &window);
        if moments.m00 < self.params.min_mass * self.seed_mass {
            return None;
        }

        self.window = Some(window);
        Some(Estimate::new(window, moments.orientation()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_frame(index: usize, x: usize, y: usize) -> Frame {
        let mut gray = Array2::from_elem((80, 80), 10u8);
        gray.slice_mut(s![y..y + 16, x..x + 16]).fill(200);
        Frame::from_gray(index, gray)
    }

    #[test]
    fn test_follows_shifted_blob() {
        let mut tracker = CamShiftTracker::new(CamShiftParams::default());
        assert!(tracker.init(&blob_frame(0, 20, 20), Rect::new(20.0, 20.0, 16.0, 16.0)));

        let est = tracker.update(&blob_frame(1, 24, 22)).unwrap();
        let (cx, cy) = est.rect.center();
        assert!((cx - 32.0).abs() < 1.0, "cx = {cx}");
        assert!((cy - 30.0).abs() < 1.0, "cy = {cy}");
        assert!(est.rotation.abs() < 1.0);
    }

    #[test]
    fn test_diagonal_blob_orientation() {
        let mut gray = Array2::from_elem((80, 80), 10u8);
        for i in 0..30 {
            for d in 0..3 {
                gray[[20 + i, 20 + i + d]] = 200;
            }
        }
        let frame = Frame::from_gray(0, gray);

        let mut tracker = CamShiftTracker::new(CamShiftParams::default());
        assert!(tracker.init(&frame, Rect::new(20.0, 20.0, 33.0, 30.0)));
        let est = tracker.update(&frame).unwrap();
        assert!((est.rotation - 45.0).abs() < 5.0, "rotation = {}", est.rotation);
    }

    #[test]
    fn test_lost_when_blob_disappears() {
        let mut tracker = CamShiftTracker::new(CamShiftParams::default());
        assert!(tracker.init(&blob_frame(0, 20, 20), Rect::new(20.0, 20.0, 16.0, 16.0)));
        let empty = Frame::from_gray(1, Array2::from_elem((80, 80), 10u8));
        assert!(tracker.update(&empty).is_none());
    }
}
