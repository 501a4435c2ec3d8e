use ndarray::Array2;

/// Axis-aligned rectangle in TLWH form, shared by every tracking primitive.
///
/// Conversions are provided for the other two layouts the trackers use:
/// - TLBR: Top-Left X, Top-Left Y, Bottom-Right X, Bottom-Right Y
/// - XYAH: Center X, Center Y, Aspect Ratio (w/h), Height (Kalman state)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    #[inline]
    pub fn from_xyah(cx: f32, cy: f32, aspect_ratio: f32, height: f32) -> Self {
        let width = aspect_ratio * height;
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    /// Rectangle of the given size centered on `(cx, cy)`.
    #[inline]
    pub fn centered(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    #[inline]
    pub fn to_tlwh(&self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    #[inline]
    pub fn to_xyah(&self) -> [f32; 4] {
        let (cx, cy) = self.center();
        let aspect_ratio = if self.height > 0.0 {
            self.width / self.height
        } else {
            0.0
        };
        [cx, cy, aspect_ratio, self.height]
    }

    /// XYAH measurement in the precision the Kalman filter works in.
    #[inline]
    pub fn to_xyah_f64(&self) -> [f64; 4] {
        self.to_xyah().map(f64::from)
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Shift the rectangle so it stays inside a `width` x `height` frame.
    ///
    /// The size is kept unless it exceeds the frame itself.
    pub fn clamp_to(&self, width: usize, height: usize) -> Rect {
        let w = self.width.min(width as f32);
        let h = self.height.min(height as f32);
        let x = self.x.clamp(0.0, width as f32 - w);
        let y = self.y.clamp(0.0, height as f32 - h);
        Rect::new(x, y, w, h)
    }

    /// Integer pixel window `(x, y, width, height)` covered by the rectangle.
    ///
    /// Edges are rounded independently, so a rectangle inside a frame maps to
    /// a window inside that frame.
    pub fn to_pixel_window(&self) -> (usize, usize, usize, usize) {
        let [x1, y1, x2, y2] = self.to_tlbr().map(|v| v.round().max(0.0));
        let (x2, y2) = (x2.max(x1), y2.max(y1));
        let (x, y) = (x1 as usize, y1 as usize);
        (x, y, x2 as usize - x, y2 as usize - y)
    }

    pub fn iou(&self, other: &Rect) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter_area = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }
}

/// IoU matrix of shape (M, N) between two sets of boxes.
pub fn iou_batch(boxes_a: &[Rect], boxes_b: &[Rect]) -> Array2<f32> {
    let mut ious = Array2::zeros((boxes_a.len(), boxes_b.len()));
    for (i, a) in boxes_a.iter().enumerate() {
        for (j, b) in boxes_b.iter().enumerate() {
            ious[[i, j]] = a.iou(b);
        }
    }
    ious
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_conversions() {
        let rect = Rect::new(10.0, 20.0, 30.0, 40.0);

        assert_eq!(rect.to_tlbr(), [10.0, 20.0, 40.0, 60.0]);

        let xyah = rect.to_xyah();
        assert_eq!(xyah[0], 25.0);
        assert_eq!(xyah[1], 40.0);
        assert!((xyah[2] - 0.75).abs() < 1e-6);
        assert_eq!(xyah[3], 40.0);

        let back = Rect::from_xyah(xyah[0], xyah[1], xyah[2], xyah[3]);
        assert!((back.x - 10.0).abs() < 1e-5);
        assert!((back.width - 30.0).abs() < 1e-5);
    }

    #[test]
    fn test_clamp_to_frame() {
        let rect = Rect::new(-5.0, 90.0, 20.0, 20.0).clamp_to(100, 100);
        assert_eq!(rect.to_tlwh(), [0.0, 80.0, 20.0, 20.0]);

        let oversized = Rect::new(0.0, 0.0, 200.0, 50.0).clamp_to(100, 100);
        assert_eq!(oversized.width, 100.0);
        assert_eq!(oversized.x, 0.0);
    }

    #[test]
    fn test_pixel_window() {
        let rect = Rect::new(9.6, 10.2, 39.7, 40.4);
        assert_eq!(rect.to_pixel_window(), (10, 10, 39, 41));

        let negative = Rect::new(-3.0, -3.0, 2.0, 10.0);
        assert_eq!(negative.to_pixel_window(), (0, 0, 0, 7));
    }

    #[test]
    fn test_pixel_window_stays_inside_frame() {
        // Rounding x and width separately would give 62 + 39 = 101.
        let rect = Rect::from_tlbr(61.5, 61.5, 100.0, 100.0);
        let (x, y, w, h) = rect.to_pixel_window();
        assert_eq!((x, y, w, h), (62, 62, 38, 38));
        assert!(x + w <= 100 && y + h <= 100);

        for offset in 0..20 {
            let start = 80.0 + offset as f32 * 0.05;
            let (x, _, w, _) = Rect::from_tlbr(start, 0.0, 100.0, 10.0).to_pixel_window();
            assert!(x + w <= 100, "start = {start}");
        }
    }

    #[test]
    fn test_iou() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        // 25 / (100 + 100 - 25)
        assert!((a.iou(&b) - 25.0 / 175.0).abs() < 1e-6);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&Rect::new(20.0, 20.0, 10.0, 10.0)), 0.0);
    }
}
