//! Per-frame tracking results and their keyed collection.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};

use crate::error::{TrackError, TrackResult};
use crate::tracker::Rect;

/// Coordinate used by every corner of a sentinel box.
pub const SENTINEL_COORD: f32 = -1.0;

/// Bounding box in TLBR format (x1, y1, x2, y2), in frame pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    #[inline]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// The "no detection this frame" box.
    #[inline]
    pub fn sentinel() -> Self {
        Self::new(SENTINEL_COORD, SENTINEL_COORD, SENTINEL_COORD, SENTINEL_COORD)
    }

    #[inline]
    pub fn is_sentinel(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|&c| c == SENTINEL_COORD)
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// True when the box has no usable area or carries non-finite coordinates.
    pub fn is_degenerate(&self) -> bool {
        let finite = [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|c| c.is_finite());
        !finite || self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Whether the box lies entirely inside a `width` x `height` frame.
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        self.x1 >= 0.0
            && self.y1 >= 0.0
            && self.x2 <= width as f32
            && self.y2 <= height as f32
    }

    /// Convert to the TLWH rectangle used by the tracking primitives.
    #[inline]
    pub fn to_rect(&self) -> Rect {
        Rect::from_tlbr(self.x1, self.y1, self.x2, self.y2)
    }
}

impl From<Rect> for BoundingBox {
    fn from(rect: Rect) -> Self {
        let [x1, y1, x2, y2] = rect.to_tlbr();
        Self { x1, y1, x2, y2 }
    }
}

/// Tracking result for a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub frame_id: u64,
    /// Rotation estimate in degrees, 0 when the primitive has no orientation.
    pub rotation: f32,
    pub bounding_box: BoundingBox,
}

impl TrackRecord {
    pub fn new(frame_id: u64, rotation: f32, bounding_box: BoundingBox) -> Self {
        Self {
            frame_id,
            rotation,
            bounding_box,
        }
    }

    /// A record marking that nothing usable was tracked on `frame_id`.
    pub fn sentinel(frame_id: u64) -> Self {
        Self::new(frame_id, 0.0, BoundingBox::sentinel())
    }

    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.bounding_box.is_sentinel()
    }
}

/// Tracking results keyed by frame id.
///
/// At most one record exists per frame; iteration is in frame order no matter
/// the insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackedData {
    frames: BTreeMap<u64, TrackRecord>,
}

impl TrackedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any previous record for the same frame.
    pub fn insert(&mut self, record: TrackRecord) -> Option<TrackRecord> {
        self.frames.insert(record.frame_id, record)
    }

    /// Look up the record for `frame_id`.
    pub fn get_tracked_data(&self, frame_id: u64) -> TrackResult<TrackRecord> {
        self.frames
            .get(&frame_id)
            .copied()
            .ok_or(TrackError::FrameNotTracked(frame_id))
    }

    pub fn contains(&self, frame_id: u64) -> bool {
        self.frames.contains_key(&frame_id)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn first_frame(&self) -> Option<u64> {
        self.frames.keys().next().copied()
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.frames.keys().next_back().copied()
    }

    /// Records in increasing frame order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackRecord> + '_ {
        self.frames.values()
    }
}

impl FromIterator<TrackRecord> for TrackedData {
    fn from_iter<I: IntoIterator<Item = TrackRecord>>(iter: I) -> Self {
        let mut data = Self::new();
        for record in iter {
            data.insert(record);
        }
        data
    }
}

impl IntoIterator for TrackedData {
    type Item = TrackRecord;
    type IntoIter = btree_map::IntoValues<u64, TrackRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_box() {
        let sentinel = BoundingBox::sentinel();
        assert!(sentinel.is_sentinel());
        assert!(sentinel.is_degenerate());
        assert!(!BoundingBox::new(-1.0, -1.0, 5.0, 5.0).is_sentinel());
    }

    #[test]
    fn test_degenerate_boxes() {
        assert!(BoundingBox::new(10.0, 10.0, 10.0, 50.0).is_degenerate());
        assert!(BoundingBox::new(10.0, 50.0, 20.0, 10.0).is_degenerate());
        assert!(BoundingBox::new(f32::NAN, 0.0, 5.0, 5.0).is_degenerate());
        assert!(!BoundingBox::new(10.0, 10.0, 50.0, 50.0).is_degenerate());
    }

    #[test]
    fn test_fits_within() {
        let b = BoundingBox::new(10.0, 10.0, 50.0, 50.0);
        assert!(b.fits_within(50, 50));
        assert!(!b.fits_within(49, 100));
        assert!(!BoundingBox::new(-0.5, 0.0, 5.0, 5.0).fits_within(100, 100));
    }

    #[test]
    fn test_rect_conversion() {
        let b = BoundingBox::new(10.0, 20.0, 40.0, 60.0);
        let rect = b.to_rect();
        assert_eq!(rect.to_tlwh(), [10.0, 20.0, 30.0, 40.0]);
        assert_eq!(BoundingBox::from(rect), b);
    }

    #[test]
    fn test_keyed_collection() {
        let data: TrackedData = [7u64, 2, 5]
            .into_iter()
            .map(|id| TrackRecord::new(id, 0.0, BoundingBox::new(0.0, 0.0, 1.0, 1.0)))
            .collect();

        let order: Vec<u64> = data.iter().map(|r| r.frame_id).collect();
        assert_eq!(order, vec![2, 5, 7]);
        assert_eq!(data.first_frame(), Some(2));
        assert_eq!(data.last_frame(), Some(7));
        assert!(matches!(
            data.get_tracked_data(3),
            Err(TrackError::FrameNotTracked(3))
        ));
        assert_eq!(data.get_tracked_data(5).unwrap().frame_id, 5);
    }

    #[test]
    fn test_insert_replaces_same_frame() {
        let mut data = TrackedData::new();
        data.insert(TrackRecord::sentinel(4));
        let previous = data.insert(TrackRecord::new(4, 3.0, BoundingBox::new(1.0, 1.0, 2.0, 2.0)));
        assert!(previous.is_some_and(|r| r.is_sentinel()));
        assert_eq!(data.len(), 1);
        assert_eq!(data.get_tracked_data(4).unwrap().rotation, 3.0);
    }
}
