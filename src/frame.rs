//! Decoded frames and the clip abstraction that supplies them.

use ndarray::{Array2, Array3, Axis};

use crate::error::{TrackError, TrackResult};

/// A decoded video frame.
///
/// Pixels are stored as `(height, width, channels)`; one channel is treated as
/// grayscale, three or more as RGB(A).
#[derive(Debug, Clone)]
pub struct Frame {
    index: usize,
    pixels: Array3<u8>,
}

impl Frame {
    pub fn new(index: usize, pixels: Array3<u8>) -> Self {
        Self { index, pixels }
    }

    /// Single-channel frame from a `(height, width)` intensity image.
    pub fn from_gray(index: usize, gray: Array2<u8>) -> Self {
        Self::new(index, gray.insert_axis(Axis(2)))
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn channels(&self) -> usize {
        self.pixels.dim().2
    }

    pub fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }

    /// Luminance in `[0, 255]` (BT.601 weights for color frames).
    pub fn luma(&self) -> Array2<f32> {
        let (h, w, c) = self.pixels.dim();
        if c < 3 {
            return self.pixels.index_axis(Axis(2), 0).mapv(f32::from);
        }
        Array2::from_shape_fn((h, w), |(y, x)| {
            0.299 * f32::from(self.pixels[[y, x, 0]])
                + 0.587 * f32::from(self.pixels[[y, x, 1]])
                + 0.114 * f32::from(self.pixels[[y, x, 2]])
        })
    }
}

/// Source of decoded frames for one clip.
///
/// Implementations are read-only from the tracker's point of view; several
/// runs may read the same source.
pub trait FrameSource {
    /// Total number of frames in the clip.
    fn frame_count(&self) -> usize;

    /// Decode the frame at `index`.
    ///
    /// The returned frame's [`Frame::index`] must equal `index`; records are
    /// keyed by it and a mismatch aborts the run.
    fn frame(&self, index: usize) -> TrackResult<Frame>;
}

/// Clip backed by frames that are already decoded.
#[derive(Debug, Clone, Default)]
pub struct InMemoryClip {
    frames: Vec<Frame>,
}

impl InMemoryClip {
    /// Build a clip from images; frame indices follow their position.
    pub fn new(images: impl IntoIterator<Item = Array3<u8>>) -> Self {
        let frames = images
            .into_iter()
            .enumerate()
            .map(|(index, pixels)| Frame::new(index, pixels))
            .collect();
        Self { frames }
    }

    pub fn from_gray(images: impl IntoIterator<Item = Array2<u8>>) -> Self {
        Self::new(images.into_iter().map(|g| g.insert_axis(Axis(2))))
    }
}

impl FrameSource for InMemoryClip {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame(&self, index: usize) -> TrackResult<Frame> {
        self.frames
            .get(index)
            .cloned()
            .ok_or_else(|| TrackError::frame_unavailable(index, "index past end of clip"))
    }
}
