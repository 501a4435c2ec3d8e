//! Cost matrices and assignment for the association tracker.

use ndarray::Array2;

use crate::record::BoundingBox;
use crate::tracker::rect::Rect;

/// Cost used to pad non-square matrices so padded cells are never chosen.
const PAD_COST: f64 = 1e6;

/// A scored box handed to the association tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: Rect,
    /// Confidence in `[0, 1]`; estimates from the single-object tracker use 1.0.
    pub score: f32,
}

impl Detection {
    /// Detection from TLBR coordinates.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self {
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            score,
        }
    }

    pub fn from_rect(bbox: Rect, score: f32) -> Self {
        Self { bbox, score }
    }

    pub fn from_box(bbox: &BoundingBox, score: f32) -> Self {
        Self::from_rect(bbox.to_rect(), score)
    }
}

/// `1 - IoU` between every track box and every detection box.
pub fn iou_distance(track_boxes: &[Rect], det_boxes: &[Rect]) -> Array2<f32> {
    Array2::from_shape_fn((track_boxes.len(), det_boxes.len()), |(i, j)| {
        1.0 - track_boxes[i].iou(&det_boxes[j])
    })
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Minimum-cost assignment keeping only pairs whose cost is within `thresh`.
pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), PAD_COST);
    for ((i, j), &cost) in cost_matrix.indexed_iter() {
        padded[[i, j]] = f64::from(cost);
    }

    let mut result = AssignmentResult::default();
    let mut detection_matched = vec![false; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row, &col) in row_to_col.iter().enumerate().take(num_rows) {
                if col < num_cols && cost_matrix[[row, col]] <= thresh {
                    result.matches.push((row, col));
                    detection_matched[col] = true;
                } else {
                    result.unmatched_tracks.push(row);
                }
            }
        }
        Err(_) => {
            result.unmatched_tracks = (0..num_rows).collect();
        }
    }

    result.unmatched_detections = detection_matched
        .iter()
        .enumerate()
        .filter_map(|(i, &matched)| (!matched).then_some(i))
        .collect();

    result
}

/// Weight IoU similarity by detection confidence.
pub fn fuse_score(cost_matrix: &mut Array2<f32>, detections: &[Detection]) {
    for ((_, j), cost) in cost_matrix.indexed_iter_mut() {
        let fused_sim = (1.0 - *cost) * detections[j].score;
        *cost = 1.0 - fused_sim;
    }
}
