//! ClipTrackingPipeline: drives a tracker engine across a clip.

use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{TrackError, TrackResult};
use crate::frame::{Frame, FrameSource};
use crate::integration::association::Associator;
use crate::integration::config::{LossPolicy, TrackingConfig};
use crate::integration::controller::ProcessingController;
use crate::integration::detector::{DetectionSource, NoDetector};
use crate::persistence::RecordStore;
use crate::record::{BoundingBox, TrackRecord, TrackedData};
use crate::tracker::{Detection, Estimate, TrackerEngine, TrackerPrimitive, UpdateOutcome};

type PrimitiveFactory = Box<dyn Fn() -> Box<dyn TrackerPrimitive> + Send + Sync>;

/// How a run that produced data ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every frame of the range was processed.
    Completed,
    /// The controller asked to stop; data covers the frames before that.
    Cancelled,
}

/// Data produced by a completed or cancelled run.
#[derive(Debug, Clone)]
pub struct TrackingOutcome {
    pub data: TrackedData,
    pub status: RunStatus,
    /// Frames recorded with the sentinel box.
    pub lost_frames: Vec<u64>,
}

/// What the single-object tracker produced on a frame.
#[derive(Clone, Copy)]
enum Observation<'a> {
    Seed(BoundingBox),
    Tracked(&'a Estimate),
    Lost,
}

/// State of one `track_clip` call, dropped when the call returns.
struct TrackingSession {
    engine: TrackerEngine,
    associator: Option<Associator>,
    /// Last frame the object was seen on, with its box there.
    last_good: Option<(Frame, BoundingBox)>,
    needs_reseed: bool,
}

/// Tracks the configured seed box across a clip, one frame at a time.
///
/// A run is synchronous and may take as long as the clip is long; run it on a
/// background thread and use the [`ProcessingController`] to follow progress
/// or stop it.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use clip_tracker::{ClipTrackingPipeline, SharedController, TrackingConfig};
///
/// let config = TrackingConfig::from_json(&json)?;
/// let controller = Arc::new(SharedController::new());
/// let mut pipeline = ClipTrackingPipeline::new(config, controller.clone());
/// let outcome = pipeline.run(&clip)?;
/// let record = pipeline.get_tracked_data(42)?;
/// ```
pub struct ClipTrackingPipeline<D: DetectionSource = NoDetector> {
    config: TrackingConfig,
    controller: Arc<dyn ProcessingController>,
    store: Option<RecordStore>,
    detector: Option<D>,
    primitive: Option<(String, PrimitiveFactory)>,
    tracked: TrackedData,
}

impl ClipTrackingPipeline<NoDetector> {
    pub fn new(config: TrackingConfig, controller: Arc<dyn ProcessingController>) -> Self {
        let store = config.record_path.as_ref().map(RecordStore::new);
        Self {
            config,
            controller,
            store,
            detector: None,
            primitive: None,
            tracked: TrackedData::new(),
        }
    }
}

impl<D: DetectionSource> ClipTrackingPipeline<D> {
    /// Add a detector whose output joins the association cross-check.
    pub fn with_detector<E: DetectionSource>(self, detector: E) -> ClipTrackingPipeline<E> {
        ClipTrackingPipeline {
            config: self.config,
            controller: self.controller,
            store: self.store,
            detector: Some(detector),
            primitive: self.primitive,
            tracked: self.tracked,
        }
    }

    /// Use a custom tracker primitive instead of the configured algorithm.
    ///
    /// `factory` is called once per run so every run starts from a fresh
    /// primitive.
    pub fn with_primitive_factory<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn TrackerPrimitive> + Send + Sync + 'static,
    {
        self.primitive = Some((name.into(), Box::new(factory)));
        self
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn record_store(&self) -> Option<&RecordStore> {
        self.store.as_ref()
    }

    /// Data of the last completed or cancelled run.
    pub fn tracked_data(&self) -> &TrackedData {
        &self.tracked
    }

    /// Record of `frame_id` from the last run.
    pub fn get_tracked_data(&self, frame_id: u64) -> TrackResult<TrackRecord> {
        self.tracked.get_tracked_data(frame_id)
    }

    /// Track over the range described by the configuration.
    pub fn run(&mut self, clip: &dyn FrameSource) -> TrackResult<TrackingOutcome> {
        let (start, end, interval) = (
            self.config.start,
            self.config.end,
            self.config.process_interval,
        );
        self.track_clip(clip, start, end, interval)
    }

    /// Track the whole clip, or `[start, end)` when `process_interval` is set.
    ///
    /// The first frame of the range is the seed frame. A lost frame is
    /// recorded with the sentinel box and the run goes on; a stop request ends
    /// the run early with the frames processed so far. Completed and
    /// cancelled runs are saved when a record path is configured.
    ///
    /// # Errors
    ///
    /// - [`TrackError::InvalidRange`] for an empty or out-of-bounds range
    /// - [`TrackError::InitializationFailed`] if the seed box is unusable
    /// - [`TrackError::FrameUnavailable`] if the clip cannot supply a frame
    /// - persistence errors from saving the record
    ///
    /// Nothing is saved after the first three, and the pipeline's tracked data
    /// is left empty.
    pub fn track_clip(
        &mut self,
        clip: &dyn FrameSource,
        start: usize,
        end: usize,
        process_interval: bool,
    ) -> TrackResult<TrackingOutcome> {
        self.tracked = TrackedData::new();

        let range = resolve_range(clip.frame_count(), start, end, process_interval)
            .map_err(|e| self.fail(e))?;
        let total = range.len();
        let seed = self.config.bounding_box;
        let mut session = self.new_session();

        info!(
            algorithm = session.engine.algorithm_name(),
            start = range.start,
            end = range.end,
            "tracking clip"
        );

        let mut data = TrackedData::new();
        let mut lost_frames = Vec::new();
        let mut status = RunStatus::Completed;

        for (processed, index) in range.clone().enumerate() {
            if self.controller.should_stop() {
                info!(frame = index, "stop requested, ending run");
                status = RunStatus::Cancelled;
                break;
            }

            let frame = clip.frame(index).map_err(|e| self.fail(e))?;
            if frame.index() != index {
                let reason = format!("source returned frame {}", frame.index());
                return Err(self.fail(TrackError::frame_unavailable(index, reason)));
            }
            let frame_id = index as u64;

            let record = if index == range.start {
                session
                    .engine
                    .initialize(&frame, seed)
                    .map_err(|e| self.fail(e))?;
                self.associate(&mut session, &frame, Observation::Seed(seed));
                TrackRecord::new(frame_id, 0.0, seed)
            } else {
                self.step(&mut session, &frame).map_err(|e| self.fail(e))?
            };

            if record.is_sentinel() {
                lost_frames.push(frame_id);
            } else {
                session.last_good = Some((frame, record.bounding_box));
            }
            data.insert(record);

            self.controller
                .report_progress(((processed + 1) * 100 / total) as u32);
        }

        info!(
            frames = data.len(),
            lost = lost_frames.len(),
            ?status,
            "tracking finished"
        );

        self.tracked = data.clone();
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&data) {
                return Err(self.fail(e));
            }
        }

        Ok(TrackingOutcome {
            data,
            status,
            lost_frames,
        })
    }

    fn new_session(&self) -> TrackingSession {
        let engine = match &self.primitive {
            Some((name, factory)) => TrackerEngine::with_primitive(name.clone(), factory()),
            None => TrackerEngine::new(
                self.config.algorithm,
                &self.config.template,
                &self.config.camshift,
            ),
        };
        TrackingSession {
            engine,
            associator: self.config.association.enabled.then(Associator::default),
            last_good: None,
            needs_reseed: false,
        }
    }

    /// Process one frame after the seed frame.
    fn step(&mut self, session: &mut TrackingSession, frame: &Frame) -> TrackResult<TrackRecord> {
        let frame_id = frame.index() as u64;

        if session.needs_reseed {
            // Seed again where the object was last seen, then search this frame.
            let Some((last_frame, last_box)) = &session.last_good else {
                return Ok(TrackRecord::sentinel(frame_id));
            };
            if let Err(e) = session.engine.initialize(last_frame, *last_box) {
                warn!(frame_id, error = %e, "re-seed failed");
                return Ok(TrackRecord::sentinel(frame_id));
            }
            debug!(frame_id, from_frame = last_frame.index(), "re-seeded at last good box");
            session.needs_reseed = false;
        }

        match session.engine.update(frame)? {
            UpdateOutcome::Tracked(estimate) => {
                let bbox = self
                    .associate(session, frame, Observation::Tracked(&estimate))
                    .unwrap_or_else(|| estimate.bounding_box());
                debug!(frame_id, ?bbox, rotation = estimate.rotation, "tracked");
                Ok(TrackRecord::new(frame_id, estimate.rotation, bbox))
            }
            UpdateOutcome::Lost => {
                warn!(frame_id, "object lost");
                self.associate(session, frame, Observation::Lost);
                if self.config.on_lost == LossPolicy::Reseed {
                    session.needs_reseed = true;
                }
                Ok(TrackRecord::sentinel(frame_id))
            }
        }
    }

    /// Feed the association tracker and return the box to record instead of
    /// the estimate, if the cross-check supplies one.
    fn associate(
        &mut self,
        session: &mut TrackingSession,
        frame: &Frame,
        observation: Observation<'_>,
    ) -> Option<BoundingBox> {
        let associator = session.associator.as_mut()?;
        let frame_id = frame.index();

        let mut detections = match observation {
            Observation::Seed(seed) => vec![Detection::from_box(&seed, 1.0)],
            Observation::Tracked(estimate) => vec![Detection::from_rect(estimate.rect, 1.0)],
            Observation::Lost => Vec::new(),
        };
        if let Some(detector) = self.detector.as_mut() {
            match detector.detect(frame) {
                Ok(found) => detections.extend(found),
                Err(e) => warn!(frame_id, error = %e, "detection source failed, skipping"),
            }
        }

        let tracks = associator.associate(detections);
        let Observation::Tracked(estimate) = observation else {
            return None;
        };
        match Associator::best_match(&tracks, &estimate.rect) {
            Some((track, iou)) if iou >= self.config.association.min_iou => {
                debug!(frame_id, track_id = track.track_id, iou, "association agrees");
                self.config
                    .association
                    .smooth
                    .then(|| BoundingBox::from(track.rect))
            }
            Some((track, iou)) => {
                debug!(frame_id, track_id = track.track_id, iou, "association disagrees");
                None
            }
            None => {
                debug!(frame_id, "no associated track");
                None
            }
        }
    }

    fn fail(&self, e: TrackError) -> TrackError {
        error!(error = %e, "tracking run failed");
        self.controller.report_error(&e.to_string());
        e
    }
}

fn resolve_range(
    frame_count: usize,
    start: usize,
    end: usize,
    process_interval: bool,
) -> TrackResult<Range<usize>> {
    let (start, end) = if process_interval {
        (start, end)
    } else {
        (0, frame_count)
    };
    if start >= end || end > frame_count {
        return Err(TrackError::InvalidRange {
            start,
            end,
            frame_count,
        });
    }
    Ok(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(10, 0, 0, false).unwrap(), 0..10);
        assert_eq!(resolve_range(10, 3, 6, true).unwrap(), 3..6);
        assert_eq!(resolve_range(10, 7, 2, false).unwrap(), 0..10);
        assert!(matches!(
            resolve_range(10, 6, 6, true),
            Err(TrackError::InvalidRange { .. })
        ));
        assert!(matches!(
            resolve_range(10, 3, 11, true),
            Err(TrackError::InvalidRange { end: 11, .. })
        ));
        assert!(resolve_range(0, 0, 0, false).is_err());
    }
}
