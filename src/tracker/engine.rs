//! Init/update state machine around one tracker primitive.

use tracing::debug;

use crate::error::{TrackError, TrackResult};
use crate::frame::Frame;
use crate::record::BoundingBox;
use crate::tracker::camshift::CamShiftParams;
use crate::tracker::primitive::{Algorithm, Estimate, TrackerPrimitive};
use crate::tracker::template::TemplateParams;

/// Result of advancing the engine by one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOutcome {
    Tracked(Estimate),
    /// The primitive lost the object on this frame.
    Lost,
}

/// Owns exactly one tracker primitive and gates its use.
///
/// `update` is refused until `initialize` has succeeded. The engine never
/// re-initializes on its own: after a [`UpdateOutcome::Lost`] it is up to the
/// caller to decide whether to re-seed or keep updating.
pub struct TrackerEngine {
    algorithm_name: String,
    primitive: Box<dyn TrackerPrimitive>,
    current_box: Option<BoundingBox>,
    initialized: bool,
}

impl TrackerEngine {
    /// Engine over one of the built-in primitives.
    pub fn new(algorithm: Algorithm, template: &TemplateParams, camshift: &CamShiftParams) -> Self {
        Self::with_primitive(algorithm.name(), algorithm.create(template, camshift))
    }

    /// Engine over a caller-supplied primitive.
    pub fn with_primitive(
        algorithm_name: impl Into<String>,
        primitive: Box<dyn TrackerPrimitive>,
    ) -> Self {
        Self {
            algorithm_name: algorithm_name.into(),
            primitive,
            current_box: None,
            initialized: false,
        }
    }

    pub fn algorithm_name(&self) -> &str {
        &self.algorithm_name
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Latest box estimate, if any frame has been tracked.
    pub fn current_box(&self) -> Option<BoundingBox> {
        self.current_box
    }

    /// Bind the primitive to `seed` on `frame`.
    ///
    /// # Errors
    ///
    /// [`TrackError::InitializationFailed`] if the seed is degenerate, does not
    /// fit inside the frame, or is rejected by the primitive. The engine is left
    /// uninitialized in every case.
    pub fn initialize(&mut self, frame: &Frame, seed: BoundingBox) -> TrackResult<()> {
        let frame_id = frame.index() as u64;
        self.initialized = false;

        if seed.is_degenerate() {
            return Err(TrackError::init_failed(
                frame_id,
                format!("degenerate seed box {seed:?}"),
            ));
        }
        if !seed.fits_within(frame.width(), frame.height()) {
            return Err(TrackError::init_failed(
                frame_id,
                format!(
                    "seed box {seed:?} outside {}x{} frame",
                    frame.width(),
                    frame.height()
                ),
            ));
        }
        if !self.primitive.init(frame, seed.to_rect()) {
            return Err(TrackError::init_failed(
                frame_id,
                format!("{} tracker rejected seed box", self.algorithm_name),
            ));
        }

        debug!(frame_id, algorithm = %self.algorithm_name, "tracker initialized");
        self.current_box = Some(seed);
        self.initialized = true;
        Ok(())
    }

    /// Advance the primitive by one frame.
    pub fn update(&mut self, frame: &Frame) -> TrackResult<UpdateOutcome> {
        if !self.initialized {
            return Err(TrackError::NotInitialized);
        }

        match self.primitive.update(frame) {
            Some(estimate) => {
                self.current_box = Some(estimate.bounding_box());
                Ok(UpdateOutcome::Tracked(estimate))
            }
            None => Ok(UpdateOutcome::Lost),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::rect::Rect;
    use ndarray::Array2;

    /// Accepts any seed and reports it back unchanged.
    struct Stationary(Option<Rect>);

    impl TrackerPrimitive for Stationary {
        fn init(&mut self, _frame: &Frame, seed: Rect) -> bool {
            self.0 = Some(seed);
            true
        }

        fn update(&mut self, _frame: &Frame) -> Option<Estimate> {
            self.0.map(|rect| Estimate::new(rect, 0.0))
        }
    }

    fn frame(index: usize) -> Frame {
        Frame::from_gray(index, Array2::zeros((100, 100)))
    }

    fn engine() -> TrackerEngine {
        TrackerEngine::with_primitive("STATIONARY", Box::new(Stationary(None)))
    }

    #[test]
    fn test_update_before_initialize() {
        let mut engine = engine();
        assert!(matches!(engine.update(&frame(0)), Err(TrackError::NotInitialized)));
    }

    #[test]
    fn test_initialize_then_update() {
        let mut engine = engine();
        let seed = BoundingBox::new(10.0, 10.0, 50.0, 50.0);
        engine.initialize(&frame(0), seed).unwrap();
        assert!(engine.is_initialized());

        match engine.update(&frame(1)).unwrap() {
            UpdateOutcome::Tracked(est) => assert_eq!(est.bounding_box(), seed),
            UpdateOutcome::Lost => panic!("stationary tracker lost the object"),
        }
        assert_eq!(engine.current_box(), Some(seed));
    }

    #[test]
    fn test_rejects_degenerate_seed() {
        let mut engine = engine();
        let err = engine
            .initialize(&frame(4), BoundingBox::new(10.0, 10.0, 10.0, 40.0))
            .unwrap_err();
        assert!(matches!(err, TrackError::InitializationFailed { frame_id: 4, .. }));
        assert!(!engine.is_initialized());
    }

    #[test]
    fn test_rejects_seed_outside_frame() {
        let mut engine = engine();
        let err = engine
            .initialize(&frame(0), BoundingBox::new(80.0, 80.0, 120.0, 120.0))
            .unwrap_err();
        assert!(matches!(err, TrackError::InitializationFailed { .. }));
        assert!(matches!(engine.update(&frame(1)), Err(TrackError::NotInitialized)));
    }

    #[test]
    fn test_builtin_algorithm_name() {
        let engine = TrackerEngine::new(
            Algorithm::CamShift,
            &TemplateParams::default(),
            &CamShiftParams::default(),
        );
        assert_eq!(engine.algorithm_name(), "CAMSHIFT");
    }
}
