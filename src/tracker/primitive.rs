//! Single-object tracker capability and the name-based factory over it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TrackError;
use crate::frame::Frame;
use crate::record::BoundingBox;
use crate::tracker::camshift::{CamShiftParams, CamShiftTracker};
use crate::tracker::rect::Rect;
use crate::tracker::template::{TemplateParams, TemplateTracker};

/// Box and orientation produced by one successful update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub rect: Rect,
    /// Degrees; 0 for primitives without orientation support.
    pub rotation: f32,
}

impl Estimate {
    pub fn new(rect: Rect, rotation: f32) -> Self {
        Self { rect, rotation }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from(self.rect)
    }
}

/// A single-object visual tracker.
///
/// `init` binds the tracker to a seed box on a frame; `update` estimates the
/// box on a later frame. Both report failure instead of erroring: a rejected
/// seed or a lost object is an expected outcome.
///
/// # Example
///
/// ```ignore
/// use clip_tracker::tracker::{Estimate, Rect, TrackerPrimitive};
/// use clip_tracker::Frame;
///
/// struct Stationary(Option<Rect>);
///
/// impl TrackerPrimitive for Stationary {
///     fn init(&mut self, _frame: &Frame, seed: Rect) -> bool {
///         self.0 = Some(seed);
///         true
///     }
///
///     fn update(&mut self, _frame: &Frame) -> Option<Estimate> {
///         self.0.map(|rect| Estimate::new(rect, 0.0))
///     }
/// }
/// ```
pub trait TrackerPrimitive: Send {
    fn init(&mut self, frame: &Frame, seed: Rect) -> bool;

    fn update(&mut self, frame: &Frame) -> Option<Estimate>;
}

/// Built-in tracker primitives, selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Algorithm {
    Template,
    CamShift,
}

impl Algorithm {
    pub const ALL: [Algorithm; 2] = [Algorithm::Template, Algorithm::CamShift];

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Template => "TEMPLATE",
            Algorithm::CamShift => "CAMSHIFT",
        }
    }

    /// Instantiate the primitive this algorithm names.
    pub fn create(
        &self,
        template: &TemplateParams,
        camshift: &CamShiftParams,
    ) -> Box<dyn TrackerPrimitive> {
        match self {
            Algorithm::Template => Box::new(TemplateTracker::new(template.clone())),
            Algorithm::CamShift => Box::new(CamShiftTracker::new(camshift.clone())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| TrackError::UnknownAlgorithm(s.to_string()))
    }
}

impl TryFrom<String> for Algorithm {
    type Error = TrackError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Algorithm> for String {
    fn from(algorithm: Algorithm) -> Self {
        algorithm.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_names() {
        assert_eq!("template".parse::<Algorithm>().unwrap(), Algorithm::Template);
        assert_eq!(" CamShift ".parse::<Algorithm>().unwrap(), Algorithm::CamShift);
        assert!(matches!(
            "KCF".parse::<Algorithm>(),
            Err(TrackError::UnknownAlgorithm(name)) if name == "KCF"
        ));
        assert_eq!(Algorithm::CamShift.to_string(), "CAMSHIFT");
    }
}
