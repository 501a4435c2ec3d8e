//! Tracking run configuration and its JSON and binary codecs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{TrackError, TrackResult};
use crate::integration::association::AssociationConfig;
use crate::record::BoundingBox;
use crate::tracker::{Algorithm, CamShiftParams, TemplateParams};

/// What to do on the frame after the tracker lost the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossPolicy {
    /// Re-initialize the primitive at the last good box.
    #[default]
    Reseed,
    /// Keep updating the primitive from its own state.
    Continue,
}

/// Parameters of one tracking run.
///
/// `algorithm` and `bounding_box` are required; everything else has a
/// default. Unknown fields in the JSON form are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(alias = "tracker-type", alias = "tracker_type")]
    pub algorithm: Algorithm,
    /// Seed box on the first frame of the range, in pixels.
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
    /// Track `[start, end)` instead of the whole clip.
    #[serde(default)]
    pub process_interval: bool,
    /// Where the durable record is written; nothing is saved when unset.
    #[serde(default, alias = "protobuf_data_path")]
    pub record_path: Option<PathBuf>,
    #[serde(default)]
    pub on_lost: LossPolicy,
    #[serde(default)]
    pub association: AssociationConfig,
    #[serde(default)]
    pub template: TemplateParams,
    #[serde(default)]
    pub camshift: CamShiftParams,
}

impl TrackingConfig {
    /// Whole-clip run with default tuning.
    pub fn new(algorithm: Algorithm, bounding_box: BoundingBox) -> Self {
        Self {
            algorithm,
            bounding_box,
            start: 0,
            end: 0,
            process_interval: false,
            record_path: None,
            on_lost: LossPolicy::default(),
            association: AssociationConfig::default(),
            template: TemplateParams::default(),
            camshift: CamShiftParams::default(),
        }
    }

    /// Restrict the run to `[start, end)`.
    pub fn with_interval(mut self, start: usize, end: usize) -> Self {
        self.start = start;
        self.end = end;
        self.process_interval = true;
        self
    }

    pub fn with_record_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.record_path = Some(path.into());
        self
    }

    pub fn with_loss_policy(mut self, policy: LossPolicy) -> Self {
        self.on_lost = policy;
        self
    }

    pub fn with_association(mut self, association: AssociationConfig) -> Self {
        self.association = association;
        self
    }

    /// Parse the JSON form.
    pub fn from_json(json: &str) -> TrackResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()
    }

    pub fn from_json_value(value: serde_json::Value) -> TrackResult<Self> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()
    }

    pub fn to_json(&self) -> TrackResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode the binary form produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> TrackResult<Self> {
        let config: Self = bincode::deserialize(bytes)?;
        config.validate()
    }

    pub fn to_bytes(&self) -> TrackResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn validate(self) -> TrackResult<Self> {
        if self.bounding_box.is_degenerate() {
            return Err(TrackError::Config(format!(
                "bounding_box {:?} has no area",
                self.bounding_box
            )));
        }
        if !(0.0..=1.0).contains(&self.association.min_iou) {
            return Err(TrackError::Config(format!(
                "association.min_iou {} outside [0, 1]",
                self.association.min_iou
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json() {
        let config = TrackingConfig::from_json(
            r#"{
                "algorithm": "template",
                "bounding_box": {"x1": 10, "y1": 10, "x2": 50, "y2": 50}
            }"#,
        )
        .unwrap();

        assert_eq!(config.algorithm, Algorithm::Template);
        assert_eq!(config.bounding_box, BoundingBox::new(10.0, 10.0, 50.0, 50.0));
        assert!(!config.process_interval);
        assert_eq!(config.on_lost, LossPolicy::Reseed);
        assert!(config.record_path.is_none());
        assert!(!config.association.enabled);
    }

    #[test]
    fn test_full_json_with_aliases_and_unknown_fields() {
        let config = TrackingConfig::from_json(
            r#"{
                "tracker-type": "CAMSHIFT",
                "bounding_box": {"x1": 1, "y1": 2, "x2": 30, "y2": 40},
                "start": 3,
                "end": 6,
                "process_interval": true,
                "protobuf_data_path": "/tmp/track.data",
                "on_lost": "continue",
                "association": {"enabled": true, "smooth": true},
                "camshift": {"bins": 32},
                "some_future_field": [1, 2, 3]
            }"#,
        )
        .unwrap();

        assert_eq!(config.algorithm, Algorithm::CamShift);
        assert_eq!((config.start, config.end), (3, 6));
        assert!(config.process_interval);
        assert_eq!(config.record_path, Some(PathBuf::from("/tmp/track.data")));
        assert_eq!(config.on_lost, LossPolicy::Continue);
        assert!(config.association.enabled && config.association.smooth);
        assert_eq!(config.association.min_iou, 0.5);
        assert_eq!(config.camshift.bins, 32);
        assert_eq!(config.camshift.max_iterations, 10);
    }

    #[test]
    fn test_missing_required_fields() {
        let no_box = TrackingConfig::from_json(r#"{"algorithm": "TEMPLATE"}"#);
        assert!(matches!(no_box, Err(TrackError::Json(_))));

        let no_algorithm =
            TrackingConfig::from_json(r#"{"bounding_box": {"x1": 0, "y1": 0, "x2": 5, "y2": 5}}"#);
        assert!(matches!(no_algorithm, Err(TrackError::Json(_))));
    }

    #[test]
    fn test_unknown_algorithm() {
        let err = TrackingConfig::from_json(
            r#"{"algorithm": "KCF", "bounding_box": {"x1": 0, "y1": 0, "x2": 5, "y2": 5}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("KCF"));
    }

    #[test]
    fn test_rejects_bad_values() {
        let degenerate = TrackingConfig::from_json(
            r#"{"algorithm": "TEMPLATE", "bounding_box": {"x1": 5, "y1": 0, "x2": 5, "y2": 5}}"#,
        );
        assert!(matches!(degenerate, Err(TrackError::Config(_))));

        let bad_iou = serde_json::json!({
            "algorithm": "TEMPLATE",
            "bounding_box": {"x1": 0, "y1": 0, "x2": 5, "y2": 5},
            "association": {"min_iou": 1.5}
        });
        assert!(matches!(
            TrackingConfig::from_json_value(bad_iou),
            Err(TrackError::Config(_))
        ));
    }

    #[test]
    fn test_backwards_interval_left_to_the_run() {
        // Ranges are checked against the clip when the run starts.
        let backwards = serde_json::json!({
            "algorithm": "TEMPLATE",
            "bounding_box": {"x1": 0, "y1": 0, "x2": 5, "y2": 5},
            "start": 6, "end": 3, "process_interval": true
        });
        let config = TrackingConfig::from_json_value(backwards).unwrap();
        assert_eq!((config.start, config.end), (6, 3));
    }

    #[test]
    fn test_binary_and_json_forms_agree() {
        let config = TrackingConfig::new(Algorithm::Template, BoundingBox::new(1.0, 2.0, 3.0, 4.0))
            .with_interval(2, 8)
            .with_record_path("out/track.bin")
            .with_loss_policy(LossPolicy::Continue);

        let from_bytes = TrackingConfig::from_bytes(&config.to_bytes().unwrap()).unwrap();
        let from_json = TrackingConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(from_bytes, config);
        assert_eq!(from_json, config);
    }

    #[test]
    fn test_truncated_binary() {
        let bytes = TrackingConfig::new(Algorithm::CamShift, BoundingBox::new(0.0, 0.0, 1.0, 1.0))
            .to_bytes()
            .unwrap();
        assert!(matches!(
            TrackingConfig::from_bytes(&bytes[..bytes.len() / 2]),
            Err(TrackError::Encoding(_))
        ));
    }
}
