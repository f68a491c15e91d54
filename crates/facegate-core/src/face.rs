use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// One face reported by the on-device detector for a single frame.
///
/// Probabilities and angles are optional because classification may be
/// disabled or fail for a given frame; detectors treat a missing value as
/// insufficient evidence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceObservation {
    pub bounds: Rect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_eye_open_probability: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_eye_open_probability: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smiling_probability: Option<f32>,
    /// Head yaw in degrees; sign follows the detector's convention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaw_angle: Option<f32>,
}

impl FaceObservation {
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            ..Default::default()
        }
    }

    pub fn with_eyes(mut self, left: f32, right: f32) -> Self {
        self.left_eye_open_probability = Some(left);
        self.right_eye_open_probability = Some(right);
        self
    }

    pub fn with_smile(mut self, probability: f32) -> Self {
        self.smiling_probability = Some(probability);
        self
    }

    pub fn with_yaw(mut self, degrees: f32) -> Self {
        self.yaw_angle = Some(degrees);
        self
    }

    /// Both eye-open probabilities, if present and finite.
    pub fn eye_open_probabilities(&self) -> Option<(f32, f32)> {
        let left = finite(self.left_eye_open_probability)?;
        let right = finite(self.right_eye_open_probability)?;
        Some((left, right))
    }

    pub fn smile(&self) -> Option<f32> {
        finite(self.smiling_probability)
    }

    pub fn yaw(&self) -> Option<f32> {
        finite(self.yaw_angle)
    }
}

fn finite(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite())
}
