//! Pose classification against the on-screen target circle.

use crate::types::{Direction, FaceGeometry, Point2D, Size2D};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HORIZONTAL_RATIO: f32 = 0.3;
pub const DEFAULT_UP_RATIO: f32 = 0.5;
pub const DEFAULT_DOWN_RATIO: f32 = 0.1;
/// Circle radius is `min(preview width, preview height) / divisor`.
pub const DEFAULT_REGION_DIVISOR: f32 = 2.5;

/// Circle the face must stay inside, in preview space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetRegion {
    pub center: Point2D,
    pub radius: f32,
}

impl TargetRegion {
    /// Circle centered in the preview with radius `min(w, h) / divisor`.
    pub fn for_preview(preview: Size2D, divisor: f32) -> Self {
        Self {
            center: Point2D::new(preview.width / 2.0, preview.height / 2.0),
            radius: preview.width.min(preview.height) / divisor,
        }
    }

    /// Inclusive containment via squared distance.
    pub fn contains(&self, p: Point2D) -> bool {
        let dx = p.x - self.center.x;
        let dy = p.y - self.center.y;
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

/// Ratios turning face size into direction thresholds.
///
/// Up and down are asymmetric: a downward tilt must move the face center
/// much less than an upward one before it counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseThresholds {
    /// Fraction of eye-to-eye width.
    pub horizontal_ratio: f32,
    /// Fraction of eyes-to-mouth height.
    pub up_ratio: f32,
    /// Fraction of eyes-to-mouth height.
    pub down_ratio: f32,
}

impl Default for PoseThresholds {
    fn default() -> Self {
        Self {
            horizontal_ratio: DEFAULT_HORIZONTAL_RATIO,
            up_ratio: DEFAULT_UP_RATIO,
            down_ratio: DEFAULT_DOWN_RATIO,
        }
    }
}

impl PoseThresholds {
    /// Classify one face.
    ///
    /// Any keypoint outside the region yields `OutsideTargetRegion`. Otherwise
    /// the face center (mean of both eyes and the nose) is compared with the
    /// region center along the dominant axis; equal offsets go to the vertical
    /// axis.
    pub fn classify(&self, geometry: &FaceGeometry, region: &TargetRegion) -> Direction {
        let kp = &geometry.keypoints;

        if !kp.to_array().iter().all(|&p| region.contains(p)) {
            return Direction::OutsideTargetRegion;
        }

        let face_width = (kp.right_eye.x - kp.left_eye.x).abs();
        let face_height = (kp.mouth.y - (kp.left_eye.y + kp.right_eye.y) / 2.0).abs();

        let horizontal_threshold = face_width * self.horizontal_ratio;
        let up_threshold = face_height * self.up_ratio;
        let down_threshold = face_height * self.down_ratio;

        let center_x = (kp.left_eye.x + kp.right_eye.x + kp.nose.x) / 3.0;
        let center_y = (kp.left_eye.y + kp.right_eye.y + kp.nose.y) / 3.0;

        let horizontal_offset = center_x - region.center.x;
        let vertical_offset = center_y - region.center.y;

        if horizontal_offset.abs() > vertical_offset.abs() {
            if horizontal_offset.abs() > horizontal_threshold {
                if horizontal_offset > 0.0 {
                    Direction::Right
                } else {
                    Direction::Left
                }
            } else {
                Direction::Forward
            }
        } else if vertical_offset < 0.0 && vertical_offset.abs() > up_threshold {
            Direction::Up
        } else if vertical_offset > 0.0 && vertical_offset.abs() > down_threshold {
            Direction::Down
        } else {
            Direction::Forward
        }
    }
}

/// Classify with the default thresholds.
pub fn classify(geometry: &FaceGeometry, region: &TargetRegion) -> Direction {
    PoseThresholds::default().classify(geometry, region)
}
