//! Image-space to preview-space mapping.
//!
//! The camera preview shows the frame aspect-filled (center crop), so a frame
//! coordinate is scaled up until the frame covers the preview and then shifted
//! by half of the overflow on the axis that sticks out.

use crate::types::{BoundingBox, Detection, FaceGeometry, FaceKeypoints, Point2D, Size2D};

/// Scale and crop offsets of an aspect-fill mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Projection {
    /// Mapping that fills `target` with `source`, cropping the overflow
    /// symmetrically.
    ///
    /// `source` must be non-empty; a zero-sized source is a caller bug.
    pub fn aspect_fill(source: Size2D, target: Size2D) -> Self {
        debug_assert!(!source.is_empty(), "projection source must be non-empty");

        let scale = (target.width / source.width).max(target.height / source.height);
        let scaled_width = source.width * scale;
        let scaled_height = source.height * scale;

        let pad_x = if scaled_width > target.width {
            (scaled_width - target.width) / 2.0
        } else {
            0.0
        };
        let pad_y = if scaled_height > target.height {
            (scaled_height - target.height) / 2.0
        } else {
            0.0
        };

        Self { scale, pad_x, pad_y }
    }

    pub fn apply(&self, point: Point2D) -> Point2D {
        Point2D {
            x: point.x * self.scale - self.pad_x,
            y: point.y * self.scale - self.pad_y,
        }
    }

    pub fn apply_box(&self, b: &BoundingBox) -> BoundingBox {
        BoundingBox {
            left: b.left * self.scale - self.pad_x,
            top: b.top * self.scale - self.pad_y,
            right: b.right * self.scale - self.pad_x,
            bottom: b.bottom * self.scale - self.pad_y,
        }
    }
}

/// Map one source-space point into target space.
pub fn project(point: Point2D, source: Size2D, target: Size2D) -> Point2D {
    Projection::aspect_fill(source, target).apply(point)
}

/// Project a raw detection into preview space.
///
/// Keypoints arrive normalized to the image size and are denormalized before
/// projection. Returns `None` when the detector gave fewer than six keypoints.
pub fn project_detection(
    detection: &Detection,
    image: Size2D,
    preview: Size2D,
) -> Option<FaceGeometry> {
    let normalized = FaceKeypoints::from_ordered(&detection.keypoints)?;
    let projection = Projection::aspect_fill(image, preview);

    let keypoints = normalized.map(|p| {
        projection.apply(Point2D {
            x: p.x * image.width,
            y: p.y * image.height,
        })
    });

    Some(FaceGeometry {
        keypoints,
        bounding_box: projection.apply_box(&detection.bounding_box),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_source_pads_width() {
        let p = Projection::aspect_fill(Size2D::new(640.0, 480.0), Size2D::new(1080.0, 1920.0));
        assert_eq!(p.scale, 4.0);
        // 2560 wide after scaling, 1480 overflow split evenly.
        assert_eq!(p.pad_x, 740.0);
        assert_eq!(p.pad_y, 0.0);

        let origin = project(
            Point2D::new(0.0, 0.0),
            Size2D::new(640.0, 480.0),
            Size2D::new(1080.0, 1920.0),
        );
        assert_eq!(origin, Point2D::new(-740.0, 0.0));
    }

    #[test]
    fn test_source_center_maps_to_target_center() {
        let out = project(
            Point2D::new(320.0, 240.0),
            Size2D::new(640.0, 480.0),
            Size2D::new(1080.0, 1920.0),
        );
        assert_eq!(out, Point2D::new(540.0, 960.0));
    }

    #[test]
    fn test_portrait_source() {
        let p = Projection::aspect_fill(Size2D::new(480.0, 640.0), Size2D::new(1080.0, 1920.0));
        assert_eq!(p.scale, 3.0);
        assert_eq!(p.pad_x, 180.0);
        assert_eq!(p.pad_y, 0.0);
        assert_eq!(p.apply(Point2D::new(240.0, 320.0)), Point2D::new(540.0, 960.0));
    }

    #[test]
    fn test_wide_target_pads_height() {
        let p = Projection::aspect_fill(Size2D::new(100.0, 100.0), Size2D::new(400.0, 200.0));
        assert_eq!(p.scale, 4.0);
        assert_eq!(p.pad_x, 0.0);
        assert_eq!(p.pad_y, 100.0);
    }

    #[test]
    fn test_same_aspect_has_no_padding() {
        let p = Projection::aspect_fill(Size2D::new(320.0, 240.0), Size2D::new(640.0, 480.0));
        assert_eq!(p, Projection { scale: 2.0, pad_x: 0.0, pad_y: 0.0 });
    }

    #[test]
    fn test_projection_is_deterministic() {
        let src = Size2D::new(719.0, 1283.0);
        let dst = Size2D::new(1079.0, 2011.0);
        let pt = Point2D::new(123.456, 789.012);
        assert_eq!(project(pt, src, dst), project(pt, src, dst));
    }

    #[test]
    fn test_project_detection_denormalizes_keypoints() {
        let detection = Detection {
            bounding_box: BoundingBox { left: 100.0, top: 200.0, right: 300.0, bottom: 400.0 },
            keypoints: vec![Point2D::new(0.5, 0.5); 6],
            confidence: 0.9,
        };
        let geometry = project_detection(
            &detection,
            Size2D::new(480.0, 640.0),
            Size2D::new(1080.0, 1920.0),
        )
        .unwrap();

        assert_eq!(geometry.keypoints.nose, Point2D::new(540.0, 960.0));
        assert_eq!(geometry.bounding_box.left, 100.0 * 3.0 - 180.0);
        assert_eq!(geometry.bounding_box.bottom, 400.0 * 3.0);
    }

    #[test]
    fn test_project_detection_needs_six_keypoints() {
        let detection = Detection {
            bounding_box: BoundingBox::default(),
            keypoints: vec![Point2D::new(0.5, 0.5); 4],
            confidence: 0.9,
        };
        let unit = Size2D::new(1.0, 1.0);
        assert!(project_detection(&detection, unit, unit).is_none());
    }
}
