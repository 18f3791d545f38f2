//! Collaborator seams for face detection and embedding extraction.
//!
//! The on-device models live outside this crate. Implementations wrap them
//! behind these traits; the engine only needs a synchronous, bounded call.

use crate::frame::Frame;
use crate::types::{Detection, Embedding};
use thiserror::Error;

/// Detections below this confidence are ignored.
pub const DEFAULT_MIN_DETECTION_CONFIDENCE: f32 = 0.7;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("detection failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("embedding failed: {0}")]
    Failed(String),
}

/// Finds faces in a frame, in the detector's own output order.
pub trait FaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectorError>;
}

/// Turns a cropped face into an embedding.
///
/// `Ok(None)` means the model produced no usable vector for this crop.
pub trait Embedder {
    fn embed(&mut self, crop: &Frame) -> Result<Option<Embedding>, EmbedderError>;
}

/// Pick the face to act on: the first detection, if confident enough.
///
/// Later detections are never considered, even when the first one is
/// rejected.
pub fn select_face(detections: &[Detection], min_confidence: f32) -> Option<&Detection> {
    detections
        .first()
        .filter(|d| d.confidence >= min_confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn det(confidence: f32) -> Detection {
        Detection {
            bounding_box: BoundingBox::default(),
            keypoints: Vec::new(),
            confidence,
        }
    }

    #[test]
    fn test_select_first_confident_face() {
        let dets = vec![det(0.9), det(0.95)];
        let face = select_face(&dets, DEFAULT_MIN_DETECTION_CONFIDENCE).unwrap();
        assert_eq!(face.confidence, 0.9);
    }

    #[test]
    fn test_confidence_gate_is_inclusive() {
        let dets = vec![det(0.7)];
        assert!(select_face(&dets, 0.7).is_some());
    }

    #[test]
    fn test_low_confidence_first_face_rejected() {
        let dets = vec![det(0.5), det(0.99)];
        assert!(select_face(&dets, DEFAULT_MIN_DETECTION_CONFIDENCE).is_none());
    }

    #[test]
    fn test_no_detections() {
        assert!(select_face(&[], DEFAULT_MIN_DETECTION_CONFIDENCE).is_none());
    }
}
