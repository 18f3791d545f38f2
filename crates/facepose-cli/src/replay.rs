//! Recorded detection traces, replayed through the engine as if live.
//!
//! One JSON object per line:
//! `{"image":[w,h],"preview":[w,h],"detections":[...],"embedding":[...]|null}`.
//! Detections use the detector's own shape: a pixel bounding box and
//! normalized keypoints.

use anyhow::{Context, Result};
use facepose_core::detector::{DetectorError, EmbedderError};
use facepose_core::{Detection, Embedder, Embedding, FaceDetector, Frame, Size2D};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct TraceFrame {
    pub image: [u32; 2],
    pub preview: [f32; 2],
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl TraceFrame {
    pub fn image_size(&self) -> Size2D {
        Size2D::new(self.image[0] as f32, self.image[1] as f32)
    }

    pub fn preview_size(&self) -> Size2D {
        Size2D::new(self.preview[0], self.preview[1])
    }

    /// Blank grayscale frame with the recorded dimensions.
    pub fn frame(&self, sequence: u64) -> Frame {
        let [width, height] = self.image;
        Frame {
            data: vec![0; width as usize * height as usize],
            width,
            height,
            channels: 1,
            sequence,
        }
    }
}

pub fn parse_trace(src: &str) -> Result<Vec<TraceFrame>> {
    src.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("trace line {}", n + 1))
        })
        .collect()
}

pub fn load_trace(path: &Path) -> Result<Vec<TraceFrame>> {
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read trace {}", path.display()))?;
    let frames = parse_trace(&src)?;
    tracing::info!(path = %path.display(), frames = frames.len(), "trace loaded");
    Ok(frames)
}

/// Answers `detect` with the detections recorded for the frame's sequence.
pub struct ReplayDetector {
    trace: Arc<[TraceFrame]>,
}

impl ReplayDetector {
    pub fn new(trace: Arc<[TraceFrame]>) -> Self {
        Self { trace }
    }
}

impl FaceDetector for ReplayDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
        self.trace
            .get(frame.sequence as usize)
            .map(|t| t.detections.clone())
            .ok_or_else(|| {
                DetectorError::Failed(format!("no trace entry for frame {}", frame.sequence))
            })
    }
}

/// Answers `embed` with the vector recorded for the crop's source frame.
pub struct ReplayEmbedder {
    trace: Arc<[TraceFrame]>,
}

impl ReplayEmbedder {
    pub fn new(trace: Arc<[TraceFrame]>) -> Self {
        Self { trace }
    }
}

impl Embedder for ReplayEmbedder {
    fn embed(&mut self, crop: &Frame) -> Result<Option<Embedding>, EmbedderError> {
        let entry = self
            .trace
            .get(crop.sequence as usize)
            .ok_or_else(|| {
                EmbedderError::Failed(format!("no trace entry for frame {}", crop.sequence))
            })?;
        Ok(entry.embedding.clone().map(Embedding::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = concat!(
        r#"{"image":[640,480],"preview":[1080,1920],"detections":[{"#,
        r#""bounding_box":{"left":10,"top":20,"right":110,"bottom":140},"#,
        r#""keypoints":[{"x":0.4,"y":0.4},{"x":0.6,"y":0.4},{"x":0.5,"y":0.5},"#,
        r#"{"x":0.5,"y":0.6},{"x":0.3,"y":0.45},{"x":0.7,"y":0.45}],"#,
        r#""confidence":0.93}],"embedding":[0.5,-0.5]}"#,
    );

    #[test]
    fn test_parse_trace_skips_blank_lines() {
        let src = format!("{LINE}\n\n{{\"image\":[640,480],\"preview\":[1080,1920]}}\n");
        let trace = parse_trace(&src).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[0].detections.len(), 1);
        assert_eq!(trace[0].detections[0].keypoints.len(), 6);
        assert_eq!(trace[0].embedding, Some(vec![0.5, -0.5]));
        assert!(trace[1].detections.is_empty());
        assert_eq!(trace[1].embedding, None);
    }

    #[test]
    fn test_parse_error_names_line() {
        let src = format!("{LINE}\nnot json\n");
        let err = parse_trace(&src).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_replay_follows_frame_sequence() {
        let trace: Arc<[TraceFrame]> = parse_trace(LINE).unwrap().into();
        let mut detector = ReplayDetector::new(trace.clone());
        let mut embedder = ReplayEmbedder::new(trace.clone());

        let frame = trace[0].frame(0);
        assert_eq!(frame.data.len(), 640 * 480);
        assert_eq!(detector.detect(&frame).unwrap().len(), 1);
        assert_eq!(embedder.embed(&frame).unwrap().unwrap().values, vec![0.5, -0.5]);

        assert!(detector.detect(&trace[0].frame(1)).is_err());
    }
}
