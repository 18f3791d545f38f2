//! Frame buffer and face cropping.

use crate::types::{BoundingBox, Size2D};

/// A decoded camera frame, already rotated and mirrored for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Packed pixel rows (`width * height * channels` bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Bytes per pixel (1 for grayscale, 3 for RGB, 4 for RGBA).
    pub channels: u32,
    /// Monotonic frame counter assigned by the capture source.
    pub sequence: u64,
}

/// Integer pixel rectangle inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn size(&self) -> Size2D {
        Size2D::new(self.width as f32, self.height as f32)
    }

    /// Copy the face region out of this frame.
    ///
    /// Returns `None` for an empty frame or a buffer shorter than its
    /// declared dimensions.
    pub fn crop(&self, face: &BoundingBox) -> Option<Frame> {
        let stride = (self.width * self.channels) as usize;
        if self.width == 0 || self.height == 0 || self.data.len() < stride * self.height as usize {
            return None;
        }

        let rect = crop_rect(face, self.width, self.height);
        let row_bytes = (rect.width * self.channels) as usize;
        let mut data = Vec::with_capacity(row_bytes * rect.height as usize);

        for row in rect.y..rect.y + rect.height {
            let start = row as usize * stride + (rect.x * self.channels) as usize;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }

        Some(Frame {
            data,
            width: rect.width,
            height: rect.height,
            channels: self.channels,
            sequence: self.sequence,
        })
    }
}

/// Clamp a face box to the frame and truncate to whole pixels.
///
/// The result is always at least 1x1 and lies fully inside a non-empty frame.
pub fn crop_rect(face: &BoundingBox, width: u32, height: u32) -> CropRect {
    let max_x = width.saturating_sub(1);
    let max_y = height.saturating_sub(1);

    let left = (face.left.max(0.0) as u32).min(max_x);
    let top = (face.top.max(0.0) as u32).min(max_y);
    let right = face.right.min(width as f32).max(0.0) as u32;
    let bottom = face.bottom.min(height as f32).max(0.0) as u32;

    CropRect {
        x: left,
        y: top,
        width: right.saturating_sub(left).max(1).min(width - left),
        height: bottom.saturating_sub(top).max(1).min(height - top),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        Frame {
            data: (0..width * height).map(|i| i as u8).collect(),
            width,
            height,
            channels: 1,
            sequence: 7,
        }
    }

    fn bbox(left: f32, top: f32, right: f32, bottom: f32) -> BoundingBox {
        BoundingBox { left, top, right, bottom }
    }

    #[test]
    fn test_crop_rect_inside() {
        let r = crop_rect(&bbox(2.7, 3.2, 8.9, 9.0), 16, 16);
        assert_eq!(r, CropRect { x: 2, y: 3, width: 6, height: 6 });
    }

    #[test]
    fn test_crop_rect_clamps_to_frame() {
        let r = crop_rect(&bbox(-10.0, -5.0, 40.0, 30.0), 16, 12);
        assert_eq!(r, CropRect { x: 0, y: 0, width: 16, height: 12 });
    }

    #[test]
    fn test_crop_rect_minimum_one_pixel() {
        let r = crop_rect(&bbox(5.0, 5.0, 5.2, 4.0), 16, 16);
        assert_eq!(r, CropRect { x: 5, y: 5, width: 1, height: 1 });
    }

    #[test]
    fn test_crop_rect_box_past_far_edge() {
        let r = crop_rect(&bbox(30.0, 30.0, 40.0, 40.0), 16, 16);
        assert_eq!(r, CropRect { x: 15, y: 15, width: 1, height: 1 });
    }

    #[test]
    fn test_crop_copies_rows() {
        let frame = gradient(4, 4);
        let crop = frame.crop(&bbox(1.0, 1.0, 3.0, 3.0)).unwrap();
        assert_eq!((crop.width, crop.height), (2, 2));
        assert_eq!(crop.data, vec![5, 6, 9, 10]);
        assert_eq!(crop.sequence, 7);
    }

    #[test]
    fn test_crop_multi_channel() {
        let frame = Frame {
            data: (0..2 * 2 * 3).map(|i| i as u8).collect(),
            width: 2,
            height: 2,
            channels: 3,
            sequence: 0,
        };
        let crop = frame.crop(&bbox(1.0, 0.0, 2.0, 1.0)).unwrap();
        assert_eq!(crop.data, vec![3, 4, 5]);
    }

    #[test]
    fn test_crop_rejects_short_buffer() {
        let mut frame = gradient(4, 4);
        frame.data.truncate(10);
        assert!(frame.crop(&bbox(0.0, 0.0, 2.0, 2.0)).is_none());
    }
}
