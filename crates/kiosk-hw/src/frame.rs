//! Grayscale frames and the pixel conversions the camera needs.

use std::time::Instant;
use thiserror::Error;

/// Pixel value below which a pixel counts as near-black.
const DARK_PIXEL_CEILING: u8 = 32;

/// A captured grayscale video frame (`width * height` bytes, row-major).
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: Instant,
    pub sequence: u32,
    /// Set when nearly every pixel is black (lens covered, sensor still
    /// adjusting exposure).
    pub is_dark: bool,
}

impl Frame {
    /// Wrap grayscale pixels, classifying darkness with `dark_threshold`.
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u32, dark_threshold: f32) -> Self {
        let is_dark = is_dark_frame(&data, dark_threshold);
        Self {
            data,
            width,
            height,
            captured_at: Instant::now(),
            sequence,
            is_dark,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("short frame buffer: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Keep only the luma bytes of a packed YUYV 4:2:2 buffer.
///
/// Each 4-byte group `[Y0, U, Y1, V]` carries two pixels.
pub fn yuyv_to_grayscale(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = width as usize * height as usize * 2;
    let Some(packed) = yuyv.get(..expected) else {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    };
    Ok(packed.chunks_exact(2).map(|px| px[0]).collect())
}

/// True when more than `threshold` of the pixels are near-black.
/// An empty frame is dark.
pub fn is_dark_frame(gray: &[u8], threshold: f32) -> bool {
    if gray.is_empty() {
        return true;
    }
    let dark = gray.iter().filter(|&&p| p < DARK_PIXEL_CEILING).count();
    dark as f32 / gray.len() as f32 > threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_keeps_luma_only() {
        let yuyv = [10, 200, 20, 201, 30, 202, 40, 203];
        assert_eq!(yuyv_to_grayscale(&yuyv, 4, 1).unwrap(), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_yuyv_ignores_trailing_padding() {
        let yuyv = [1, 0, 2, 0, 99, 99];
        assert_eq!(yuyv_to_grayscale(&yuyv, 2, 1).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_yuyv_short_buffer() {
        let err = yuyv_to_grayscale(&[1, 2, 3], 2, 1).unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength { expected: 4, actual: 3 }));
    }

    #[test]
    fn test_dark_detection() {
        assert!(is_dark_frame(&[], 0.95));
        assert!(is_dark_frame(&[0u8; 100], 0.95));
        assert!(!is_dark_frame(&[140u8; 100], 0.95));

        let mut covered = vec![5u8; 97];
        covered.extend([200u8; 3]);
        assert!(is_dark_frame(&covered, 0.95));

        let mut dim_room = vec![5u8; 90];
        dim_room.extend([200u8; 10]);
        assert!(!is_dark_frame(&dim_room, 0.95));
    }

    #[test]
    fn test_frame_new_classifies() {
        let frame = Frame::new(vec![0u8; 16], 4, 4, 7, 0.95);
        assert!(frame.is_dark);
        assert_eq!(frame.dimensions(), (4, 4));
        assert_eq!(frame.sequence, 7);
    }
}
