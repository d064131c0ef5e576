//! `Camera` trait and the raw pixel buffer it hands out.

use vlabot_types::VlaError;

/// Byte order of a 4-channel pixel in a [`CameraFrame`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba,
    Bgra,
}

impl PixelFormat {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Read the `(r, g, b)` triple of the pixel starting at `offset`.
    pub fn rgb_at(self, data: &[u8], offset: usize) -> (u8, u8, u8) {
        let px = &data[offset..offset + Self::BYTES_PER_PIXEL];
        match self {
            PixelFormat::Rgba => (px[0], px[1], px[2]),
            PixelFormat::Bgra => (px[2], px[1], px[0]),
        }
    }
}

/// A raw frame as returned by the camera device, rows top-to-bottom.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl CameraFrame {
    /// Bytes a full buffer of these dimensions must hold.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * PixelFormat::BYTES_PER_PIXEL
    }

    /// `true` when the frame has non-zero size and the buffer covers it.
    pub fn is_complete(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() >= self.expected_len()
    }
}

/// An image-capture device.
pub trait Camera: Send + Sync {
    /// Stable device name, e.g. `"camera rgb"`.
    fn id(&self) -> &str;

    /// Return the current image buffer.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::NoFrame`] when the device has no image yet (e.g.
    /// during the first simulation step) or [`VlaError::HardwareFault`] on a
    /// device failure.
    fn capture(&mut self) -> Result<CameraFrame, VlaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_at_swaps_for_bgra() {
        let data = [10u8, 20, 30, 255];
        assert_eq!(PixelFormat::Rgba.rgb_at(&data, 0), (10, 20, 30));
        assert_eq!(PixelFormat::Bgra.rgb_at(&data, 0), (30, 20, 10));
    }

    #[test]
    fn truncated_buffer_is_incomplete() {
        let frame = CameraFrame {
            width: 2,
            height: 2,
            format: PixelFormat::Rgba,
            data: vec![0u8; 15],
        };
        assert_eq!(frame.expected_len(), 16);
        assert!(!frame.is_complete());

        let empty = CameraFrame {
            width: 0,
            height: 0,
            format: PixelFormat::Rgba,
            data: Vec::new(),
        };
        assert!(!empty.is_complete());
    }
}
