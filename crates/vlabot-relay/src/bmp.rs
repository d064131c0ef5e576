//! Uncompressed 24-bit BMP encoding of a raw [`CameraFrame`].
//!
//! Layout written by [`encode`]:
//!
//! | Offset | Size | Field |
//! |---|---|---|
//! | 0 | 2 | `"BM"` |
//! | 2 | 4 | file size |
//! | 6 | 4 | reserved (0) |
//! | 10 | 4 | pixel data offset (54) |
//! | 14 | 4 | info header size (40) |
//! | 18 | 4 | width |
//! | 22 | 4 | height (positive: rows bottom-to-top) |
//! | 26 | 2 | planes (1) |
//! | 28 | 2 | bits per pixel (24) |
//! | 30 | 4 | compression (0 = none) |
//! | 34 | 4 | pixel data size |
//! | 38 | 16 | resolution / palette fields (0) |
//!
//! Pixel rows are BGR, stored bottom row first, each padded with zeros to a
//! multiple of four bytes.

use vlabot_hal::CameraFrame;
use vlabot_hal::camera::PixelFormat;
use vlabot_types::VlaError;

pub const FILE_HEADER_LEN: usize = 14;
pub const INFO_HEADER_LEN: usize = 40;
pub const PIXEL_OFFSET: usize = FILE_HEADER_LEN + INFO_HEADER_LEN;

/// Bytes per stored pixel row including padding.
pub fn row_stride(width: u32) -> usize {
    (width as usize * 3 + 3) & !3
}

/// Encode `frame` as a complete in-memory BMP file.
///
/// # Errors
///
/// Returns [`VlaError::NoFrame`] if the frame is empty or its buffer is
/// shorter than `width × height × 4`.
pub fn encode(frame: &CameraFrame) -> Result<Vec<u8>, VlaError> {
    if !frame.is_complete() {
        return Err(VlaError::NoFrame(format!(
            "incomplete {}x{} buffer ({} of {} bytes)",
            frame.width,
            frame.height,
            frame.data.len(),
            frame.expected_len()
        )));
    }

    let width = frame.width as usize;
    let height = frame.height as usize;
    let stride = row_stride(frame.width);
    let pixel_bytes = stride * height;
    let file_size = PIXEL_OFFSET + pixel_bytes;

    let mut out = Vec::with_capacity(file_size);
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(file_size as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(PIXEL_OFFSET as u32).to_le_bytes());

    out.extend_from_slice(&(INFO_HEADER_LEN as u32).to_le_bytes());
    out.extend_from_slice(&(frame.width as i32).to_le_bytes());
    out.extend_from_slice(&(frame.height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(pixel_bytes as u32).to_le_bytes());
    out.extend_from_slice(&[0u8; 16]);

    let padding = stride - width * 3;
    for y in (0..height).rev() {
        for x in 0..width {
            let offset = (y * width + x) * PixelFormat::BYTES_PER_PIXEL;
            let (r, g, b) = frame.format.rgb_at(&frame.data, offset);
            out.extend_from_slice(&[b, g, r]);
        }
        out.extend(std::iter::repeat_n(0u8, padding));
    }

    Ok(out)
}

/// Read `(width, height)` from the start of a BMP file.
///
/// Returns `None` unless `header` begins with a BMP signature and holds the
/// full info header dimensions.  Negative (top-down) heights are reported as
/// their magnitude.
pub fn read_dimensions(header: &[u8]) -> Option<(u32, u32)> {
    if header.len() < 26 || &header[..2] != b"BM" {
        return None;
    }
    let width = i32::from_le_bytes(header[18..22].try_into().ok()?);
    let height = i32::from_le_bytes(header[22..26].try_into().ok()?);
    if width <= 0 || height == 0 {
        return None;
    }
    Some((width as u32, height.unsigned_abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> CameraFrame {
        CameraFrame {
            width,
            height,
            format,
            data,
        }
    }

    #[test]
    fn stride_pads_to_four_bytes() {
        assert_eq!(row_stride(1), 4);
        assert_eq!(row_stride(2), 8);
        assert_eq!(row_stride(3), 12);
        assert_eq!(row_stride(4), 12);
        assert_eq!(row_stride(5), 16);
    }

    #[test]
    fn headers_are_bit_exact() {
        // 2x2 → stride 8, pixel data 16, file 70.
        let bmp = encode(&frame(2, 2, PixelFormat::Rgba, vec![0u8; 16])).unwrap();
        assert_eq!(bmp.len(), 70);
        assert_eq!(&bmp[0..2], b"BM");
        assert_eq!(u32::from_le_bytes(bmp[2..6].try_into().unwrap()), 70);
        assert_eq!(u32::from_le_bytes(bmp[6..10].try_into().unwrap()), 0);
        assert_eq!(u32::from_le_bytes(bmp[10..14].try_into().unwrap()), 54);
        assert_eq!(u32::from_le_bytes(bmp[14..18].try_into().unwrap()), 40);
        assert_eq!(i32::from_le_bytes(bmp[18..22].try_into().unwrap()), 2);
        assert_eq!(i32::from_le_bytes(bmp[22..26].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(bmp[26..28].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(bmp[28..30].try_into().unwrap()), 24);
        assert_eq!(u32::from_le_bytes(bmp[30..34].try_into().unwrap()), 0);
        assert_eq!(u32::from_le_bytes(bmp[34..38].try_into().unwrap()), 16);
        assert!(bmp[38..54].iter().all(|&b| b == 0));
    }

    #[test]
    fn rows_are_bottom_up_bgr_with_padding() {
        // Top row: red, green.  Bottom row: blue, white.
        #[rustfmt::skip]
        let data = vec![
            255, 0, 0, 255,    0, 255, 0, 255,
            0, 0, 255, 255,    255, 255, 255, 255,
        ];
        let bmp = encode(&frame(2, 2, PixelFormat::Rgba, data)).unwrap();
        let pixels = &bmp[PIXEL_OFFSET..];
        // First stored row is the bottom row: blue then white, then 2 pad bytes.
        assert_eq!(&pixels[0..8], &[255, 0, 0, 255, 255, 255, 0, 0]);
        // Second stored row is the top row: red then green.
        assert_eq!(&pixels[8..16], &[0, 0, 255, 0, 255, 0, 0, 0]);
    }

    #[test]
    fn bgra_source_is_swapped_correctly() {
        let data = vec![10, 20, 30, 255]; // B=10 G=20 R=30
        let bmp = encode(&frame(1, 1, PixelFormat::Bgra, data)).unwrap();
        assert_eq!(&bmp[PIXEL_OFFSET..PIXEL_OFFSET + 4], &[10, 20, 30, 0]);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let err = encode(&frame(4, 4, PixelFormat::Rgba, vec![0u8; 10])).unwrap_err();
        assert!(matches!(err, VlaError::NoFrame(_)));
        assert!(encode(&frame(0, 0, PixelFormat::Rgba, vec![])).is_err());
    }

    #[test]
    fn dimensions_read_back_from_header() {
        let bmp = encode(&frame(3, 5, PixelFormat::Rgba, vec![7u8; 60])).unwrap();
        assert_eq!(read_dimensions(&bmp), Some((3, 5)));
        assert_eq!(read_dimensions(b"PNG...."), None);
        assert_eq!(read_dimensions(&bmp[..20]), None);
    }
}
