//! In-memory image decode/encode for uploads and annotated previews
//!
//! - Uploads are decoded with the `image` crate (format sniffed from the bytes)
//! - Previews are JPEG-encoded with **mozjpeg** (SIMD-optimized, smaller output at equal quality)

use crate::{ProcessingError, Result};
use image::RgbImage;

/// Decode uploaded image bytes into an RGB buffer
///
/// # Errors
///
/// Returns [`ProcessingError::InvalidMedia`] if the bytes are empty or not a
/// decodable image.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(ProcessingError::InvalidMedia("empty image upload".to_string()));
    }

    let img = image::load_from_memory(bytes)
        .map_err(|e| ProcessingError::InvalidMedia(format!("Failed to decode image: {e}")))?;

    Ok(img.to_rgb8())
}

/// Encode an RGB image as JPEG bytes
///
/// `quality` is clamped to 1-100.
///
/// # Errors
///
/// Returns [`ProcessingError::EncodeError`] if the image is empty or mozjpeg fails.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ProcessingError::EncodeError(format!(
            "Cannot encode empty image ({width}x{height})"
        )));
    }

    let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(f32::from(quality.clamp(1, 100)));

    // Rough guess: JPEG output is rarely larger than a quarter of the raw RGB size
    let estimated = (width as usize * height as usize * 3) / 4;
    let mut comp_started = comp
        .start_compress(Vec::with_capacity(estimated))
        .map_err(|e| ProcessingError::EncodeError(format!("Failed to start compression: {e}")))?;

    comp_started
        .write_scanlines(image.as_raw())
        .map_err(|e| ProcessingError::EncodeError(format!("Failed to write scanlines: {e}")))?;

    comp_started
        .finish()
        .map_err(|e| ProcessingError::EncodeError(format!("Failed to finish compression: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(img: &RgbImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_png_upload() {
        let img = RgbImage::from_pixel(50, 40, Rgb([0, 255, 0]));
        let decoded = decode_image(&png_bytes(&img)).expect("Failed to decode PNG");

        assert_eq!(decoded.dimensions(), (50, 40));
        assert_eq!(decoded.get_pixel(25, 20), &Rgb([0, 255, 0]));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidMedia(_)));

        let err = decode_image(&[]).unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidMedia(_)));
    }

    #[test]
    fn test_encoded_jpeg_is_decodable() {
        let img = RgbImage::from_pixel(120, 80, Rgb([200, 30, 30]));
        let jpeg = encode_jpeg(&img, 85).expect("Failed to encode JPEG");

        // SOI marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = decode_image(&jpeg).expect("Failed to decode encoded JPEG");
        assert_eq!(decoded.dimensions(), (120, 80));
    }

    #[test]
    fn test_lower_quality_is_not_larger() {
        let img = RgbImage::from_fn(256, 256, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
        });

        let low = encode_jpeg(&img, 30).unwrap();
        let high = encode_jpeg(&img, 95).unwrap();
        assert!(low.len() <= high.len());
    }

    #[test]
    fn test_encode_empty_image_fails() {
        let img = RgbImage::new(0, 0);
        assert!(matches!(
            encode_jpeg(&img, 85),
            Err(ProcessingError::EncodeError(_))
        ));
    }
}
