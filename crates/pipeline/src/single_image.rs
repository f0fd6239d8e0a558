//! Single-image detection

use crate::processor::{FrameError, FrameProcessor};
use crate::PipelineError;
use astroguard_common::image_io;
use astroguard_object_detection::Detection;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use tracing::error;

/// Response document for an image request
#[derive(Debug, Clone, Serialize)]
pub struct ImageDetectionResult {
    pub detections: Vec<Detection>,
    /// Annotated image, base64 JPEG
    pub image: String,
    pub count: usize,
}

/// Decode `bytes`, detect, and return detections plus an annotated preview
///
/// # Errors
///
/// - [`PipelineError::InvalidMedia`] if the bytes are not a decodable image
/// - [`PipelineError::Internal`] if detection, rendering or encoding fails
pub fn detect_image(
    processor: &FrameProcessor<'_>,
    bytes: &[u8],
) -> Result<ImageDetectionResult, PipelineError> {
    let image = image_io::decode_image(bytes)?;

    let processed = processor.process(&image).map_err(|e: FrameError| {
        error!("Image detection failed: {}", e);
        PipelineError::Internal(e.to_string())
    })?;

    Ok(ImageDetectionResult {
        count: processed.detections.len(),
        detections: processed.detections,
        image: STANDARD.encode(&processed.jpeg),
    })
}
