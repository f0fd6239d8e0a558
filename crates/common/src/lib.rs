/// Common types and utilities for image/video detection
pub mod image_io;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Processing errors
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Invalid media: {0}")]
    InvalidMedia(String),

    #[error("FFmpeg error: {0}")]
    FFmpegError(String),

    #[error("Encode error: {0}")]
    EncodeError(String),
}

/// Result type for processing operations
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Container-level properties of an opened video
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Frame count reported by the container (0 if unknown)
    pub frame_count: u64,
    /// Frames per second, always positive
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl VideoMetadata {
    /// Build metadata, substituting 1 fps when the container reports no usable rate
    #[must_use]
    pub fn new(frame_count: u64, fps: f64, width: u32, height: u32) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 1.0 };
        Self {
            frame_count,
            fps,
            width,
            height,
        }
    }

    /// Duration in seconds as `frame_count / max(1, fps)`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count as f64 / self.fps.max(1.0)
    }
}

/// Decoded RGB frame with its zero-based position in the stream
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    #[must_use]
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
