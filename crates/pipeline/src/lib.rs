//! Detection pipeline
//!
//! Decides which frames of an uploaded video are submitted to the detector,
//! bounds the total work per request, and folds the per-frame results into a
//! single response document. The single-image path reuses the same frame
//! processor without sampling or aggregation.
//!
//! ```text
//! upload → UploadedVideo → FrameSource → SamplingPolicy → FrameProcessor → Aggregator
//! ```

pub mod aggregate;
pub mod driver;
pub mod processor;
pub mod sampling;
pub mod single_image;
pub mod upload;

pub use aggregate::{Aggregator, ClassTally, FrameResult, PipelineResult, ScanStats, VideoInfo};
pub use driver::{StepOutcome, VideoPipeline};
pub use processor::{FrameError, FrameProcessor, FrameSettings, ProcessedFrame};
pub use sampling::{sampling_step, SamplingLimits, SamplingPolicy};
pub use single_image::{detect_image, ImageDetectionResult};
pub use upload::UploadedVideo;

use astroguard_common::ProcessingError;
use thiserror::Error;

/// Request-level failures
///
/// Per-frame failures never reach this type; they are absorbed by the driver
/// as [`StepOutcome::Failed`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The upload could not be opened or decoded as media
    #[error("Invalid media: {0}")]
    InvalidMedia(String),

    /// Every sampled frame failed, nothing to report
    #[error("No frames could be processed from the video")]
    EmptyResult,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ProcessingError> for PipelineError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::InvalidMedia(msg) => PipelineError::InvalidMedia(msg),
            other => PipelineError::Internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Internal(err.to_string())
    }
}
