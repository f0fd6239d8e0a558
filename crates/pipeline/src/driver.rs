//! Video scan loop

use crate::aggregate::{Aggregator, FrameResult, PipelineResult, ScanStats};
use crate::processor::FrameProcessor;
use crate::sampling::{SamplingLimits, SamplingPolicy};
use crate::upload::UploadedVideo;
use crate::PipelineError;
use astroguard_common::Frame;
use astroguard_decoder::{FrameSource, VideoFrameSource};
use std::path::Path;
use tracing::{error, info, warn};

/// What happened to one frame read from the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Not on the sampling grid, dropped unprocessed
    Skipped,
    /// Detector ran and the result was recorded
    Processed,
    /// Sampled but processing failed; nothing recorded
    Failed,
}

/// Samples a video, runs detection on the chosen frames and aggregates
pub struct VideoPipeline<'a> {
    processor: FrameProcessor<'a>,
    limits: SamplingLimits,
}

impl<'a> VideoPipeline<'a> {
    #[must_use]
    pub fn new(processor: FrameProcessor<'a>, limits: SamplingLimits) -> Self {
        Self { processor, limits }
    }

    /// Run an uploaded video through the ffmpeg frame source
    ///
    /// The upload is consumed: its temporary file is deleted before this
    /// returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// See [`VideoPipeline::run`]; additionally [`PipelineError::InvalidMedia`]
    /// if the upload is not a readable video.
    pub fn run_upload(&self, upload: UploadedVideo) -> Result<PipelineResult, PipelineError> {
        self.run_upload_with(upload, VideoFrameSource::open)
    }

    /// [`VideoPipeline::run_upload`] with a custom source constructor
    ///
    /// # Errors
    ///
    /// Propagates the constructor's error, then see [`VideoPipeline::run`].
    pub fn run_upload_with<S, F>(
        &self,
        upload: UploadedVideo,
        open: F,
    ) -> Result<PipelineResult, PipelineError>
    where
        S: FrameSource,
        F: FnOnce(&Path) -> astroguard_common::Result<S>,
    {
        let result = match open(upload.path()) {
            Ok(mut source) => self.run(&mut source),
            Err(e) => {
                error!("Failed to open uploaded video: {}", e);
                Err(e.into())
            }
        };
        // The source is already dropped; remove the file before reporting
        drop(upload);
        result
    }

    /// Scan `source` until a cap is hit or the stream ends
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidMedia`] if the container fails mid-stream
    /// - [`PipelineError::EmptyResult`] if no sampled frame could be processed
    pub fn run<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
    ) -> Result<PipelineResult, PipelineError> {
        let metadata = *source.metadata();
        let policy = SamplingPolicy::new(&metadata, self.limits);
        let mut aggregator = Aggregator::new(metadata);
        let mut stats = ScanStats {
            step: policy.step(),
            ..ScanStats::default()
        };

        info!(
            "Scanning video: {} frames @ {:.2} fps, sampling every {} frames",
            metadata.frame_count,
            metadata.fps,
            policy.step()
        );

        while policy.should_continue(stats.frames_scanned, stats.frames_processed) {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    error!(
                        "Video decode failed after {} frames: {}",
                        stats.frames_scanned, e
                    );
                    return Err(PipelineError::InvalidMedia(format!(
                        "Failed to decode video: {e}"
                    )));
                }
            };
            stats.frames_scanned += 1;

            match self.step(frame, &policy, &mut aggregator) {
                StepOutcome::Skipped => {}
                StepOutcome::Processed => stats.frames_processed += 1,
                StepOutcome::Failed => stats.frames_failed += 1,
            }
        }

        info!(
            "Scan finished: {} scanned, {} processed, {} failed",
            stats.frames_scanned, stats.frames_processed, stats.frames_failed
        );

        aggregator.finish(stats)
    }

    fn step(
        &self,
        frame: Frame,
        policy: &SamplingPolicy,
        aggregator: &mut Aggregator,
    ) -> StepOutcome {
        if !policy.is_sampled(frame.index) {
            return StepOutcome::Skipped;
        }

        match self.processor.process(&frame.image) {
            Ok(processed) => {
                aggregator.push(FrameResult {
                    frame_number: frame.index,
                    detections: processed.detections,
                    jpeg: processed.jpeg,
                });
                StepOutcome::Processed
            }
            Err(e) => {
                warn!("Skipping frame {}: {}", frame.index, e);
                StepOutcome::Failed
            }
        }
    }
}
