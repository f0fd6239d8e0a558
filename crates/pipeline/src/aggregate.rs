//! Result aggregation for video requests

use crate::PipelineError;
use astroguard_common::VideoMetadata;
use astroguard_object_detection::Detection;
use base64::{engine::general_purpose::STANDARD, Engine};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

/// Class name → detection count, iterated in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClassTally(IndexMap<String, u64>);

impl ClassTally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more detection of `class_name`
    pub fn increment(&mut self, class_name: &str) {
        if let Some(count) = self.0.get_mut(class_name) {
            *count += 1;
        } else {
            self.0.insert(class_name.to_string(), 1);
        }
    }

    #[must_use]
    pub fn get(&self, class_name: &str) -> Option<u64> {
        self.0.get(class_name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }

    /// Number of distinct classes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all counts
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }
}

fn serialize_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

/// One processed video frame
#[derive(Debug, Clone, Serialize)]
pub struct FrameResult {
    pub frame_number: u64,
    /// In detector order
    pub detections: Vec<Detection>,
    /// Annotated frame as JPEG, base64 in JSON
    #[serde(rename = "image", serialize_with = "serialize_base64")]
    pub jpeg: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub duration_seconds: f64,
}

/// Scan loop counters, kept for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub frames_scanned: u64,
    pub frames_processed: usize,
    pub frames_failed: usize,
    pub step: u64,
}

/// Response document for a video request
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub total_frames: u64,
    pub fps: f64,
    #[serde(rename = "processed_frames")]
    pub frame_results: Vec<FrameResult>,
    #[serde(rename = "class_counts")]
    pub class_tally: ClassTally,
    pub status: &'static str,
    pub video_info: VideoInfo,
    #[serde(skip)]
    pub stats: ScanStats,
}

/// Accumulates frame results for one request
#[derive(Debug)]
pub struct Aggregator {
    metadata: VideoMetadata,
    frame_results: Vec<FrameResult>,
    class_tally: ClassTally,
}

impl Aggregator {
    #[must_use]
    pub fn new(metadata: VideoMetadata) -> Self {
        Self {
            metadata,
            frame_results: Vec::new(),
            class_tally: ClassTally::new(),
        }
    }

    /// Append a result in scan order and count its detections
    pub fn push(&mut self, result: FrameResult) {
        for detection in &result.detections {
            self.class_tally.increment(&detection.class_name);
        }
        self.frame_results.push(result);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frame_results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frame_results.is_empty()
    }

    /// Build the response document
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyResult`] if no frame was processed.
    pub fn finish(self, stats: ScanStats) -> Result<PipelineResult, PipelineError> {
        if self.frame_results.is_empty() {
            return Err(PipelineError::EmptyResult);
        }

        Ok(PipelineResult {
            total_frames: self.metadata.frame_count,
            fps: self.metadata.fps,
            frame_results: self.frame_results,
            class_tally: self.class_tally,
            status: "success",
            video_info: VideoInfo {
                width: self.metadata.width,
                height: self.metadata.height,
                duration_seconds: self.metadata.duration_seconds(),
            },
            stats,
        })
    }
}
