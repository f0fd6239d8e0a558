//! Frame sampling policy

use astroguard_common::VideoMetadata;
use serde::{Deserialize, Serialize};

/// Global per-request caps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingLimits {
    /// Stop once this many frames produced a result
    pub max_frames_to_process: usize,
    /// Stop once this many frames were read, sampled or not
    pub max_frames_scanned: u64,
}

impl Default for SamplingLimits {
    fn default() -> Self {
        Self {
            max_frames_to_process: 20,
            max_frames_scanned: 1000,
        }
    }
}

/// Sampling step for a video: every `step`-th frame is submitted
///
/// Longer videos are sampled more sparsely. An unknown frame count (0) falls
/// in the shortest tier.
#[must_use]
pub fn sampling_step(metadata: &VideoMetadata) -> u64 {
    match metadata.frame_count {
        n if n > 300 => 15,
        n if n > 100 => 10,
        _ => 5,
    }
}

/// Sampling decisions for one video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    step: u64,
    limits: SamplingLimits,
}

impl SamplingPolicy {
    #[must_use]
    pub fn new(metadata: &VideoMetadata, limits: SamplingLimits) -> Self {
        Self {
            step: sampling_step(metadata),
            limits,
        }
    }

    #[must_use]
    pub fn step(&self) -> u64 {
        self.step
    }

    #[must_use]
    pub fn limits(&self) -> SamplingLimits {
        self.limits
    }

    /// Whether frame `index` goes to the detector
    #[must_use]
    pub fn is_sampled(&self, index: u64) -> bool {
        index % self.step == 0
    }

    /// Scan loop condition: both caps must still have room
    #[must_use]
    pub fn should_continue(&self, frames_scanned: u64, frames_processed: usize) -> bool {
        frames_scanned < self.limits.max_frames_scanned
            && frames_processed < self.limits.max_frames_to_process
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(frame_count: u64) -> VideoMetadata {
        VideoMetadata::new(frame_count, 30.0, 640, 480)
    }

    #[test]
    fn test_step_tier_boundaries() {
        assert_eq!(sampling_step(&meta(0)), 5);
        assert_eq!(sampling_step(&meta(1)), 5);
        assert_eq!(sampling_step(&meta(100)), 5);
        assert_eq!(sampling_step(&meta(101)), 10);
        assert_eq!(sampling_step(&meta(300)), 10);
        assert_eq!(sampling_step(&meta(301)), 15);
        assert_eq!(sampling_step(&meta(100_000)), 15);
    }

    #[test]
    fn test_default_limits() {
        let limits = SamplingLimits::default();
        assert_eq!(limits.max_frames_to_process, 20);
        assert_eq!(limits.max_frames_scanned, 1000);
    }

    #[test]
    fn test_is_sampled() {
        let policy = SamplingPolicy::new(&meta(200), SamplingLimits::default());
        assert_eq!(policy.step(), 10);

        let sampled: Vec<u64> = (0..35).filter(|&i| policy.is_sampled(i)).collect();
        assert_eq!(sampled, vec![0, 10, 20, 30]);
    }

    #[test]
    fn test_should_continue_stops_at_either_cap() {
        let limits = SamplingLimits {
            max_frames_to_process: 3,
            max_frames_scanned: 50,
        };
        let policy = SamplingPolicy::new(&meta(10), limits);

        assert!(policy.should_continue(0, 0));
        assert!(policy.should_continue(49, 2));
        assert!(!policy.should_continue(50, 0));
        assert!(!policy.should_continue(10, 3));
    }
}
