//! Per-frame detection: downscale, predict, name, render, encode

use astroguard_common::{image_io, ProcessingError};
use astroguard_object_detection::{ClassNames, Detection, Detector, ObjectDetectionError};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;
use tracing::debug;

/// Knobs for one kind of request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSettings {
    /// Minimum detector confidence (0.0-1.0)
    pub confidence: f32,
    /// JPEG quality of the annotated preview (1-100)
    pub jpeg_quality: u8,
    /// Frames larger than `(width, height)` are downscaled to fit, keeping aspect ratio
    pub max_dimension: Option<(u32, u32)>,
}

impl FrameSettings {
    /// Video frames: lower threshold, smaller previews
    #[must_use]
    pub fn video() -> Self {
        Self {
            confidence: 0.4,
            jpeg_quality: 85,
            max_dimension: Some((1280, 720)),
        }
    }

    /// Single uploaded image: full resolution, high quality preview
    #[must_use]
    pub fn image() -> Self {
        Self {
            confidence: 0.5,
            jpeg_quality: 95,
            max_dimension: None,
        }
    }
}

/// Failure while processing a single frame
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Prediction failed: {0}")]
    Predict(#[source] ObjectDetectionError),

    #[error("Rendering failed: {0}")]
    Render(#[source] ObjectDetectionError),

    #[error("Encoding failed: {0}")]
    Encode(#[source] ProcessingError),
}

/// Detections plus the JPEG-encoded annotated frame
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub detections: Vec<Detection>,
    pub jpeg: Vec<u8>,
}

/// Runs one frame through the detector with fixed settings
#[derive(Clone, Copy)]
pub struct FrameProcessor<'a> {
    detector: &'a dyn Detector,
    class_names: &'a ClassNames,
    settings: FrameSettings,
}

impl<'a> FrameProcessor<'a> {
    #[must_use]
    pub fn new(
        detector: &'a dyn Detector,
        class_names: &'a ClassNames,
        settings: FrameSettings,
    ) -> Self {
        Self {
            detector,
            class_names,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &FrameSettings {
        &self.settings
    }

    /// Detect, annotate and encode `image`
    ///
    /// Detections keep the detector's order.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] naming the step that failed.
    pub fn process(&self, image: &RgbImage) -> Result<ProcessedFrame, FrameError> {
        let image = match self.settings.max_dimension {
            Some((max_width, max_height)) => fit_within(image, max_width, max_height),
            None => Cow::Borrowed(image),
        };

        let detections: Vec<Detection> = self
            .detector
            .predict(&image, self.settings.confidence)
            .map_err(FrameError::Predict)?
            .into_iter()
            .map(|raw| Detection::from_raw(raw, self.class_names))
            .collect();

        debug!(
            "{} detections on {}x{} frame",
            detections.len(),
            image.width(),
            image.height()
        );

        let annotated = self
            .detector
            .render(&image, &detections)
            .map_err(FrameError::Render)?;
        let jpeg = image_io::encode_jpeg(&annotated, self.settings.jpeg_quality)
            .map_err(FrameError::Encode)?;

        Ok(ProcessedFrame { detections, jpeg })
    }
}

/// Downscale `image` to fit `max_width`x`max_height`, preserving aspect ratio
///
/// Images already within bounds are returned unchanged.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn fit_within(image: &RgbImage, max_width: u32, max_height: u32) -> Cow<'_, RgbImage> {
    let (width, height) = image.dimensions();
    if width <= max_width && height <= max_height {
        return Cow::Borrowed(image);
    }

    let scale = (f64::from(max_width) / f64::from(width))
        .min(f64::from(max_height) / f64::from(height));
    let new_width = ((f64::from(width) * scale).round() as u32).clamp(1, max_width.max(1));
    let new_height = ((f64::from(height) * scale).round() as u32).clamp(1, max_height.max(1));

    Cow::Owned(image::imageops::resize(
        image,
        new_width,
        new_height,
        image::imageops::FilterType::Triangle,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use astroguard_object_detection::{PixelBox, RawDetection};
    use std::sync::Mutex;

    /// Records the size of every image it sees and returns fixed detections
    struct RecordingDetector {
        seen: Mutex<Vec<(u32, u32)>>,
        detections: Vec<RawDetection>,
    }

    impl Detector for RecordingDetector {
        fn predict(
            &self,
            image: &RgbImage,
            _confidence_threshold: f32,
        ) -> Result<Vec<RawDetection>, ObjectDetectionError> {
            self.seen.lock().unwrap().push(image.dimensions());
            Ok(self.detections.clone())
        }
    }

    struct BrokenRenderer;

    impl Detector for BrokenRenderer {
        fn predict(&self, _: &RgbImage, _: f32) -> Result<Vec<RawDetection>, ObjectDetectionError> {
            Ok(Vec::new())
        }

        fn render(&self, _: &RgbImage, _: &[Detection]) -> Result<RgbImage, ObjectDetectionError> {
            Err(ObjectDetectionError::ImageProcessing("no canvas".to_string()))
        }
    }

    fn raw(class_id: u32, confidence: f32) -> RawDetection {
        RawDetection {
            class_id,
            confidence,
            bbox: PixelBox::new(1, 1, 20, 20),
        }
    }

    #[test]
    fn test_presets() {
        let video = FrameSettings::video();
        assert_eq!(video.confidence, 0.4);
        assert_eq!(video.jpeg_quality, 85);
        assert_eq!(video.max_dimension, Some((1280, 720)));

        let image = FrameSettings::image();
        assert_eq!(image.confidence, 0.5);
        assert_eq!(image.jpeg_quality, 95);
        assert_eq!(image.max_dimension, None);
    }

    #[test]
    fn test_fit_within_preserves_aspect_ratio() {
        let img = RgbImage::new(1920, 1080);
        assert_eq!(fit_within(&img, 1280, 720).dimensions(), (1280, 720));

        let tall = RgbImage::new(1000, 2000);
        assert_eq!(fit_within(&tall, 1280, 720).dimensions(), (360, 720));

        let small = RgbImage::new(640, 480);
        assert!(matches!(fit_within(&small, 1280, 720), Cow::Borrowed(_)));
    }

    #[test]
    fn test_process_names_detections_in_detector_order() {
        let detector = RecordingDetector {
            seen: Mutex::new(Vec::new()),
            detections: vec![raw(1, 0.6), raw(0, 0.9), raw(42, 0.7)],
        };
        let classes = ClassNames::new(vec!["rock".to_string(), "panel".to_string()]);
        let processor = FrameProcessor::new(&detector, &classes, FrameSettings::video());

        let frame = processor.process(&RgbImage::new(2560, 1440)).unwrap();

        let names: Vec<_> = frame.detections.iter().map(|d| d.class_name.as_str()).collect();
        assert_eq!(names, vec!["panel", "rock", "Class 42"]);
        assert_eq!(&frame.jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(*detector.seen.lock().unwrap(), vec![(1280, 720)]);
    }

    #[test]
    fn test_image_settings_do_not_downscale() {
        let detector = RecordingDetector {
            seen: Mutex::new(Vec::new()),
            detections: Vec::new(),
        };
        let classes = ClassNames::coco();
        let processor = FrameProcessor::new(&detector, &classes, FrameSettings::image());

        processor.process(&RgbImage::new(2000, 1500)).unwrap();
        assert_eq!(*detector.seen.lock().unwrap(), vec![(2000, 1500)]);
    }

    #[test]
    fn test_render_failure_is_frame_error() {
        let classes = ClassNames::coco();
        let processor = FrameProcessor::new(&BrokenRenderer, &classes, FrameSettings::video());

        let result = processor.process(&RgbImage::new(32, 32));
        assert!(matches!(result, Err(FrameError::Render(_))));
    }
}
