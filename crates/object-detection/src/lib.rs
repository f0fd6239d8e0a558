//! Object detection using `YOLOv8` via ONNX Runtime
//!
//! This crate defines the [`Detector`] capability consumed by the detection
//! pipeline and ships one implementation, [`YoloDetector`], that runs a
//! `YOLOv8` model exported to ONNX format.
//!
//! # Features
//! - Any `YOLOv8` export (COCO or custom-trained, class count read from the model output)
//! - Per-call confidence threshold, configurable `IoU` threshold
//! - Non-maximum suppression (NMS) for duplicate removal
//! - Boxes reported in pixel coordinates of the input image
//! - Annotated previews with per-class colors (see [`annotate`])
//!
//! # Example
//! ```no_run
//! use astroguard_object_detection::{ClassNames, Detection, Detector, ObjectDetectionConfig, YoloDetector};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let detector = YoloDetector::new("yolov8s.onnx", ObjectDetectionConfig::default())?;
//! let classes = ClassNames::coco();
//!
//! let img = image::open("image.jpg")?.to_rgb8();
//! for raw in detector.predict(&img, 0.5)? {
//!     let detection = Detection::from_raw(raw, &classes);
//!     println!("{}: {:.2}%", detection.class_name, detection.confidence * 100.0);
//! }
//! # Ok(())
//! # }
//! ```

pub mod annotate;
mod class_names;

pub use annotate::LabelFont;
pub use class_names::{ClassNames, COCO_CLASSES};

use image::RgbImage;
use ndarray::Array;
use ort::{
    ep::CPU as CPUExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session, SessionOutputs},
    value::TensorRef,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

/// `YOLOv8` model size variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YOLOModel {
    /// `YOLOv8` Nano - fastest inference
    Nano,
    /// `YOLOv8` Small - balanced speed/accuracy
    Small,
    /// `YOLOv8` Medium - good accuracy
    Medium,
    /// `YOLOv8` Large - high accuracy
    Large,
    /// `YOLOv8` `XLarge` - highest accuracy
    XLarge,
}

impl YOLOModel {
    /// Get the typical model filename for this size
    #[must_use]
    pub fn filename(&self) -> &'static str {
        match self {
            YOLOModel::Nano => "yolov8n.onnx",
            YOLOModel::Small => "yolov8s.onnx",
            YOLOModel::Medium => "yolov8m.onnx",
            YOLOModel::Large => "yolov8l.onnx",
            YOLOModel::XLarge => "yolov8x.onnx",
        }
    }
}

/// Model-level configuration (the confidence threshold is chosen per call)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDetectionConfig {
    /// `IoU` threshold for non-maximum suppression (0.0-1.0)
    pub iou_threshold: f32,
    /// Maximum number of detections to return per image
    pub max_detections: usize,
    /// Input image size (`YOLOv8` default is 640x640)
    pub input_size: u32,
}

impl Default for ObjectDetectionConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.45,
            max_detections: 300,
            input_size: 640,
        }
    }
}

/// Axis-aligned box in model-space floats (top-left + size), used before scaling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Create a new bounding box
    #[must_use]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from YOLO center format
    #[must_use]
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    /// Get area of bounding box
    #[must_use]
    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Calculate Intersection over Union (`IoU`) with another box
    #[must_use]
    #[inline]
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection_width = (x2 - x1).max(0.0);
        let intersection_height = (y2 - y1).max(0.0);
        let intersection_area = intersection_width * intersection_height;

        let union_area = self.area() + other.area() - intersection_area;

        if union_area > 0.0 {
            intersection_area / union_area
        } else {
            0.0
        }
    }

    /// Scale into an image's pixel space and clamp to its bounds
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn to_pixel_box(&self, scale_x: f32, scale_y: f32, width: u32, height: u32) -> PixelBox {
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;

        let x1 = (self.x * scale_x).clamp(0.0, max_x);
        let y1 = (self.y * scale_y).clamp(0.0, max_y);
        let x2 = ((self.x + self.width) * scale_x).clamp(0.0, max_x);
        let y2 = ((self.y + self.height) * scale_y).clamp(0.0, max_y);

        PixelBox::new(x1 as i32, y1 as i32, x2 as i32, y2 as i32)
    }
}

/// Integer pixel box, serialized as `[x1, y1, x2, y2]`
///
/// Always holds `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct PixelBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl PixelBox {
    /// Create a box from two corners in any order
    #[must_use]
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.x2.abs_diff(self.x1)
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.y2.abs_diff(self.y1)
    }
}

impl From<[i32; 4]> for PixelBox {
    fn from([x1, y1, x2, y2]: [i32; 4]) -> Self {
        Self::new(x1, y1, x2, y2)
    }
}

impl From<PixelBox> for [i32; 4] {
    fn from(b: PixelBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Detector output before class names are attached
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: PixelBox,
}

/// Object detection result as exposed over the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    /// Human-readable class name (`"Class {id}"` when the id is outside the table)
    pub class_name: String,
    /// Confidence score (0-1)
    pub confidence: f32,
    pub bbox: PixelBox,
}

impl Detection {
    /// Attach a class name to a raw detection
    #[must_use]
    pub fn from_raw(raw: RawDetection, class_names: &ClassNames) -> Self {
        Self {
            class_id: raw.class_id,
            class_name: class_names.name_for(raw.class_id),
            confidence: raw.confidence,
            bbox: raw.bbox,
        }
    }
}

/// Object-detection capability
///
/// Implementations are built once at startup and shared across requests, so
/// both methods take `&self`.
pub trait Detector: Send + Sync {
    /// Detect objects in `image`, keeping only those scoring at least `confidence_threshold`
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails for this image.
    fn predict(
        &self,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>, ObjectDetectionError>;

    /// Draw `detections` onto a copy of `image`
    ///
    /// # Errors
    ///
    /// Returns an error if the annotated copy cannot be produced.
    fn render(
        &self,
        image: &RgbImage,
        detections: &[Detection],
    ) -> Result<RgbImage, ObjectDetectionError> {
        Ok(annotate::draw_detections(image, detections, None))
    }
}

/// Lock `mutex`, taking the guard back from a panicked holder
///
/// The session keeps no per-call state across `run`, so a panic mid-inference
/// leaves it reusable.
fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Object detector using a `YOLOv8` ONNX model
pub struct YoloDetector {
    /// `Session::run` requires `&mut self`; one inference at a time
    session: Mutex<Session>,
    config: ObjectDetectionConfig,
    label_font: Option<LabelFont>,
}

impl YoloDetector {
    /// Load a `YOLOv8` ONNX model with CPU execution and graph optimizations
    ///
    /// # Errors
    ///
    /// Returns [`ObjectDetectionError::ModelLoad`] if the file is missing or
    /// ONNX Runtime rejects it.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        config: ObjectDetectionConfig,
    ) -> Result<Self, ObjectDetectionError> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(ObjectDetectionError::ModelLoad(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }

        info!("Loading YOLOv8 model from {}", model_path.display());

        let session = Session::builder()
            .map_err(|e| ObjectDetectionError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ObjectDetectionError::ModelLoad(e.to_string()))?
            .with_intra_threads(num_cpus::get_physical())
            .map_err(|e| ObjectDetectionError::ModelLoad(e.to_string()))?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| ObjectDetectionError::ModelLoad(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| ObjectDetectionError::ModelLoad(e.to_string()))?;

        info!("YOLOv8 model loaded successfully");

        Ok(Self {
            session: Mutex::new(session),
            config,
            label_font: None,
        })
    }

    /// Render label text with `font` on annotated previews
    #[must_use]
    pub fn with_label_font(mut self, font: LabelFont) -> Self {
        self.label_font = Some(font);
        self
    }

    /// Resize to the model input and convert to normalized CHW (1, 3, H, W)
    fn preprocess(&self, image: &RgbImage) -> Array<f32, ndarray::Dim<[usize; 4]>> {
        let input_size = self.config.input_size;

        let resized = image::imageops::resize(
            image,
            input_size,
            input_size,
            image::imageops::FilterType::Triangle,
        );

        let mut input_array = Array::zeros((1, 3, input_size as usize, input_size as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            input_array[[0, 0, y, x]] = f32::from(pixel[0]) / 255.0;
            input_array[[0, 1, y, x]] = f32::from(pixel[1]) / 255.0;
            input_array[[0, 2, y, x]] = f32::from(pixel[2]) / 255.0;
        }

        input_array
    }

    /// Decode the `(1, 4 + classes, anchors)` output into model-space candidates
    fn postprocess(
        outputs: &SessionOutputs,
        confidence_threshold: f32,
    ) -> Result<Vec<(u32, f32, BoundingBox)>, ObjectDetectionError> {
        let (shape, data) = outputs[0].try_extract_tensor::<f32>().map_err(|e| {
            ObjectDetectionError::Inference(format!("Failed to extract tensor: {e}"))
        })?;

        debug!("ONNX output shape: {:?}", shape);

        let dims = shape.as_ref();
        if dims.len() != 3 || dims[1] <= 4 {
            return Err(ObjectDetectionError::Inference(format!(
                "Expected (1, 4 + classes, anchors) output, got {dims:?}"
            )));
        }

        let num_classes = dims[1] as usize - 4;
        let num_anchors = dims[2] as usize;
        let mut candidates = Vec::with_capacity(num_anchors / 10);

        // Layout is [batch, features, anchors]: feature f of anchor a is at f * anchors + a
        for anchor_idx in 0..num_anchors {
            let get_feature = |feature_idx: usize| data[feature_idx * num_anchors + anchor_idx];

            let mut max_prob = 0.0f32;
            let mut max_class_id = 0usize;
            for class_id in 0..num_classes {
                let prob = get_feature(4 + class_id);
                if prob > max_prob {
                    max_prob = prob;
                    max_class_id = class_id;
                }
            }

            if max_prob < confidence_threshold {
                continue;
            }

            let bbox = BoundingBox::from_center(
                get_feature(0),
                get_feature(1),
                get_feature(2),
                get_feature(3),
            );
            #[allow(clippy::cast_possible_truncation)]
            candidates.push((max_class_id as u32, max_prob, bbox));
        }

        debug!("Raw detections before NMS: {}", candidates.len());
        Ok(candidates)
    }
}

impl Detector for YoloDetector {
    #[allow(clippy::cast_precision_loss)]
    fn predict(
        &self,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>, ObjectDetectionError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ObjectDetectionError::ImageProcessing(format!(
                "Cannot run detection on empty image ({width}x{height})"
            )));
        }

        debug!("Running object detection on {}x{} image", width, height);

        let input_array = self.preprocess(image);
        let input_tensor = TensorRef::from_array_view(input_array.view())
            .map_err(|e| ObjectDetectionError::Inference(e.to_string()))?;

        let candidates = {
            let mut session = lock_recovering(&self.session);
            let outputs = session
                .run(ort::inputs![input_tensor])
                .map_err(|e| ObjectDetectionError::Inference(e.to_string()))?;
            Self::postprocess(&outputs, confidence_threshold)?
        };

        let kept = apply_nms(candidates, self.config.iou_threshold);

        let input_size = self.config.input_size as f32;
        let scale_x = width as f32 / input_size;
        let scale_y = height as f32 / input_size;

        let detections: Vec<_> = kept
            .into_iter()
            .take(self.config.max_detections)
            .map(|(class_id, confidence, bbox)| RawDetection {
                class_id,
                confidence,
                bbox: bbox.to_pixel_box(scale_x, scale_y, width, height),
            })
            .collect();

        debug!("Detected {} objects", detections.len());
        Ok(detections)
    }

    fn render(
        &self,
        image: &RgbImage,
        detections: &[Detection],
    ) -> Result<RgbImage, ObjectDetectionError> {
        Ok(annotate::draw_detections(
            image,
            detections,
            self.label_font.as_ref(),
        ))
    }
}

/// Per-class non-maximum suppression; output is sorted by confidence, highest first
fn apply_nms(
    mut candidates: Vec<(u32, f32, BoundingBox)>,
    iou_threshold: f32,
) -> Vec<(u32, f32, BoundingBox)> {
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut keep: Vec<(u32, f32, BoundingBox)> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = keep.iter().any(|kept| {
            kept.0 == candidate.0 && kept.2.iou(&candidate.2) >= iou_threshold
        });
        if !suppressed {
            keep.push(candidate);
        }
    }

    debug!("Detections after NMS: {}", keep.len());
    keep
}

/// Error types for object detection
#[derive(Debug, Error)]
pub enum ObjectDetectionError {
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Failed to load class names from {path}: {error}")]
    ClassNames { path: String, error: String },

    #[error("Failed to load label font: {0}")]
    Font(String),
}
