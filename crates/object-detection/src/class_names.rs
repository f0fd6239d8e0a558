//! Class id → display name table

use crate::ObjectDetectionError;
use std::path::Path;
use tracing::{info, warn};

/// Ordered class-name table; index = class id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNames {
    names: Vec<String>,
}

impl ClassNames {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// The 80 COCO classes used by the stock `YOLOv8` exports
    #[must_use]
    pub fn coco() -> Self {
        Self::new(COCO_CLASSES.iter().map(|s| (*s).to_string()).collect())
    }

    /// Parse one name per line, trimming whitespace and skipping blank lines
    #[must_use]
    pub fn parse(contents: &str) -> Self {
        Self::new(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(ToString::to_string)
                .collect(),
        )
    }

    /// Load a class file (see [`ClassNames::parse`])
    ///
    /// # Errors
    ///
    /// Returns [`ObjectDetectionError::ClassNames`] if the file cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, ObjectDetectionError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ObjectDetectionError::ClassNames {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;
        let names = Self::parse(&contents);
        info!("Loaded {} class names from {}", names.len(), path.display());
        Ok(names)
    }

    /// Load `path` if it exists, otherwise fall back to the COCO table
    ///
    /// # Errors
    ///
    /// Returns an error only if the file exists but cannot be read.
    pub fn load_or_coco(path: &Path) -> Result<Self, ObjectDetectionError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            warn!(
                "Class file {} not found, using built-in COCO class names",
                path.display()
            );
            Ok(Self::coco())
        }
    }

    /// Name for `class_id`, or `"Class {class_id}"` when it is outside the table
    #[must_use]
    pub fn name_for(&self, class_id: u32) -> String {
        usize::try_from(class_id)
            .ok()
            .and_then(|idx| self.names.get(idx))
            .cloned()
            .unwrap_or_else(|| format!("Class {class_id}"))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// 80 COCO object classes (in order)
pub const COCO_CLASSES: &[&str] = &[
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];
