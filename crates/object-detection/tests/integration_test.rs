use astroguard_object_detection::{
    annotate, ClassNames, Detection, Detector, ObjectDetectionConfig, ObjectDetectionError,
    RawDetection, YoloDetector,
};
use image::{Rgb, RgbImage};

const MODEL_PATH: &str = "models/yolov8n.onnx";

/// Create a test image with solid color
fn create_test_image(width: u32, height: u32, color: Rgb<u8>) -> RgbImage {
    RgbImage::from_fn(width, height, |_, _| color)
}

#[test]
#[ignore] // Requires yolov8n.onnx model to be downloaded
fn test_detector_loads_model() {
    let detector = YoloDetector::new(MODEL_PATH, ObjectDetectionConfig::default());
    assert!(
        detector.is_ok(),
        "Failed to load YOLOv8 model from {MODEL_PATH}"
    );
}

#[test]
#[ignore] // Requires yolov8n.onnx model to be downloaded
fn test_detect_on_blank_image() {
    let detector = YoloDetector::new(MODEL_PATH, ObjectDetectionConfig::default()).unwrap();

    let img = create_test_image(640, 480, Rgb([255, 255, 255]));
    let detections = detector.predict(&img, 0.25).unwrap();

    assert!(
        detections.len() < 5,
        "Unexpected detections on blank image: {detections:?}"
    );
}

#[test]
#[ignore] // Requires yolov8n.onnx model to be downloaded
fn test_boxes_are_in_image_space() {
    let detector = YoloDetector::new(MODEL_PATH, ObjectDetectionConfig::default()).unwrap();

    let img = RgbImage::from_fn(1280, 720, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    for det in detector.predict(&img, 0.05).unwrap() {
        assert!(det.bbox.x1 <= det.bbox.x2 && det.bbox.y1 <= det.bbox.y2);
        assert!(det.bbox.x2 < 1280 && det.bbox.y2 < 720);
        assert!((0.0..=1.0).contains(&det.confidence));
    }
}

#[test]
#[ignore] // Requires yolov8n.onnx model
fn test_confidence_threshold_filtering() {
    let detector = YoloDetector::new(MODEL_PATH, ObjectDetectionConfig::default()).unwrap();
    let img = create_test_image(640, 480, Rgb([128, 128, 128]));

    let detections_low = detector.predict(&img, 0.1).unwrap();
    let detections_high = detector.predict(&img, 0.9).unwrap();

    assert!(
        detections_low.len() >= detections_high.len(),
        "Low threshold detected {} objects, high threshold detected {}",
        detections_low.len(),
        detections_high.len()
    );
}

#[test]
#[ignore] // Requires yolov8n.onnx model and test image
fn test_detect_and_render_real_image() {
    let test_image_path = "test_images/sample.jpg";

    if !std::path::Path::new(test_image_path).exists() {
        eprintln!("Skipping test: {test_image_path} not found");
        return;
    }

    let detector = YoloDetector::new(MODEL_PATH, ObjectDetectionConfig::default()).unwrap();
    let classes = ClassNames::coco();

    let img = image::open(test_image_path).unwrap().to_rgb8();
    let detections: Vec<Detection> = detector
        .predict(&img, 0.5)
        .unwrap()
        .into_iter()
        .map(|raw| Detection::from_raw(raw, &classes))
        .collect();

    println!("Detected {} objects:", detections.len());
    for (i, det) in detections.iter().enumerate() {
        println!(
            "  {}: {} ({:.2}% confidence) at {:?}",
            i + 1,
            det.class_name,
            det.confidence * 100.0,
            det.bbox
        );
    }

    let annotated = detector.render(&img, &detections).unwrap();
    assert_eq!(annotated.dimensions(), img.dimensions());
    assert!(!detections.is_empty(), "Expected at least one detection");
}

/// Detector with no model behind it, exercising the trait's default renderer
struct FixedDetector;

impl Detector for FixedDetector {
    fn predict(
        &self,
        _image: &RgbImage,
        _confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>, ObjectDetectionError> {
        Ok(Vec::new())
    }
}

#[test]
fn test_default_render_matches_annotate() {
    let img = create_test_image(80, 60, Rgb([10, 20, 30]));
    let detections = vec![Detection {
        class_id: 3,
        class_name: "motorcycle".to_string(),
        confidence: 0.7,
        bbox: [5, 5, 40, 30].into(),
    }];

    let rendered = FixedDetector.render(&img, &detections).unwrap();
    assert_eq!(rendered, annotate::draw_detections(&img, &detections, None));
    assert_ne!(rendered, img);
}
