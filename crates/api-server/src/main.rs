//! API Server Binary Entry Point

use anyhow::Context;
use astroguard_api_server::{start_server, ApiState, ServerConfig};
use astroguard_object_detection::{ClassNames, LabelFont, ObjectDetectionConfig, YoloDetector};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LABEL_FONT_PX: f32 = 16.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "astroguard_api_server=info,astroguard_pipeline=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("Invalid configuration")?;

    let model_path = config.resolved_model_path();
    let mut detector = YoloDetector::new(&model_path, ObjectDetectionConfig::default())
        .with_context(|| format!("Failed to load model {}", model_path.display()))?;
    if let Some(font_path) = &config.label_font {
        detector = detector.with_label_font(LabelFont::from_file(font_path, LABEL_FONT_PX)?);
    }
    tracing::info!("Model loaded from {}", model_path.display());

    let class_names = ClassNames::load_or_coco(&config.classes_path)?;

    let state = ApiState::from_config(Arc::new(detector), Arc::new(class_names), &config);

    tracing::info!("Starting AstroGuard Object Detection API Server");
    start_server(&config, state).await?;

    Ok(())
}
