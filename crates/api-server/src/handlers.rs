//! HTTP request handlers for API endpoints

use astroguard_pipeline::{
    detect_image, FrameProcessor, ImageDetectionResult, PipelineResult, UploadedVideo,
    VideoPipeline,
};
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    response::IntoResponse,
    Json,
};
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::types::{HealthResponse, MessageResponse};
use crate::ApiState;

pub const WELCOME_MESSAGE: &str = "Welcome to AstroGuard Object Detection API";

/// Service banner
pub async fn root() -> impl IntoResponse {
    Json(MessageResponse {
        message: WELCOME_MESSAGE.to_string(),
    })
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// The `file` part of a multipart upload
struct FileUpload {
    file_name: Option<String>,
    data: Bytes,
}

/// Read the required `file` field, ignoring any other fields
async fn read_file_field(multipart: &mut Multipart) -> AppResult<FileUpload> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let file_name = field.file_name().map(ToString::to_string);
            let data = field.bytes().await?;
            upload = Some(FileUpload { file_name, data });
        }
    }

    upload.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".to_string()))
}

/// Detect objects in a single uploaded image
///
/// Multipart field `file`. Responds with the detections and an annotated,
/// base64-encoded JPEG.
pub async fn detect(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> AppResult<Json<ImageDetectionResult>> {
    let upload = read_file_field(&mut multipart).await?;
    info!(
        "Image detection request: {} ({} bytes)",
        upload.file_name.as_deref().unwrap_or("<unnamed>"),
        upload.data.len()
    );

    let result = tokio::task::spawn_blocking(move || {
        let processor = FrameProcessor::new(
            state.detector.as_ref(),
            state.class_names.as_ref(),
            state.image,
        );
        detect_image(&processor, &upload.data)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Detection task failed: {e}")))??;

    info!("Image detection found {} objects", result.count);
    Ok(Json(result))
}

/// Detect objects in sampled frames of an uploaded video
///
/// Multipart field `file`. Responds with per-frame detections, annotated
/// frames, and per-class counts.
pub async fn detect_video(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> AppResult<Json<PipelineResult>> {
    let upload = read_file_field(&mut multipart).await?;
    info!(
        "Video detection request: {} ({} bytes)",
        upload.file_name.as_deref().unwrap_or("<unnamed>"),
        upload.data.len()
    );

    let result = tokio::task::spawn_blocking(move || {
        let video = UploadedVideo::from_bytes(&upload.data, upload.file_name.as_deref())?;
        let processor = FrameProcessor::new(
            state.detector.as_ref(),
            state.class_names.as_ref(),
            state.video,
        );
        VideoPipeline::new(processor, state.limits).run_upload(video)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Detection task failed: {e}")))?;

    match result {
        Ok(result) => {
            info!(
                "Video detection processed {} frames ({} scanned, {} classes)",
                result.frame_results.len(),
                result.stats.frames_scanned,
                result.class_tally.len()
            );
            Ok(Json(result))
        }
        Err(e) => {
            error!("Video detection failed: {}", e);
            Err(e.into())
        }
    }
}
