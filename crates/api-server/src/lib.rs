//! REST API server for AstroGuard object detection
//!
//! Endpoints:
//! - `GET /`: service banner
//! - `GET /health`: liveness and version
//! - `POST /detect`: single image, multipart field `file`
//! - `POST /detect-video`: sampled video frames, multipart field `file`

pub mod config;
pub mod error;
mod handlers;
mod types;

use astroguard_object_detection::{ClassNames, Detector};
use astroguard_pipeline::{FrameSettings, SamplingLimits};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{resolve_model_path, ServerConfig};
pub use error::{AppError, AppResult};
pub use handlers::*;
pub use types::*;

/// API server state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    /// Detector built once at startup
    pub detector: Arc<dyn Detector>,
    /// Class id → name table
    pub class_names: Arc<ClassNames>,
    /// Settings for `/detect`
    pub image: FrameSettings,
    /// Settings for `/detect-video`
    pub video: FrameSettings,
    pub limits: SamplingLimits,
}

impl ApiState {
    /// Create state with the default image/video presets and sampling limits
    #[must_use]
    pub fn new(detector: Arc<dyn Detector>, class_names: Arc<ClassNames>) -> Self {
        Self {
            detector,
            class_names,
            image: FrameSettings::image(),
            video: FrameSettings::video(),
            limits: SamplingLimits::default(),
        }
    }

    /// Create state using the settings in `config`
    #[must_use]
    pub fn from_config(
        detector: Arc<dyn Detector>,
        class_names: Arc<ClassNames>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            image: config.image,
            video: config.video,
            limits: config.limits,
            ..Self::new(detector, class_names)
        }
    }
}

/// CORS for the configured origins, with credentials
///
/// Methods and headers mirror the preflight request, since wildcards are not
/// allowed together with credentials.
pub fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/detect", post(detect))
        .route("/detect-video", post(detect_video))
        // Middleware
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&config.cors_origins))
        .with_state(state)
}

/// Start the API server
pub async fn start_server(config: &ServerConfig, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("Starting API server on {}", config.addr);

    let app = build_router(state, config);
    let listener = tokio::net::TcpListener::bind(&config.addr).await?;

    axum::serve(listener, app).await
}
