use astroguard_pipeline::PipelineError;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error type for HTTP handlers
///
/// Every variant renders as `{"error": message}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A request-level pipeline failure
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The multipart body could not be read (including oversized uploads)
    #[error(transparent)]
    Multipart(#[from] MultipartError),

    /// A bad request with a human-readable message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error; the message is logged, not returned
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for handler return values
pub type AppResult<T> = Result<T, AppError>;

fn internal(message: &str) -> (StatusCode, String) {
    tracing::error!(error = %message, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Pipeline(PipelineError::InvalidMedia(msg)) => {
                (StatusCode::BAD_REQUEST, format!("Invalid media: {msg}"))
            }
            AppError::Pipeline(err @ PipelineError::EmptyResult) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            AppError::Pipeline(PipelineError::Internal(msg)) | AppError::Internal(msg) => {
                internal(msg)
            }
            AppError::Multipart(err) => (err.status(), err.body_text()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                AppError::from(PipelineError::InvalidMedia("no stream".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(PipelineError::EmptyResult),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(PipelineError::Internal("boom".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::BadRequest("missing".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Internal("join".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
