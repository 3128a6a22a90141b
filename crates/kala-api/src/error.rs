use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Failures between axum and the blocking handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("failed to read request body: {0}")]
    Body(#[from] axum::Error),

    #[error("handler task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Body(_) => StatusCode::BAD_REQUEST,
            ApiError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
