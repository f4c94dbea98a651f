//! Mapping from [`ContentMcpError`] to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use contentmcp_shared::ContentMcpError;

/// Handler error: a [`ContentMcpError`] rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub ContentMcpError);

impl From<ContentMcpError> for ApiError {
    fn from(err: ContentMcpError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ContentMcpError::Validation { .. } => StatusCode::BAD_REQUEST,
            ContentMcpError::NotFound { .. } => StatusCode::NOT_FOUND,
            ContentMcpError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ContentMcpError::Config { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ContentMcpError::Delivery { .. } => StatusCode::GONE,
            ContentMcpError::Io { .. } | ContentMcpError::Conversion(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, %status, "request failed");
        }
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}
