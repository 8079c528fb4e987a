//! HTTP-facing error type and its JSON error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("batch of {requested} requests exceeds the maximum of {max}")]
    BatchTooLarge { requested: usize, max: usize },

    #[error("malformed cache key: {0}")]
    InvalidCacheKey(String),

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::BatchTooLarge { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InvalidCacheKey(_) => StatusCode::BAD_REQUEST,
            ApiError::MalformedBody(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::BatchTooLarge { .. } => "batch_too_large",
            ApiError::InvalidCacheKey(_) => "invalid_cache_key",
            ApiError::MalformedBody(_) => "invalid_request_body",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Internal(_))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();
        let message = self.to_string();

        match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error_type, %message, "request failed");
            }
            _ => {
                tracing::warn!(error_type, %message, "request rejected");
            }
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "retryable": self.is_retryable(),
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}
