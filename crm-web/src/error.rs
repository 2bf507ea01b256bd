//! Error types for crm-web

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crm_common::chat::ChatError;
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request or local validation failure (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or rejected access token (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Role does not allow the action (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Backend reported an error (502)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Feature not configured (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<crm_common::Error> for ApiError {
    fn from(err: crm_common::Error) -> Self {
        use crm_common::Error;
        match err {
            Error::Validation(msg) => ApiError::BadRequest(msg),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::Csv(e) => ApiError::BadRequest(format!("Malformed CSV: {}", e)),
            Error::Backend { message, code } => match code.as_deref() {
                Some("PGRST116") => ApiError::NotFound(message),
                // Row-level security refusal
                Some("42501") => ApiError::Forbidden(message),
                Some("401") => ApiError::Unauthorized(message),
                _ => ApiError::Backend(message),
            },
            Error::Chat(e) => ApiError::from(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::RateLimited | ChatError::QuotaExhausted => ApiError::Unavailable(err.to_string()),
            other => ApiError::Backend(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Backend(msg) => (StatusCode::BAD_GATEWAY, "BACKEND_ERROR", msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
