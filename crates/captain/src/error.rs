use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptainError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] fleet_core::CoreError),
}

impl IntoResponse for CaptainError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CaptainError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            CaptainError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            CaptainError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            CaptainError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            CaptainError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
            CaptainError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "ok": false, "error": message }))).into_response()
    }
}

pub type CaptainResult<T> = Result<T, CaptainError>;
