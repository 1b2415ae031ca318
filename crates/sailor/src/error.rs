use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SailorError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] fleet_core::CoreError),
}

impl IntoResponse for SailorError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            SailorError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            SailorError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            SailorError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
            SailorError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "ok": false, "error": message }))).into_response()
    }
}

pub type SailorResult<T> = Result<T, SailorError>;
