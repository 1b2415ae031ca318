use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::state::AppState;

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn readyz(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let ready = std::fs::metadata(&state.config.data_dir).is_ok() || {
        // Fresh install: the data dir is created lazily on first write, so
        // an absent dir is still "ready" as long as its parent is writable.
        state
            .config
            .data_dir
            .parent()
            .map(|p| p.as_os_str().is_empty() || p.exists())
            .unwrap_or(true)
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(serde_json::json!({ "ready": ready })))
}
