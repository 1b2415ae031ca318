use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::auth::generate_token;
use crate::error::{CaptainError, CaptainResult};
use crate::state::{AppState, TokenInfo};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> CaptainResult<Json<serde_json::Value>> {
    let uid = state
        .auth
        .authenticate(&req.username, &req.password)
        .ok_or_else(|| CaptainError::Unauthorized("invalid credentials".into()))?;

    let token = generate_token(uid);
    let expires_at = fleet_core::now_secs() + state.config.token_ttl_secs;
    state
        .tokens
        .lock()
        .expect("token map poisoned")
        .insert(token.clone(), TokenInfo { uid, expires_at });

    Ok(Json(serde_json::json!({ "ok": true, "token": token })))
}
