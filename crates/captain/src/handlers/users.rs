use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use fleet_core::User;

use crate::error::CaptainResult;
use crate::state::AppState;

pub async fn users(State(state): State<Arc<AppState>>) -> Json<fleet_core::UserMap> {
    Json(state.users.snapshot())
}

#[derive(Debug, Deserialize)]
pub struct UpsertUserRequest {
    #[serde(deserialize_with = "fleet_core::coerce::u64_lenient")]
    pub uid: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub time_limit: Option<String>,
    #[serde(default, deserialize_with = "fleet_core::coerce::opt_u32_lenient")]
    pub chores_limit: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn user_upsert(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpsertUserRequest>,
) -> CaptainResult<Json<serde_json::Value>> {
    state.users.with_mut(|users| {
        let entry = users.entry(req.uid.to_string()).or_insert_with(User::default);
        if req.name.is_some() {
            entry.name = req.name;
        }
        if req.time_limit.is_some() {
            entry.time_limit = req.time_limit;
        }
        if req.chores_limit.is_some() {
            entry.chores_limit = req.chores_limit;
        }
        if req.notes.is_some() {
            entry.notes = req.notes;
        }
    })?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
