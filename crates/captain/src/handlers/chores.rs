use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use fleet_core::Resources;

use crate::auth::AuthenticatedUser;
use crate::error::CaptainResult;
use crate::scheduler::{self, SubmitRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitChoreRequest {
    pub script: String,
    #[serde(default)]
    pub service: Option<String>,
    pub ressources: Resources,
    #[serde(deserialize_with = "fleet_core::coerce::u64_lenient")]
    pub owner: u64,
}

pub async fn user_chore(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitChoreRequest>,
) -> CaptainResult<Json<serde_json::Value>> {
    let chore_id = scheduler::submit_chore(
        &state,
        SubmitRequest {
            script: req.script,
            service: req.service,
            ressources: req.ressources,
            owner: req.owner,
        },
    )
    .await?;
    Ok(Json(serde_json::json!({ "ok": true, "chore_id": chore_id })))
}

#[derive(Debug, Deserialize)]
pub struct CancelChoreRequest {
    pub chore_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn user_cancel(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CancelChoreRequest>,
) -> CaptainResult<Json<serde_json::Value>> {
    scheduler::cancel_chore(&state, &req.chore_id, req.reason).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct ConsultQuery {
    #[serde(default)]
    pub owner: Option<u64>,
    #[serde(default)]
    pub all: Option<bool>,
}

pub async fn user_consult(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ConsultQuery>,
) -> Json<Vec<fleet_core::Chore>> {
    let chores = state.chores.snapshot();
    let mut out: Vec<_> = chores
        .into_values()
        .filter(|c| q.all.unwrap_or(false) || q.owner.map_or(true, |o| o == c.owner))
        .collect();
    out.sort_by_key(|c| c.start);
    Json(out)
}

pub async fn me_chores(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(uid): AuthenticatedUser,
) -> Json<Vec<fleet_core::Chore>> {
    let chores = state.chores.snapshot();
    let mut out: Vec<_> = chores.into_values().filter(|c| c.owner == uid).collect();
    out.sort_by_key(|c| c.start);
    Json(out)
}

pub async fn me_cancel(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(uid): AuthenticatedUser,
    Json(req): Json<CancelChoreRequest>,
) -> CaptainResult<Json<serde_json::Value>> {
    let owns = {
        let chores = state.chores.snapshot();
        chores
            .get(&req.chore_id)
            .map(|c| c.owner == uid)
            .unwrap_or(true)
    };
    if !owns {
        return Err(crate::error::CaptainError::Forbidden(
            "not the owner of this chore".into(),
        ));
    }
    scheduler::cancel_chore(&state, &req.chore_id, req.reason).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
