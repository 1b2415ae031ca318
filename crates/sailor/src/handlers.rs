use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use fleet_core::Resources;

use crate::cancel;
use crate::error::SailorResult;
use crate::exec::{self, LaunchParams};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LaunchRequest {
    pub chore_id: String,
    pub script: String,
    #[serde(default)]
    pub ressources: Resources,
    #[serde(deserialize_with = "fleet_core::coerce::u64_lenient")]
    pub owner: u64,
    #[serde(default)]
    pub wd: Option<String>,
    #[serde(default)]
    pub out: Option<String>,
}

async fn captain_request(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LaunchRequest>,
) -> SailorResult<Json<serde_json::Value>> {
    exec::launch(
        &state,
        LaunchParams {
            chore_id: req.chore_id,
            script: req.script,
            ressources: req.ressources,
            owner: req.owner,
            wd: req.wd,
            out: req.out,
        },
    )
    .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub chore_id: String,
}

async fn captain_cancel(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CancelRequest>,
) -> SailorResult<Json<serde_json::Value>> {
    cancel::cancel(&state, &req.chore_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn running_status(State(state): State<Arc<AppState>>) -> Json<crate::model::RunningMap> {
    Json(state.running.snapshot())
}

async fn healthz() -> &'static str {
    "ok"
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/captain_request", post(captain_request))
        .route("/captain_cancel", post(captain_cancel))
        .route("/captain_cancels", post(captain_cancel))
        .route("/captain_cancels/", post(captain_cancel))
        .route("/status", get(running_status))
        .route("/healthz", get(healthz))
        .with_state(state)
}
