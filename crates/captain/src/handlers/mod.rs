pub mod chores;
pub mod health;
pub mod sailors;
pub mod session;
pub mod users;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/prereg", post(sailors::prereg))
        .route("/sailor_register", post(sailors::sailor_register))
        .route("/sailor_awake", post(sailors::sailor_awake))
        .route("/sailor_report", post(sailors::sailor_report))
        .route("/crew", get(sailors::crew))
        .route("/user_chore", post(chores::user_chore))
        .route("/user_cancel", post(chores::user_cancel))
        .route("/user_consult", get(chores::user_consult))
        .route("/me/chores", get(chores::me_chores))
        .route("/me/cancel", post(chores::me_cancel))
        .route("/users", get(users::users))
        .route("/user_upsert", post(users::user_upsert))
        .route("/login", post(session::login))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .with_state(state)
}
