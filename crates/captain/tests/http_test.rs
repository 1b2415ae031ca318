use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use captain::config::CaptainConfig;
use captain::handlers::router;
use captain::state::AppState;

fn test_state() -> Arc<AppState> {
    let dir = tempfile::tempdir().unwrap();
    let mut config = CaptainConfig::default();
    config.data_dir = dir.into_path();
    AppState::new(config)
}

async fn post(app: &axum::Router, path: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or(serde_json::json!({}));
    (status, json)
}

async fn get(app: &axum::Router, path: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or(serde_json::json!({}));
    (status, json)
}

#[tokio::test]
async fn prereg_then_register_then_submit_assigns_chore() {
    let state = test_state();
    let app = router(state.clone());

    let (status, _) = post(
        &app,
        "/prereg",
        serde_json::json!({ "name": "alpha", "ip": "127.0.0.1", "services": ["gpu"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Point the sailor's port somewhere dispatch will fail quickly — this
    // exercises the rollback-on-dispatch-failure path end to end.
    let (status, _) = post(
        &app,
        "/sailor_register",
        serde_json::json!({
            "name": "alpha", "ip": "127.0.0.1", "port": 1, "cpus": 4, "gpus": [], "ram": 0
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        &app,
        "/user_chore",
        serde_json::json!({
            "script": "/bin/true",
            "service": "gpu",
            "ressources": { "cpus": 1, "gpus": 0 },
            "owner": 1000
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["chore_id"].is_string());

    // Dispatch to the bogus port fails, so the reservation should have been
    // rolled back and the chore should be pending again.
    let chores = state.chores.snapshot();
    let chore = chores.values().next().unwrap();
    assert_eq!(chore.status, fleet_core::ChoreStatus::Pending);
    assert_eq!(chore.reason, "sailor unreachable");

    let crew = state.crew.snapshot();
    assert_eq!(crew["alpha"].used_cpus, 0);
}

#[tokio::test]
async fn submit_without_preregistered_sailor_stays_pending() {
    let state = test_state();
    let app = router(state.clone());

    let (status, body) = post(
        &app,
        "/user_chore",
        serde_json::json!({
            "script": "/bin/true",
            "ressources": { "cpus": 1, "gpus": 0 },
            "owner": 42
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["chore_id"].is_string());

    let chores = state.chores.snapshot();
    let chore = chores.values().next().unwrap();
    assert_eq!(chore.status, fleet_core::ChoreStatus::Pending);
    assert_eq!(chore.reason, "no available sailor");
}

#[tokio::test]
async fn chores_limit_forbids_fourth_submission() {
    let state = test_state();
    let app = router(state.clone());

    post(
        &app,
        "/user_upsert",
        serde_json::json!({ "uid": 7, "chores_limit": 2 }),
    )
    .await;

    for _ in 0..2 {
        let (status, _) = post(
            &app,
            "/user_chore",
            serde_json::json!({
                "script": "/bin/true",
                "ressources": { "cpus": 1, "gpus": 0 },
                "owner": 7
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = post(
        &app,
        "/user_chore",
        serde_json::json!({
            "script": "/bin/true",
            "ressources": { "cpus": 1, "gpus": 0 },
            "owner": 7
        }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn crew_and_healthz_endpoints_respond() {
    let state = test_state();
    let app = router(state);

    let (status, _) = get(&app, "/crew").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    let _ = body;
}
