use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use sailor::config::ResourcesConfig;
use sailor::handlers::router;
use sailor::state::AppState;

fn test_state() -> Arc<AppState> {
    let dir = tempfile::tempdir().unwrap();
    let config = ResourcesConfig {
        name: "test-sailor".to_string(),
        ..ResourcesConfig::default()
    };
    AppState::new(config, dir.into_path().join("running_chores.json"))
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
async fn healthz_and_status_respond() {
    let state = test_state();
    let app = router(state);

    let (status, _) = get(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&app, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_object().unwrap().is_empty());
}

#[tokio::test]
async fn captain_request_rejects_foreign_uid() {
    let state = test_state();
    let app = router(state);

    // This process is not root, so it cannot assume a uid other than its
    // own effective one — the handler must refuse before ever forking.
    let foreign_uid = unsafe { libc::geteuid() as u64 } + 999_000;

    let (status, _) = post(
        &app,
        "/captain_request",
        serde_json::json!({
            "chore_id": "c-1",
            "script": "/bin/true",
            "ressources": { "cpus": 1, "gpus": 0 },
            "owner": foreign_uid
        }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn captain_cancel_is_idempotent_for_unknown_chore() {
    let state = test_state();
    let app = router(state);

    let (status, _) = post(
        &app,
        "/captain_cancel",
        serde_json::json!({ "chore_id": "does-not-exist" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
