use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use captain::config::CaptainConfig;
use captain::reconcile;
use captain::state::AppState;
use fleet_core::{Chore, ChoreStatus, Resources, Sailor};

fn test_state() -> Arc<AppState> {
    let dir = tempfile::tempdir().unwrap();
    let mut config = CaptainConfig::default();
    config.data_dir = dir.into_path();
    AppState::new(config)
}

fn chore(id: &str, owner: u64, status: ChoreStatus, sailor: &str, t0: u64) -> Chore {
    Chore {
        chore_id: id.to_string(),
        script: "/x.sh".into(),
        service: None,
        ressources: Resources { cpus: 2, gpus: 0 },
        owner,
        sailor: Some(sailor.to_string()),
        start: t0,
        assigned_at: Some(t0),
        run_start: Some(t0),
        cancel_requested_at: None,
        end: None,
        status,
        exit_code: None,
        reason: String::new(),
        cancel_source: None,
    }
}

/// A sailor pointed at a mock HTTP server standing in for the real sailor
/// agent, so the dispatch path is exercised end to end without a real node.
fn mock_sailor(mock_server: &MockServer, name: &str, used_cpus: u32) -> Sailor {
    let addr = mock_server.address();
    let mut s = Sailor::new_preregistered(name.to_string(), addr.ip().to_string(), vec![], "00:00:01");
    s.port = addr.port();
    s.cpus = 4;
    s.used_cpus = used_cpus;
    s.last_seen = fleet_core::now_secs();
    s
}

#[tokio::test]
async fn reconcile_dispatches_cancel_for_sailor_max_time_overrun() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/captain_cancel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = test_state();
    let now = fleet_core::now_secs();

    state
        .crew
        .with_mut(|crew| {
            crew.insert("alpha".into(), mock_sailor(&mock_server, "alpha", 2));
        })
        .unwrap();
    state
        .chores
        .with_mut(|chores| {
            chores.insert(
                "c-1".into(),
                chore("c-1", 1000, ChoreStatus::Running, "alpha", now.saturating_sub(5)),
            );
        })
        .unwrap();

    reconcile::run_once(&state).await;

    let chores = state.chores.snapshot();
    let c = &chores["c-1"];
    assert_eq!(c.status, ChoreStatus::CancelRequested);
    assert_eq!(c.cancel_source, Some(fleet_core::CancelSource::SailorMaxTime));

    // `.expect(1)` above is checked when `mock_server` drops at the end of
    // this scope — panics if the dispatch never reached it.
}

#[tokio::test]
async fn reconcile_finalizes_stuck_cancel_requested_and_releases_resources() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/captain_cancel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .mount(&mock_server)
        .await;

    let state = test_state();
    let now = fleet_core::now_secs();
    state
        .crew
        .with_mut(|crew| {
            crew.insert("alpha".into(), mock_sailor(&mock_server, "alpha", 2));
        })
        .unwrap();
    state
        .chores
        .with_mut(|chores| {
            let mut c = chore("c-2", 1000, ChoreStatus::CancelRequested, "alpha", now.saturating_sub(10_000));
            c.cancel_requested_at = Some(now.saturating_sub(state.config.cancel_requested_ttl_secs + 10));
            c.cancel_source = Some(fleet_core::CancelSource::User);
            chores.insert("c-2".into(), c);
        })
        .unwrap();

    reconcile::run_once(&state).await;

    let chores = state.chores.snapshot();
    let c = &chores["c-2"];
    assert_eq!(c.status, ChoreStatus::Canceled);
    assert!(c.end.is_some());
    assert_eq!(c.reason, "canceled by user");

    let crew = state.crew.snapshot();
    assert_eq!(crew["alpha"].used_cpus, 0);
}
