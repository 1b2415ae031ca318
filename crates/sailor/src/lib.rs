pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod exec;
pub mod handlers;
pub mod heartbeat;
pub mod model;
pub mod passwd;
pub mod privilege;
pub mod state;
pub mod watcher;

use std::sync::Arc;

use config::ResourcesConfig;
use fleet_core::JsonStore;
use state::AppState;

/// Registers this sailor with its captain. Best-effort: a captain that is
/// briefly unreachable on boot just misses one registration attempt; the
/// next heartbeat-triggered registration (none exists) means the operator
/// must ensure the captain is reachable before first boot, same as the
/// original agent.
async fn register_with_captain(state: &Arc<AppState>) {
    let url = format!(
        "http://{}:{}/sailor_register",
        state.config.captain_ip, state.config.captain_port
    );
    let body = serde_json::json!({
        "name": state.config.name,
        "ip": local_ip_hint(&state.config.captain_ip, state.config.captain_port),
        "port": state.config.port,
        "cpus": state.config.cpus,
        "gpus": state.config.gpus,
        "ram": state.config.ram,
    });
    match state.http.post(&url).json(&body).send().await {
        Ok(resp) if resp.status().is_success() => {
            tracing::info!("registered with captain");
        }
        Ok(resp) => {
            tracing::warn!(status = %resp.status(), "captain rejected registration");
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not reach captain to register");
        }
    }
}

/// Finds the local address this host would use to reach the captain, by
/// opening a UDP socket and connecting it (no packets sent, just a route
/// lookup) then reading back the socket's own address.
fn local_ip_hint(captain_ip: &str, captain_port: u16) -> String {
    std::net::UdpSocket::bind("0.0.0.0:0")
        .and_then(|sock| {
            sock.connect((captain_ip, captain_port))?;
            sock.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

/// Logs any running-table entries whose pid no longer exists, since a
/// restarted sailor cannot reattach a watcher to them (§4.7). Resolution is
/// left to the captain's TTL-based finalization.
fn log_orphaned_entries(running: &JsonStore<model::RunningMap>) {
    for (chore_id, entry) in running.snapshot() {
        let alive = unsafe { libc::kill(entry.pid, 0) == 0 };
        if !alive {
            tracing::warn!(chore_id, pid = entry.pid, "orphaned running-table entry from a prior boot");
        }
    }
}

pub async fn run(config: ResourcesConfig) -> anyhow::Result<()> {
    let running_path = self::config::running_chores_path();
    let state = AppState::new(config, running_path);

    log_orphaned_entries(&state.running);
    register_with_captain(&state).await;

    let heartbeat_state = state.clone();
    let heartbeat_handle = tokio::spawn(async move {
        heartbeat::run_forever(heartbeat_state).await;
    });

    let app = handlers::router(state.clone());
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", state.config.port)).await?;
    tracing::info!(port = state.config.port, name = %state.config.name, "sailor listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    heartbeat_handle.abort();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("sailor shutting down");
}
