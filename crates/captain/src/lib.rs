pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod reconcile;
pub mod scheduler;
pub mod state;

use std::sync::Arc;

use config::CaptainConfig;
use state::AppState;

/// Writes the discovery flag file (`{port, pid, started_at}`) if configured,
/// and returns a guard that removes it on drop.
struct FlagFileGuard(Option<std::path::PathBuf>);

impl Drop for FlagFileGuard {
    fn drop(&mut self) {
        if let Some(path) = &self.0 {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn write_flag_file(path: &std::path::Path, port: u16) -> std::io::Result<()> {
    let body = serde_json::json!({
        "port": port,
        "pid": std::process::id(),
        "started_at": fleet_core::now_secs(),
    });
    std::fs::write(path, body.to_string())
}

pub async fn run(config: CaptainConfig) -> anyhow::Result<()> {
    let port = config.bind_port;
    let flag_file = config.flag_file.clone();
    let state: Arc<AppState> = AppState::new(config);

    let _flag_guard = if let Some(path) = &flag_file {
        if let Err(e) = write_flag_file(path, port) {
            tracing::warn!(error = %e, "could not write flag file");
        }
        FlagFileGuard(Some(path.clone()))
    } else {
        FlagFileGuard(None)
    };

    let reconcile_state = state.clone();
    let reconcile_handle = tokio::spawn(async move {
        reconcile::run_forever(reconcile_state).await;
    });

    let app = handlers::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "captain listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reconcile_handle.abort();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("captain shutting down");
}
