use std::sync::Arc;
use std::time::Duration;

use crate::client;
use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(500);

pub async fn run_forever(state: Arc<AppState>) {
    loop {
        tokio::time::sleep(HEARTBEAT_INTERVAL).await;
        client::heartbeat(
            &state.http,
            &state.config.captain_ip,
            state.config.captain_port,
            &state.config.name,
        )
        .await;
    }
}
