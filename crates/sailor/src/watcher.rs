//! One dedicated OS thread per launched chore: reports Running immediately,
//! blocks on the child's exit, consults the `cancel_requested` flag to
//! distinguish a user-initiated kill from a real failure, reports the
//! terminal status, and removes the chore from the running table. Grounded
//! on the same per-job-thread shape used elsewhere in this corpus for
//! supervising spawned subprocesses, generalized to this protocol's
//! Running/terminal report split.

use std::process::Child;
use std::sync::Arc;

use crate::client::{self, ReportedStatus};
use crate::state::AppState;

pub fn spawn(state: Arc<AppState>, chore_id: String, child: Child) {
    let name = state.config.name.clone();
    let captain_ip = state.config.captain_ip.clone();
    let captain_port = state.config.captain_port;

    std::thread::Builder::new()
        .name(format!("watch-{chore_id}"))
        .spawn(move || run(state, name, captain_ip, captain_port, chore_id, child))
        .expect("spawning watcher thread");
}

fn run(
    state: Arc<AppState>,
    name: String,
    captain_ip: String,
    captain_port: u16,
    chore_id: String,
    mut child: Child,
) {
    client::report_status_blocking(
        &captain_ip,
        captain_port,
        &name,
        &chore_id,
        ReportedStatus::Running,
        None,
    );

    let wait_result = child.wait();

    let cancel_requested = state
        .running
        .snapshot()
        .get(&chore_id)
        .map(|r| r.cancel_requested)
        .unwrap_or(false);

    let (status, exit_code) = match wait_result {
        Ok(exit_status) => {
            let code = exit_status.code().unwrap_or(-1);
            if cancel_requested {
                (ReportedStatus::Canceled, Some(code))
            } else if exit_status.success() {
                (ReportedStatus::Done, Some(code))
            } else {
                (ReportedStatus::Failed, Some(code))
            }
        }
        Err(e) => {
            tracing::warn!(chore_id = %chore_id, error = %e, "wait() failed");
            (ReportedStatus::Failed, None)
        }
    };

    client::report_status_blocking(&captain_ip, captain_port, &name, &chore_id, status, exit_code);

    let _ = state.running.with_mut(|running| {
        running.remove(&chore_id);
    });
}
