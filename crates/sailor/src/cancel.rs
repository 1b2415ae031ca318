//! Cancellation: mark `cancel_requested`, then escalate signals from the
//! process group down through descendants found via `/proc` (§4.6). The
//! watcher thread is the one that reports the terminal status; this module
//! only tries to make the process go away.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::SailorResult;
use crate::state::AppState;

const TERM_WAIT: Duration = Duration::from_secs(5);
const DESCENDANT_WAIT: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub async fn cancel(state: &Arc<AppState>, chore_id: &str) -> SailorResult<()> {
    let entry = state.running.with_mut(|running| {
        running.get_mut(chore_id).map(|r| {
            r.cancel_requested = true;
            (r.pid, r.pgid)
        })
    })?;

    let Some((pid, pgid)) = entry else {
        return Ok(());
    };

    tokio::task::spawn_blocking(move || signal_escalation(pid, pgid))
        .await
        .map_err(|e| crate::error::SailorError::Internal(format!("cancel task join error: {e}")))?;
    Ok(())
}

fn signal_escalation(pid: i32, pgid: i32) {
    unsafe {
        libc::killpg(pgid, libc::SIGTERM);
        libc::kill(pid, libc::SIGTERM);
    }

    if !wait_for_exit(pid, TERM_WAIT) {
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
            libc::kill(pid, libc::SIGKILL);
        }
    }

    let descendants = all_descendants(pid);
    if descendants.is_empty() {
        return;
    }
    for d in &descendants {
        unsafe {
            libc::kill(*d, libc::SIGTERM);
        }
    }
    if !wait_for_all_exit(&descendants, DESCENDANT_WAIT) {
        for d in &descendants {
            unsafe {
                libc::kill(*d, libc::SIGKILL);
            }
        }
    }
}

fn process_alive(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}

fn wait_for_exit(pid: i32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_alive(pid) {
            return true;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    !process_alive(pid)
}

fn wait_for_all_exit(pids: &[i32], timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if pids.iter().all(|p| !process_alive(*p)) {
            return true;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    pids.iter().all(|p| !process_alive(*p))
}

fn direct_children(pid: i32) -> Vec<i32> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return out;
    };
    for entry in entries.flatten() {
        let Some(candidate) = entry.file_name().to_str().and_then(|s| s.parse::<i32>().ok()) else {
            continue;
        };
        if let Ok(contents) = std::fs::read_to_string(format!("/proc/{candidate}/stat")) {
            if let Some(ppid) = parse_ppid(&contents) {
                if ppid == pid {
                    out.push(candidate);
                }
            }
        }
    }
    out
}

/// `/proc/[pid]/stat` is `pid (comm) state ppid ...`; `comm` may itself
/// contain spaces or parens, so split on the last `)` rather than whitespace.
fn parse_ppid(stat_contents: &str) -> Option<i32> {
    let after_comm = stat_contents.rfind(')')?;
    let rest = stat_contents.get(after_comm + 2..)?;
    let mut fields = rest.split_whitespace();
    fields.next()?; // state
    fields.next()?.parse().ok()
}

fn all_descendants(pid: i32) -> Vec<i32> {
    let mut out = Vec::new();
    let mut frontier = direct_children(pid);
    while let Some(p) = frontier.pop() {
        frontier.extend(direct_children(p));
        out.push(p);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ppid_handles_parens_in_comm() {
        let line = "123 (my (weird) proc) S 456 123 123 0 -1 4194304 100 0 0 0 0 0 0 0 20 0 1 0";
        assert_eq!(parse_ppid(line), Some(456));
    }
}
