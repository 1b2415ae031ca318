//! Outbound calls from this sailor to its captain: status reports and
//! heartbeats. Both are best-effort; the caller swallows errors (§4.6).

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum ReportedStatus {
    Done,
    Running,
    Canceled,
    Failed,
}

#[derive(Debug, Serialize)]
struct ReportBody<'a> {
    name: &'a str,
    chore_id: &'a str,
    status: ReportedStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
}

pub async fn report_status(
    http: &reqwest::Client,
    captain_ip: &str,
    captain_port: u16,
    name: &str,
    chore_id: &str,
    status: ReportedStatus,
    exit_code: Option<i32>,
) {
    let url = format!("http://{captain_ip}:{captain_port}/sailor_report");
    let body = ReportBody {
        name,
        chore_id,
        status,
        exit_code,
    };
    if let Err(e) = http.post(&url).json(&body).send().await {
        tracing::warn!(chore_id, error = %e, "report to captain failed");
    }
}

pub async fn heartbeat(http: &reqwest::Client, captain_ip: &str, captain_port: u16, name: &str) {
    let url = format!("http://{captain_ip}:{captain_port}/sailor_awake");
    if let Err(e) = http.post(&url).json(&serde_json::json!({ "name": name })).send().await {
        tracing::debug!(error = %e, "heartbeat failed");
    }
}

/// Blocking report, for the watcher thread (a dedicated `std::thread` that
/// blocks on `child.wait()` and has no tokio runtime of its own).
pub fn report_status_blocking(
    captain_ip: &str,
    captain_port: u16,
    name: &str,
    chore_id: &str,
    status: ReportedStatus,
    exit_code: Option<i32>,
) {
    let url = format!("http://{captain_ip}:{captain_port}/sailor_report");
    let body = ReportBody {
        name,
        chore_id,
        status,
        exit_code,
    };
    let client = match reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(4))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(chore_id, error = %e, "could not build blocking client");
            return;
        }
    };
    if let Err(e) = client.post(&url).json(&body).send() {
        tracing::warn!(chore_id, error = %e, "report to captain failed");
    }
}
