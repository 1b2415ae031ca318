//! Outbound HTTP calls from Captain to Sailor nodes. Calls are short-timeout
//! and best-effort where the protocol allows it (cancel); the caller decides
//! whether a failure here should roll back state.

use fleet_core::Resources;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct LaunchRequest<'a> {
    pub chore_id: &'a str,
    pub script: &'a str,
    pub ressources: Resources,
    pub owner: u64,
}

#[derive(Debug, Serialize)]
pub struct CancelRequest<'a> {
    pub chore_id: &'a str,
}

pub async fn dispatch_launch(
    http: &reqwest::Client,
    sailor_ip: &str,
    sailor_port: u16,
    req: &LaunchRequest<'_>,
) -> Result<(), reqwest::Error> {
    let url = format!("http://{sailor_ip}:{sailor_port}/captain_request");
    http.post(url).json(req).send().await?.error_for_status()?;
    Ok(())
}

/// Best-effort: callers are expected to ignore the `Err` and let the
/// reconciliation loop's TTL finalization converge the chore eventually.
pub async fn dispatch_cancel(
    http: &reqwest::Client,
    sailor_ip: &str,
    sailor_port: u16,
    req: &CancelRequest<'_>,
) -> Result<(), reqwest::Error> {
    let url = format!("http://{sailor_ip}:{sailor_port}/captain_cancel");
    http.post(url).json(req).send().await?.error_for_status()?;
    Ok(())
}
