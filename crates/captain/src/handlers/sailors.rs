use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use fleet_core::{ChoreStatus, GpuSpec, Sailor};

use crate::error::{CaptainError, CaptainResult};
use crate::scheduler::run_assignment_pass;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PreregRequest {
    pub name: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub max_time: String,
}

pub async fn prereg(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PreregRequest>,
) -> CaptainResult<Json<serde_json::Value>> {
    state.crew.with_mut(|crew| {
        crew.insert(
            req.name.clone(),
            Sailor::new_preregistered(req.name.clone(), req.ip, req.services, &req.max_time),
        );
    })?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub cpus: u32,
    #[serde(default)]
    pub gpus: Vec<GpuSpec>,
    #[serde(default)]
    pub ram: u64,
}

pub async fn sailor_register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> CaptainResult<Json<serde_json::Value>> {
    let now = fleet_core::now_secs();

    // Re-derive used capacity from the chores store rather than zeroing it
    // (DESIGN.md Open Question decision) so a sailor restart doesn't
    // momentarily over-commit its still-assigned chores.
    let (used_cpus, used_gpus) = {
        let chores = state.chores.snapshot();
        chores
            .values()
            .filter(|c| c.status.is_active() && c.status != ChoreStatus::Pending)
            .filter(|c| c.sailor.as_deref() == Some(req.name.as_str()))
            .fold((0u32, 0u32), |(cpus, gpus), c| {
                (cpus + c.ressources.cpus, gpus + c.ressources.gpus)
            })
    };

    let existed = state.crew.with_mut(|crew| {
        let existed = crew.contains_key(&req.name);
        let entry = crew.entry(req.name.clone()).or_insert_with(|| {
            Sailor::new_preregistered(req.name.clone(), req.ip.clone(), vec![], "")
        });
        entry.ip = req.ip.clone();
        entry.port = req.port;
        entry.cpus = req.cpus;
        entry.gpus = req.gpus.clone();
        entry.ram = req.ram;
        entry.last_seen = now;
        entry.used_cpus = used_cpus;
        entry.used_gpus = used_gpus;
        existed
    })?;

    if !existed {
        return Err(CaptainError::Forbidden(format!(
            "sailor {} is not preregistered",
            req.name
        )));
    }

    run_assignment_pass(&state).await;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct AwakeRequest {
    pub name: String,
}

pub async fn sailor_awake(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AwakeRequest>,
) -> CaptainResult<Json<serde_json::Value>> {
    let now = fleet_core::now_secs();
    state.crew.with_mut(|crew| {
        if let Some(s) = crew.get_mut(&req.name) {
            s.last_seen = now;
        }
    })?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ReportedStatus {
    Done,
    Running,
    Canceled,
    Failed,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub chore_id: String,
    pub status: ReportedStatus,
    #[serde(default)]
    pub exit_code: Option<i32>,
}

pub async fn sailor_report(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReportRequest>,
) -> CaptainResult<Json<serde_json::Value>> {
    let now = fleet_core::now_secs();

    let released = state.chores.with_mut(|chores| {
        let Some(chore) = chores.get_mut(&req.chore_id) else {
            return None;
        };

        match req.status {
            ReportedStatus::Running => {
                chore.status = ChoreStatus::Running;
                if chore.run_start.is_none() {
                    chore.run_start = Some(now);
                }
                None
            }
            terminal => {
                let released = chore
                    .sailor
                    .clone()
                    .map(|s| (s, chore.ressources.cpus, chore.ressources.gpus));
                chore.status = match terminal {
                    ReportedStatus::Done => ChoreStatus::Done,
                    ReportedStatus::Canceled => ChoreStatus::Canceled,
                    ReportedStatus::Failed => ChoreStatus::Failed,
                    ReportedStatus::Running => unreachable!(),
                };
                chore.end = Some(now);
                chore.exit_code = req.exit_code;
                chore.fill_reason_from_source();
                released
            }
        }
    })?;

    if let Some((sailor_name, cpus, gpus)) = released {
        state.crew.with_mut(|crew| {
            if let Some(s) = crew.get_mut(&sailor_name) {
                s.used_cpus = s.used_cpus.saturating_sub(cpus);
                s.used_gpus = s.used_gpus.saturating_sub(gpus);
            }
        })?;
        run_assignment_pass(&state).await;
    }

    // Idempotent: unknown or already-terminal chore_ids still return OK.
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Serialize)]
pub struct CrewEntry {
    #[serde(flatten)]
    pub sailor: Sailor,
    pub status: fleet_core::SailorStatus,
    pub seen_ago: u64,
}

pub async fn crew(State(state): State<Arc<AppState>>) -> Json<Vec<CrewEntry>> {
    let now = fleet_core::now_secs();
    let crew = state.crew.snapshot();
    let mut out: Vec<CrewEntry> = crew
        .into_values()
        .map(|s| {
            let status = s.derived_status(now);
            let seen_ago = if s.last_seen == 0 {
                u64::MAX
            } else {
                now.saturating_sub(s.last_seen)
            };
            CrewEntry {
                sailor: s,
                status,
                seen_ago,
            }
        })
        .collect();
    out.sort_by(|a, b| a.sailor.name.cmp(&b.sailor.name));
    Json(out)
}
