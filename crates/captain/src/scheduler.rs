//! Submission and the assignment pass: selecting a sailor for each pending
//! chore, with optimistic reservation and rollback on dispatch failure.

use std::sync::Arc;

use fleet_core::{Chore, ChoreStatus, CrewMap, Resources, Sailor};

use crate::client::{self, CancelRequest, LaunchRequest};
use crate::error::{CaptainError, CaptainResult};
use crate::state::AppState;

/// Sailors that could take a chore needing `need_cpu`/`need_gpu` (and, if
/// given, advertising `service`), sorted ascending by name for a
/// deterministic scoring tie-break.
pub fn eligible_sailors<'a>(
    crew: &'a CrewMap,
    service: Option<&str>,
    need_cpu: u32,
    need_gpu: u32,
    now: u64,
) -> Vec<&'a Sailor> {
    let mut candidates: Vec<&Sailor> = crew
        .values()
        .filter(|s| s.is_alive(now))
        .filter(|s| service.map_or(true, |svc| s.services.iter().any(|x| x == svc)))
        .filter(|s| s.free_cpu() >= need_cpu as i64 && s.free_gpu() >= need_gpu as i64)
        .collect();
    candidates.sort_by(|a, b| a.name.cmp(&b.name));
    candidates
}

/// Picks the candidate maximizing post-allocation headroom
/// `(free_cpu - need_cpu) + (free_gpu - need_gpu)`; ties go to the
/// lexicographically first name (`candidates` must already be name-sorted).
pub fn pick_best<'a>(candidates: &[&'a Sailor], need_cpu: u32, need_gpu: u32) -> Option<&'a Sailor> {
    let mut best: Option<(&'a Sailor, i64)> = None;
    for &s in candidates {
        let score = (s.free_cpu() - need_cpu as i64) + (s.free_gpu() - need_gpu as i64);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((s, score)),
        }
    }
    best.map(|(s, _)| s)
}

fn next_chore_id(existing: &fleet_core::ChoreMap) -> String {
    let mut candidate = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    while existing.contains_key(&candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}

pub struct SubmitRequest {
    pub script: String,
    pub service: Option<String>,
    pub ressources: Resources,
    pub owner: u64,
}

/// §4.2 submit chore: enforce `chores_limit`, persist as pending, then run
/// one assignment pass before returning.
pub async fn submit_chore(state: &Arc<AppState>, req: SubmitRequest) -> CaptainResult<String> {
    let now = fleet_core::now_secs();

    let users = state.users.snapshot();
    if let Some(user) = users.get(&req.owner.to_string()) {
        if let Some(limit) = user.chores_limit {
            let chores = state.chores.snapshot();
            let cancel_ttl = state.config.cancel_requested_ttl_secs;
            let active = chores
                .values()
                .filter(|c| c.owner == req.owner)
                .filter(|c| active_counts_toward_limit(c, now, cancel_ttl))
                .count();
            if active as u32 >= limit {
                return Err(CaptainError::Forbidden(format!(
                    "chores_limit of {limit} reached"
                )));
            }
        }
    }

    let chore_id = state.chores.with_mut(|chores| {
        let id = next_chore_id(chores);
        let chore = Chore {
            chore_id: id.clone(),
            script: req.script,
            service: req.service,
            ressources: req.ressources,
            owner: req.owner,
            sailor: None,
            start: now,
            assigned_at: None,
            run_start: None,
            cancel_requested_at: None,
            end: None,
            status: ChoreStatus::Pending,
            exit_code: None,
            reason: "no available sailor".to_string(),
            cancel_source: None,
        };
        chores.insert(id.clone(), chore);
        id
    })?;

    run_assignment_pass(state).await;
    Ok(chore_id)
}

fn active_counts_toward_limit(chore: &Chore, now: u64, cancel_ttl: u64) -> bool {
    if chore.status.is_terminal() {
        return false;
    }
    if chore.status == ChoreStatus::CancelRequested {
        if let Some(at) = chore.cancel_requested_at {
            if now.saturating_sub(at) >= cancel_ttl {
                return false;
            }
        }
    }
    true
}

/// §4.3: assigns every eligible pending chore to its best-fit sailor,
/// dispatches, and rolls back the reservation if dispatch fails.
///
/// Scans the whole pending set up front (oldest `start` first) and tries
/// each one in turn, so a chore that currently fits no sailor never blocks
/// a smaller chore behind it in submission order from being assigned in
/// the same pass.
pub async fn run_assignment_pass(state: &Arc<AppState>) {
    let pending_ids: Vec<String> = {
        let chores = state.chores.snapshot();
        let mut pending: Vec<&Chore> = chores
            .values()
            .filter(|c| c.status == ChoreStatus::Pending && c.sailor.is_none())
            .collect();
        pending.sort_by_key(|c| c.start);
        pending.into_iter().map(|c| c.chore_id.clone()).collect()
    };

    for chore_id in pending_ids {
        try_assign_one(state, &chore_id).await;
    }
}

async fn try_assign_one(state: &Arc<AppState>, chore_id: &str) {
    let now = fleet_core::now_secs();

    let attempt = state.chores.with_mut(|chores| {
        let crew = state.crew.snapshot();
        let chore = chores.get(chore_id)?;
        if chore.status != ChoreStatus::Pending || chore.sailor.is_some() {
            return None;
        }
        let need_cpu = chore.ressources.cpus;
        let need_gpu = chore.ressources.gpus;
        let service = chore.service.clone();

        let candidates = eligible_sailors(&crew, service.as_deref(), need_cpu, need_gpu, now);
        let chosen = pick_best(&candidates, need_cpu, need_gpu)?.name.clone();

        let chore = chores.get_mut(chore_id).expect("just looked up");
        chore.sailor = Some(chosen.clone());
        chore.status = ChoreStatus::Assigned;
        chore.assigned_at = Some(now);
        chore.reason.clear();

        Some((chosen, need_cpu, need_gpu))
    });

    let Ok(Some((sailor_name, need_cpu, need_gpu))) = attempt else {
        return;
    };

    let reserved = state.crew.with_mut(|crew| {
        if let Some(s) = crew.get_mut(&sailor_name) {
            s.used_cpus += need_cpu;
            s.used_gpus += need_gpu;
            Some((s.ip.clone(), s.port))
        } else {
            None
        }
    });

    let Ok(Some((ip, port))) = reserved else {
        // Sailor vanished between selection and reservation; put the
        // chore back for the next pass.
        let _ = state.chores.with_mut(|chores| {
            if let Some(c) = chores.get_mut(chore_id) {
                c.sailor = None;
                c.status = ChoreStatus::Pending;
                c.assigned_at = None;
                c.reason = "no available sailor".to_string();
            }
        });
        return;
    };

    let (script, ressources, owner) = {
        let chores = state.chores.snapshot();
        let c = chores.get(chore_id).expect("chore just assigned");
        (c.script.clone(), c.ressources, c.owner)
    };

    let launch = LaunchRequest {
        chore_id,
        script: &script,
        ressources,
        owner,
    };

    match client::dispatch_launch(&state.http, &ip, port, &launch).await {
        Ok(()) => {
            tracing::info!(chore_id, sailor = %sailor_name, "chore dispatched");
        }
        Err(e) => {
            tracing::warn!(chore_id, sailor = %sailor_name, error = %e, "dispatch failed, rolling back");
            let _ = state.crew.with_mut(|crew| {
                if let Some(s) = crew.get_mut(&sailor_name) {
                    s.used_cpus = s.used_cpus.saturating_sub(need_cpu);
                    s.used_gpus = s.used_gpus.saturating_sub(need_gpu);
                }
            });
            let _ = state.chores.with_mut(|chores| {
                if let Some(c) = chores.get_mut(chore_id) {
                    c.sailor = None;
                    c.status = ChoreStatus::Pending;
                    c.assigned_at = None;
                    c.reason = "sailor unreachable".to_string();
                }
            });
        }
    }
}

/// §4.2 cancel chore: either terminal directly (never assigned) or
/// `cancel_requested` persisted before the best-effort network call.
pub async fn cancel_chore(
    state: &Arc<AppState>,
    chore_id: &str,
    reason: Option<String>,
) -> CaptainResult<()> {
    let now = fleet_core::now_secs();

    let outcome = state.chores.with_mut(|chores| {
        let chore = chores.get_mut(chore_id)?;
        if chore.status.is_terminal() {
            return Some(None);
        }
        if chore.sailor.is_none() {
            chore.status = ChoreStatus::Canceled;
            chore.end = Some(now);
            chore.reason = reason.clone().unwrap_or_else(|| "canceled by user".to_string());
            return Some(None);
        }
        chore.status = ChoreStatus::CancelRequested;
        chore.cancel_requested_at = Some(now);
        chore.cancel_source = Some(fleet_core::CancelSource::User);
        if let Some(r) = &reason {
            chore.reason = r.clone();
        }
        Some(Some(chore.sailor.clone().expect("checked above")))
    })?;

    let Some(sailor_name) = outcome else {
        return Ok(());
    };

    let target = {
        let crew = state.crew.snapshot();
        crew.get(&sailor_name).map(|s| (s.ip.clone(), s.port))
    };
    if let Some((ip, port)) = target {
        let req = CancelRequest { chore_id };
        if let Err(e) = client::dispatch_cancel(&state.http, &ip, port, &req).await {
            tracing::warn!(chore_id = %chore_id, sailor = %sailor_name, error = %e, "cancel dispatch failed, cleanup loop will finalize");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::Sailor;
    use std::collections::HashMap;

    fn sailor(name: &str, cpus: u32, used_cpus: u32) -> Sailor {
        let mut s = Sailor::new_preregistered(name.to_string(), "127.0.0.1".into(), vec![], "");
        s.cpus = cpus;
        s.used_cpus = used_cpus;
        s.last_seen = 1_000;
        s
    }

    #[test]
    fn picks_most_headroom() {
        let a = sailor("a", 8, 6); // free 2
        let b = sailor("b", 8, 2); // free 6
        let candidates = vec![&a, &b];
        let picked = pick_best(&candidates, 1, 0).unwrap();
        assert_eq!(picked.name, "b");
    }

    #[test]
    fn ties_break_on_name_ascending() {
        let a = sailor("a", 8, 4);
        let b = sailor("b", 8, 4);
        let candidates = vec![&a, &b];
        let picked = pick_best(&candidates, 1, 0).unwrap();
        assert_eq!(picked.name, "a");
    }

    #[test]
    fn eligible_filters_by_service_and_capacity() {
        let mut crew = HashMap::new();
        let mut gpu_sailor = sailor("gpu1", 4, 0);
        gpu_sailor.services = vec!["gpu".to_string()];
        crew.insert("gpu1".to_string(), gpu_sailor);
        crew.insert("cpu1".to_string(), sailor("cpu1", 4, 0));

        let candidates = eligible_sailors(&crew, Some("gpu"), 1, 0, 1_000);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "gpu1");
    }

    #[test]
    fn eligible_excludes_down_sailors() {
        let mut crew = HashMap::new();
        let mut stale = sailor("stale", 4, 0);
        stale.last_seen = 1;
        crew.insert("stale".to_string(), stale);

        let candidates = eligible_sailors(&crew, None, 1, 0, 1_000);
        assert!(candidates.is_empty());
    }
}
