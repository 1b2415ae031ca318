//! Background reconciliation loop: per-user time budgets, per-sailor
//! `max_time`, stuck `cancel_requested` finalization, and terminal-chore TTL
//! purge. Runs every `reconcile_interval_secs`; never holds a store lock
//! across network I/O, and tolerates individual failures by logging and
//! continuing to the next phase.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fleet_core::{CancelSource, ChoreMap, ChoreStatus, CrewMap, UserMap};

use crate::client::{self, CancelRequest};
use crate::scheduler::run_assignment_pass;
use crate::state::AppState;

/// §4.5(a): among each user's non-pending active chores, protect the oldest
/// (by `budget_t0`) up to the user's time_limit; everything after the limit
/// is exceeded gets marked for cancellation.
pub fn select_user_time_limit_cancellations(
    chores: &ChoreMap,
    users: &UserMap,
    now: u64,
) -> Vec<String> {
    let mut by_owner: HashMap<u64, Vec<&fleet_core::Chore>> = HashMap::new();
    for c in chores.values() {
        if c.status.is_active() && c.status != ChoreStatus::Pending {
            by_owner.entry(c.owner).or_default().push(c);
        }
    }

    let mut out = Vec::new();
    for (owner, mut owned) in by_owner {
        let limit = users
            .get(&owner.to_string())
            .map(|u| u.time_limit_secs())
            .unwrap_or(0);
        if limit == 0 {
            continue;
        }
        owned.sort_by_key(|c| c.budget_t0());

        let mut total = 0u64;
        for c in owned {
            let duration = now.saturating_sub(c.budget_t0());
            if total + duration > limit {
                out.push(c.chore_id.clone());
            } else {
                total += duration;
            }
        }
    }
    out
}

/// §4.5(b): a chore whose sailor has a positive `max_time` and has run
/// longer than that gets marked for cancellation.
pub fn select_sailor_max_time_cancellations(
    chores: &ChoreMap,
    crew: &CrewMap,
    now: u64,
) -> Vec<String> {
    chores
        .values()
        .filter(|c| matches!(c.status, ChoreStatus::Assigned | ChoreStatus::Running))
        .filter_map(|c| {
            let sailor_name = c.sailor.as_ref()?;
            let sailor = crew.get(sailor_name)?;
            if sailor.max_time_secs > 0 && now.saturating_sub(c.budget_t0()) > sailor.max_time_secs {
                Some(c.chore_id.clone())
            } else {
                None
            }
        })
        .collect()
}

pub async fn run_forever(state: Arc<AppState>) {
    let interval = Duration::from_secs(state.config.reconcile_interval_secs.max(1));
    loop {
        tokio::time::sleep(interval).await;
        run_once(&state).await;
    }
}

pub async fn run_once(state: &Arc<AppState>) {
    let now = fleet_core::now_secs();

    mark_and_dispatch_cancels(state, now).await;
    finalize_stuck_cancel_requested(state, now).await;
    purge_expired_terminal_chores(state, now);

    run_assignment_pass(state).await;
}

async fn mark_and_dispatch_cancels(state: &Arc<AppState>, now: u64) {
    let (time_limit_ids, max_time_ids) = {
        let chores = state.chores.snapshot();
        let users = state.users.snapshot();
        let crew = state.crew.snapshot();
        (
            select_user_time_limit_cancellations(&chores, &users, now),
            select_sailor_max_time_cancellations(&chores, &crew, now),
        )
    };

    for (chore_id, source, reason) in time_limit_ids
        .into_iter()
        .map(|id| (id, CancelSource::UserTimeLimit, "exceeded user time limit"))
        .chain(
            max_time_ids
                .into_iter()
                .map(|id| (id, CancelSource::SailorMaxTime, "exceeded time limit")),
        )
    {
        let target = state.chores.with_mut(|chores| {
            let chore = chores.get_mut(&chore_id)?;
            if chore.status.is_terminal() || chore.status == ChoreStatus::CancelRequested {
                return None;
            }
            chore.status = ChoreStatus::CancelRequested;
            chore.cancel_requested_at = Some(now);
            chore.cancel_source = Some(source);
            chore.reason = reason.to_string();
            chore.sailor.clone()
        });

        let Ok(Some(sailor_name)) = target else {
            continue;
        };
        let endpoint = {
            let crew = state.crew.snapshot();
            crew.get(&sailor_name).map(|s| (s.ip.clone(), s.port))
        };
        if let Some((ip, port)) = endpoint {
            let req = CancelRequest { chore_id: &chore_id };
            if let Err(e) = client::dispatch_cancel(&state.http, &ip, port, &req).await {
                tracing::warn!(chore_id = %chore_id, error = %e, "reconcile: cancel dispatch failed");
            }
        }
    }
}

async fn finalize_stuck_cancel_requested(state: &Arc<AppState>, now: u64) {
    let ttl = state.config.cancel_requested_ttl_secs;

    let stuck: Vec<(String, Option<String>, u32, u32)> = state
        .chores
        .with_mut(|chores| {
            let mut out = Vec::new();
            for chore in chores.values_mut() {
                if chore.status != ChoreStatus::CancelRequested {
                    continue;
                }
                if chore.cancel_requested_at.is_none() {
                    chore.cancel_requested_at = Some(chore.budget_t0());
                }
                let at = chore.cancel_requested_at.unwrap_or(now);
                if now.saturating_sub(at) >= ttl {
                    out.push((
                        chore.chore_id.clone(),
                        chore.sailor.clone(),
                        chore.ressources.cpus,
                        chore.ressources.gpus,
                    ));
                }
            }
            out
        })
        .unwrap_or_default();

    for (chore_id, sailor_name, cpus, gpus) in stuck {
        if let Some(name) = &sailor_name {
            let endpoint = {
                let crew = state.crew.snapshot();
                crew.get(name).map(|s| (s.ip.clone(), s.port))
            };
            if let Some((ip, port)) = endpoint {
                let req = CancelRequest { chore_id: &chore_id };
                let _ = client::dispatch_cancel(&state.http, &ip, port, &req).await;
            }
            let _ = state.crew.with_mut(|crew| {
                if let Some(s) = crew.get_mut(name) {
                    s.used_cpus = s.used_cpus.saturating_sub(cpus);
                    s.used_gpus = s.used_gpus.saturating_sub(gpus);
                }
            });
        }

        let _ = state.chores.with_mut(|chores| {
            if let Some(chore) = chores.get_mut(&chore_id) {
                chore.status = ChoreStatus::Canceled;
                chore.end = Some(now);
                chore.fill_reason_from_source();
            }
        });
        tracing::info!(chore_id = %chore_id, "reconcile: finalized stuck cancel_requested via TTL");
    }
}

fn purge_expired_terminal_chores(state: &Arc<AppState>, now: u64) {
    let ttl = state.config.cleanup_ttl_secs;
    let _ = state.chores.with_mut(|chores| {
        let before = chores.len();
        chores.retain(|_, c| {
            if !c.status.is_terminal() {
                return true;
            }
            match c.end {
                Some(end) => now.saturating_sub(end) < ttl,
                None => true,
            }
        });
        let purged = before - chores.len();
        if purged > 0 {
            tracing::debug!(purged, "reconcile: purged expired terminal chores");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{Chore, Resources, Sailor, User};

    fn chore(id: &str, owner: u64, status: ChoreStatus, t0: u64) -> Chore {
        Chore {
            chore_id: id.to_string(),
            script: "/x.sh".into(),
            service: None,
            ressources: Resources { cpus: 1, gpus: 0 },
            owner,
            sailor: Some("s1".to_string()),
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

    #[test]
    fn time_limit_protects_oldest_first() {
        let mut chores = ChoreMap::new();
        chores.insert("old".into(), chore("old", 1000, ChoreStatus::Running, 0));
        chores.insert("new".into(), chore("new", 1000, ChoreStatus::Running, 5));

        let mut users = UserMap::new();
        users.insert(
            "1000".into(),
            User {
                time_limit: Some("00:00:10".into()),
                ..Default::default()
            },
        );

        let cancels = select_user_time_limit_cancellations(&chores, &users, 20);
        assert_eq!(cancels, vec!["new".to_string()]);
    }

    #[test]
    fn no_limit_means_no_cancellations() {
        let mut chores = ChoreMap::new();
        chores.insert("a".into(), chore("a", 1000, ChoreStatus::Running, 0));
        let users = UserMap::new();
        assert!(select_user_time_limit_cancellations(&chores, &users, 1_000_000).is_empty());
    }

    #[test]
    fn sailor_max_time_flags_overrun_chore() {
        let mut chores = ChoreMap::new();
        chores.insert("a".into(), chore("a", 1, ChoreStatus::Running, 0));
        let mut crew = CrewMap::new();
        let mut s = Sailor::new_preregistered("s1".into(), "127.0.0.1".into(), vec![], "00:00:05");
        s.last_seen = 1;
        crew.insert("s1".into(), s);

        let cancels = select_sailor_max_time_cancellations(&chores, &crew, 10);
        assert_eq!(cancels, vec!["a".to_string()]);
    }
}
