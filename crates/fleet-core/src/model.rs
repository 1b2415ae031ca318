//! Wire-compatible data model: sailors, chores, users.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::coerce;
use crate::duration::parse_duration_secs;

/// A sailor is considered `down` once its heartbeat is older than this.
pub const ALIVE_THRESHOLD_SECS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SailorStatus {
    Down,
    Idle,
    Busy,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuSpec {
    #[serde(rename = "type")]
    pub gpu_type: String,
    pub vram: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sailor {
    pub name: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub cpus: u32,
    #[serde(default)]
    pub gpus: Vec<GpuSpec>,
    #[serde(default)]
    pub ram: u64,
    #[serde(default)]
    pub used_cpus: u32,
    #[serde(default)]
    pub used_gpus: u32,
    #[serde(default)]
    pub last_seen: u64,
    /// Raw duration string; 0 (parsed) means disabled. Stored parsed for
    /// cheap repeated reads by the reconciliation loop.
    #[serde(default)]
    pub max_time_secs: u64,
}

impl Sailor {
    pub fn new_preregistered(name: String, ip: String, services: Vec<String>, max_time: &str) -> Self {
        Sailor {
            name,
            ip,
            port: 0,
            services,
            cpus: 0,
            gpus: Vec::new(),
            ram: 0,
            used_cpus: 0,
            used_gpus: 0,
            last_seen: 0,
            max_time_secs: parse_duration_secs(max_time),
        }
    }

    pub fn free_cpu(&self) -> i64 {
        self.cpus as i64 - self.used_cpus as i64
    }

    pub fn free_gpu(&self) -> i64 {
        self.gpus.len() as i64 - self.used_gpus as i64
    }

    pub fn is_alive(&self, now: u64) -> bool {
        self.last_seen != 0 && now.saturating_sub(self.last_seen) <= ALIVE_THRESHOLD_SECS
    }

    /// Status is derived, never stored as ground truth.
    pub fn derived_status(&self, now: u64) -> SailorStatus {
        if !self.is_alive(now) {
            return SailorStatus::Down;
        }
        if self.used_cpus >= self.cpus && self.cpus > 0 {
            SailorStatus::Full
        } else if self.used_cpus > 0 || self.used_gpus > 0 {
            SailorStatus::Busy
        } else {
            SailorStatus::Idle
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct Resources {
    #[serde(default)]
    pub cpus: u32,
    #[serde(default, deserialize_with = "coerce::gpu_count_lenient")]
    pub gpus: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChoreStatus {
    Pending,
    Assigned,
    Running,
    CancelRequested,
    Done,
    Failed,
    Canceled,
}

impl ChoreStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChoreStatus::Done | ChoreStatus::Failed | ChoreStatus::Canceled)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChoreStatus::Pending => "pending",
            ChoreStatus::Assigned => "assigned",
            ChoreStatus::Running => "running",
            ChoreStatus::CancelRequested => "cancel_requested",
            ChoreStatus::Done => "done",
            ChoreStatus::Failed => "failed",
            ChoreStatus::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelSource {
    User,
    SailorMaxTime,
    UserTimeLimit,
    Timeout,
}

impl CancelSource {
    /// Canonical `reason` text for a chore that becomes terminal by way of
    /// this cancel source, used only when no reason was set earlier.
    pub fn default_reason(self) -> &'static str {
        match self {
            CancelSource::User => "canceled by user",
            CancelSource::SailorMaxTime => "exceeded time limit",
            CancelSource::UserTimeLimit => "exceeded user time limit",
            CancelSource::Timeout => "canceled by timeout",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chore {
    pub chore_id: String,
    pub script: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub ressources: Resources,
    #[serde(deserialize_with = "coerce::u64_lenient")]
    pub owner: u64,
    #[serde(default)]
    pub sailor: Option<String>,
    pub start: u64,
    #[serde(default)]
    pub assigned_at: Option<u64>,
    #[serde(default)]
    pub run_start: Option<u64>,
    #[serde(default)]
    pub cancel_requested_at: Option<u64>,
    #[serde(default)]
    pub end: Option<u64>,
    pub status: ChoreStatus,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub cancel_source: Option<CancelSource>,
}

impl Chore {
    /// The reference instant used for time-budget accounting: first
    /// preference is when the chore actually started running, then when it
    /// was assigned, then when it was submitted.
    pub fn budget_t0(&self) -> u64 {
        self.run_start.or(self.assigned_at).unwrap_or(self.start)
    }

    pub fn fill_reason_from_source(&mut self) {
        if self.reason.is_empty() {
            if let Some(source) = self.cancel_source {
                self.reason = source.default_reason().to_string();
            } else {
                self.reason = self.status.as_str().to_string();
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct User {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub time_limit: Option<String>,
    #[serde(default, deserialize_with = "coerce::opt_u32_lenient")]
    pub chores_limit: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl User {
    pub fn time_limit_secs(&self) -> u64 {
        self.time_limit
            .as_deref()
            .map(parse_duration_secs)
            .unwrap_or(0)
    }
}

pub type CrewMap = HashMap<String, Sailor>;
pub type ChoreMap = HashMap<String, Chore>;
pub type UserMap = HashMap<String, User>;
