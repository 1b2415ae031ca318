use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One entry per chore this sailor is currently supervising. Persisted so a
/// restart can at least recognize which pids it used to own, even though it
/// cannot reattach a watcher to an already-running child (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningChore {
    pub chore_id: String,
    pub pid: i32,
    pub pgid: i32,
    pub owner: u64,
    pub start: u64,
    #[serde(default)]
    pub cancel_requested: bool,
}

pub type RunningMap = HashMap<String, RunningChore>;
