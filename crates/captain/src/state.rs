use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fleet_core::{ChoreMap, CrewMap, JsonStore, UserMap};

use crate::auth::{AuthBackend, NullAuthBackend};
use crate::config::CaptainConfig;

#[derive(Clone, Debug)]
pub struct TokenInfo {
    pub uid: u64,
    pub expires_at: u64,
}

/// Shared application state, the Captain analogue of a sidecar's server
/// struct: config plus the stores plus a client for calling out to sailors.
pub struct AppState {
    pub config: CaptainConfig,
    pub crew: JsonStore<CrewMap>,
    pub chores: JsonStore<ChoreMap>,
    pub users: JsonStore<UserMap>,
    pub http: reqwest::Client,
    pub tokens: Mutex<HashMap<String, TokenInfo>>,
    pub auth: Arc<dyn AuthBackend>,
}

impl AppState {
    pub fn new(config: CaptainConfig) -> Arc<Self> {
        let crew = JsonStore::open(config.crew_path());
        let chores = JsonStore::open(config.chores_path());
        let users = JsonStore::open(config.users_path());
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(4))
            .build()
            .expect("building reqwest client");

        Arc::new(AppState {
            config,
            crew,
            chores,
            users,
            http,
            tokens: Mutex::new(HashMap::new()),
            auth: Arc::new(NullAuthBackend),
        })
    }
}
