use std::time::Duration;

use fleet_core::JsonStore;

use crate::config::ResourcesConfig;
use crate::model::RunningMap;

pub struct AppState {
    pub config: ResourcesConfig,
    pub running: JsonStore<RunningMap>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: ResourcesConfig, running_path: std::path::PathBuf) -> std::sync::Arc<Self> {
        let running = JsonStore::open(running_path);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(4))
            .build()
            .expect("building reqwest client");
        std::sync::Arc::new(AppState {
            config,
            running,
            http,
        })
    }
}
