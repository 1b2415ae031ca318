//! Environment-driven configuration, loaded once at startup. Mirrors the
//! section-struct-with-`Default` shape the rest of this codebase's lineage
//! uses for its server config, but flattened since there's only one section.

use std::path::PathBuf;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct CaptainConfig {
    pub bind_port: u16,
    pub data_dir: PathBuf,
    pub cleanup_ttl_secs: u64,
    pub cancel_requested_ttl_secs: u64,
    pub token_ttl_secs: u64,
    pub flag_file: Option<PathBuf>,
    pub reconcile_interval_secs: u64,
}

impl Default for CaptainConfig {
    fn default() -> Self {
        CaptainConfig {
            bind_port: 8080,
            data_dir: PathBuf::from("./data/captain"),
            cleanup_ttl_secs: 120,
            cancel_requested_ttl_secs: 300,
            token_ttl_secs: 3600,
            flag_file: None,
            reconcile_interval_secs: 5,
        }
    }
}

impl CaptainConfig {
    pub fn from_env() -> Self {
        let default = CaptainConfig::default();
        CaptainConfig {
            bind_port: env_or("CAPTAIN_PORT", default.bind_port),
            data_dir: std::env::var("CAPTAIN_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.data_dir),
            cleanup_ttl_secs: env_or("CAPTAIN_CLEANUP_TTL", default.cleanup_ttl_secs),
            cancel_requested_ttl_secs: env_or(
                "CAPTAIN_CANCEL_REQUESTED_TTL",
                default.cancel_requested_ttl_secs,
            ),
            token_ttl_secs: env_or("CAPTAIN_TOKEN_TTL", default.token_ttl_secs),
            flag_file: std::env::var("CAPTAIN_FLAG_FILE").ok().map(PathBuf::from),
            reconcile_interval_secs: default.reconcile_interval_secs,
        }
    }

    pub fn crew_path(&self) -> PathBuf {
        self.data_dir.join("crew.json")
    }

    pub fn chores_path(&self) -> PathBuf {
        self.data_dir.join("chores.json")
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join("users.json")
    }
}
