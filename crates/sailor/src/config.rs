//! Sailor's own configuration, persisted as `resources.json`. Unlike
//! Captain, the bulk of a sailor's identity (name, declared capacity) lives
//! here rather than in environment variables, mirroring how the original
//! node agent's `load_conf`/first-run wizard worked; only the data
//! directory and log verbosity come from the environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    9090
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub captain_ip: String,
    #[serde(default)]
    pub captain_port: u16,
    #[serde(default)]
    pub cpus: u32,
    #[serde(default)]
    pub gpus: Vec<fleet_core::GpuSpec>,
    #[serde(default)]
    pub ram: u64,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        ResourcesConfig {
            name: String::new(),
            captain_ip: String::new(),
            captain_port: 0,
            cpus: num_cpus::get() as u32,
            gpus: Vec::new(),
            ram: 0,
            port: default_port(),
        }
    }
}

pub fn data_dir() -> PathBuf {
    std::env::var("SAILOR_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data/sailor"))
}

pub fn resources_path() -> PathBuf {
    data_dir().join("resources.json")
}

pub fn running_chores_path() -> PathBuf {
    data_dir().join("running_chores.json")
}
