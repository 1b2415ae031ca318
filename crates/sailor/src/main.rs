use clap::Parser;
use fleet_core::JsonStore;
use sailor::config::{self, ResourcesConfig};

#[derive(Debug, Parser)]
#[command(name = "sailor", about = "Per-node worker agent for the fleet")]
struct Cli {
    /// Override the port from resources.json.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let store: JsonStore<ResourcesConfig> = JsonStore::open(config::resources_path());
    let mut cfg = store.snapshot();
    if let Some(port) = cli.port {
        cfg.port = port;
    }
    if cfg.name.is_empty() {
        tracing::warn!(
            "resources.json has no sailor name configured; the captain's prereg check will reject this sailor until one is set"
        );
    }

    tracing::info!(name = %cfg.name, port = cfg.port, "starting sailor");

    if let Err(e) = sailor::run(cfg).await {
        tracing::error!(error = %e, "sailor exited with error");
        return Err(e);
    }
    Ok(())
}
