use captain::config::CaptainConfig;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "captain", about = "Central orchestrator for the fleet")]
struct Cli {
    /// Override the port to bind (falls back to CAPTAIN_PORT, then 8080).
    #[arg(long, env = "CAPTAIN_PORT")]
    port: Option<u16>,

    /// Override the data directory (falls back to CAPTAIN_DATA_DIR).
    #[arg(long, env = "CAPTAIN_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = CaptainConfig::from_env();
    if let Some(port) = cli.port {
        config.bind_port = port;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    tracing::info!(port = config.bind_port, data_dir = ?config.data_dir, "starting captain");

    if let Err(e) = captain::run(config).await {
        tracing::error!(error = %e, "captain exited with error");
        return Err(e);
    }
    Ok(())
}
