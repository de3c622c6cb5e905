//! Learning Rate - Main Entry Point

use clap::Parser;

use learning_rate::server::{run_server, ServerConfig};
use learning_rate::storage::{ObjectStorage, StorageConfig};

#[derive(Parser, Debug)]
#[command(name = "learning-rate", about = "Model training and persistence backend")]
struct Cli {
    /// Bind address; overrides API_HOST
    #[arg(long)]
    host: Option<String>,

    /// Bind port; overrides API_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "learning_rate=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let storage_config = StorageConfig::from_env()?;
    let storage = ObjectStorage::gcs(&storage_config)?;

    let mut config = ServerConfig::default();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    run_server(config, storage).await
}
