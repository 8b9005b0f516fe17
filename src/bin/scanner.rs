use anyhow::Result;
use token_scanner::config::Config;
use token_scanner::repository::Database;
use token_scanner::supervisor;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting token scanner");

    let config = Config::from_env()?;
    info!("Configuration loaded");
    for network_config in &config.networks {
        info!(
            "{}: {} RPC endpoint(s), poa_compat={}",
            network_config.network,
            network_config.rpc_urls.len(),
            network_config.poa_compat
        );
    }
    info!(
        "Confirmation depth: {}, poll interval: {:?}",
        config.confirmation_depth, config.poll_interval
    );

    let _db = Database::new(&config.database_path)?;
    info!("Database initialized at {}", config.database_path);

    supervisor::run(&config).await
}
