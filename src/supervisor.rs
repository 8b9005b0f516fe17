use crate::config::Config;
use crate::monitor::{ChainMonitor, MonitorConfig};
use crate::repository::Database;
use crate::rpc::RpcClient;
use anyhow::{Context, Result};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Spawns one monitor task per configured network and waits for all of
/// them. Each task owns its own RPC client and database connection, so the
/// networks are independent failure domains; a Ctrl-C propagates shutdown
/// through the shared cancellation token.
pub async fn run(config: &Config) -> Result<()> {
    let cancel = CancellationToken::new();
    let mut handles = Vec::new();

    for network_config in &config.networks {
        let rpc = RpcClient::new(&network_config.rpc_urls, network_config.poa_compat)?;
        let db = Database::new(&config.database_path)?;
        let monitor = ChainMonitor::new(
            rpc,
            db,
            MonitorConfig {
                network: network_config.network,
                confirmation_depth: config.confirmation_depth,
                poll_interval: config.poll_interval,
                backoff_base: config.backoff_base,
                backoff_cap: config.backoff_cap,
                failure_threshold: config.failure_threshold,
            },
        );
        handles.push(tokio::spawn(monitor.run(cancel.clone())));
    }

    info!("Supervising {} network monitor(s)", handles.len());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received, stopping monitors");
    cancel.cancel();

    for result in join_all(handles).await {
        if let Err(e) = result {
            error!("Monitor task ended abnormally: {e}");
        }
    }

    Ok(())
}
