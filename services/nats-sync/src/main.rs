//! nats-sync
//!
//! Periodically rewrites the message bus authorization file from the
//! director's VM list.

use anyhow::Result;
use fleet_nats_sync::{config::SyncConfig, Runner, UsersSync};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = SyncConfig::from_env()?;

    // Prefer RUST_LOG, fall back to FLEET_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        director_url = %config.director.url,
        config_path = %config.config_path.display(),
        "Nats sync starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = Runner::new(
        UsersSync::new(config.director.clone(), config.config_path.clone()),
        config.poll_interval,
    );
    let handle = tokio::spawn(async move {
        runner.run(shutdown_rx).await;
    });

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    let _ = shutdown_tx.send(true);

    if let Err(e) = tokio::time::timeout(std::time::Duration::from_secs(10), handle).await {
        warn!(error = %e, "Runner did not shut down in time");
    }

    info!("Nats sync shutdown complete");
    Ok(())
}
