//! fleet director
//!
//! Polls agent state for every deployment and keeps the local DNS record
//! file current.

use std::sync::Arc;

use anyhow::Result;
use fleet_director::{
    agent::{HttpAgentClientFactory, StateScope},
    config,
    db::{Database, Repository},
    dns::{DnsPublishWorker, FileRecordsPublisher, LocalDnsExporter},
    jobs::{FileResultSink, VmStatePoller, VmStateWorker},
};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Prefer RUST_LOG, fall back to FLEET_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting fleet director");
    info!(
        agent_url = %config.agent.url,
        result_path = %config.agent.result_path.display(),
        records_path = %config.dns.records_path.display(),
        "Configuration loaded"
    );

    let db = match Database::connect(&config.database).await {
        Ok(db) => {
            info!("Database connection established");
            db
        }
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            return Err(e.into());
        }
    };

    if config.dev_mode {
        info!("Running database migrations (dev mode)");
        if let Err(e) = db.run_migrations().await {
            error!(error = %e, "Failed to run migrations");
            return Err(e.into());
        }
    }

    let repository: Arc<dyn Repository> = Arc::new(db.repository());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sink = Arc::new(FileResultSink::open(&config.agent.result_path).await?);
    let poller = VmStatePoller::new(
        repository.clone(),
        Arc::new(HttpAgentClientFactory::new(config.agent.url.clone())),
        sink,
    )
    .with_timeout(config.agent.timeout)
    .with_concurrency(config.agent.poll_concurrency);
    let vm_state_worker = VmStateWorker::new(poller, config.agent.poll_interval, StateScope::Full);
    let vm_state_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            vm_state_worker.run(shutdown_rx).await;
        }
    });

    let dns_worker = DnsPublishWorker::new(
        LocalDnsExporter::new(
            repository,
            config.dns.domain.clone(),
            config.dns.include_index_records,
        ),
        Arc::new(FileRecordsPublisher::new(config.dns.records_path.clone())),
        config.dns.publish_interval,
    );
    let dns_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            dns_worker.run(shutdown_rx).await;
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);

    info!("Waiting for workers to shut down...");
    let shutdown_timeout = std::time::Duration::from_secs(10);

    if let Err(e) = tokio::time::timeout(shutdown_timeout, vm_state_handle).await {
        warn!(error = %e, "VM state worker did not shut down in time");
    }

    if let Err(e) = tokio::time::timeout(shutdown_timeout, dns_handle).await {
        warn!(error = %e, "DNS publish worker did not shut down in time");
    }

    info!("Director shutdown complete");
    Ok(())
}
