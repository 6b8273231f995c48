//! Periodic agent state polling.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, instrument};

use crate::agent::StateScope;

use super::vm_state::VmStatePoller;

/// Shortest period a worker loop runs at.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Polls every deployment's agents on an interval.
pub struct VmStateWorker {
    poller: VmStatePoller,
    interval: Duration,
    scope: StateScope,
}

impl VmStateWorker {
    /// `interval` is raised to [`MIN_INTERVAL`] if shorter.
    pub fn new(poller: VmStatePoller, interval: Duration, scope: StateScope) -> Self {
        Self {
            poller,
            interval: interval.max(MIN_INTERVAL),
            scope,
        }
    }

    /// Run until shutdown is signaled.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            scope = %self.scope,
            "Starting VM state worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        // The first tick completes immediately; wait a full interval.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.poller.poll_all(self.scope).await {
                        error!(error = %e, "VM state poll failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("VM state worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}
