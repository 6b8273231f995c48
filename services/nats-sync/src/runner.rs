use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, instrument};

use crate::users_sync::UsersSync;

/// Runs [`UsersSync`] on an interval until shutdown.
///
/// A failed pass is logged and retried on the next tick.
pub struct Runner {
    sync: UsersSync,
    interval: Duration,
}

impl Runner {
    /// `interval` is raised to one millisecond if shorter.
    pub fn new(sync: UsersSync, interval: Duration) -> Self {
        Self {
            sync,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting NATS sync runner"
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sync.execute_users_sync().await {
                        error!(error = %e, "NATS users synchronization failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("NATS sync runner shutting down");
                        break;
                    }
                }
            }
        }
    }
}
