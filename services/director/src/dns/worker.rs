//! Periodic local DNS publishing.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, instrument};

use super::exporter::LocalDnsExporter;
use super::publisher::RecordsPublisher;

/// Exports the record set on an interval and publishes it when it changed.
///
/// Change detection compares digests of the unversioned set, so a new version
/// is only allocated for a set that differs from the last published one.
pub struct DnsPublishWorker {
    exporter: LocalDnsExporter,
    publisher: Arc<dyn RecordsPublisher>,
    interval: Duration,
    last_published: Mutex<Option<String>>,
}

impl DnsPublishWorker {
    pub fn new(
        exporter: LocalDnsExporter,
        publisher: Arc<dyn RecordsPublisher>,
        interval: Duration,
    ) -> Self {
        Self {
            exporter,
            publisher,
            interval: interval.max(crate::jobs::MIN_INTERVAL),
            last_published: Mutex::new(None),
        }
    }

    /// Run until shutdown is signaled.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting DNS publish worker"
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.publish_once().await {
                        error!(error = %e, "DNS publish failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("DNS publish worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Export and publish once. Returns whether a new set was published.
    pub async fn publish_once(&self) -> Result<bool> {
        let mut records = self
            .exporter
            .collect()
            .await
            .context("Failed to collect DNS records")?;
        let content = records.shasum().context("Failed to digest DNS records")?;

        let mut last_published = self.last_published.lock().await;
        if last_published.as_deref() == Some(content.as_str()) {
            debug!(content_digest = %content, "DNS records unchanged");
            return Ok(false);
        }

        let version = self
            .exporter
            .next_version()
            .await
            .context("Failed to allocate DNS records version")?;
        records.set_version(version);
        self.publisher.publish(&records).await?;

        info!(
            version,
            record_count = records.len(),
            digest = %records.shasum().context("Failed to digest DNS records")?,
            "Published DNS records"
        );
        *last_published = Some(content);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryRepository, NewInstance};
    use crate::dns::FileRecordsPublisher;

    #[tokio::test]
    async fn test_publishes_only_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        let repository = Arc::new(MemoryRepository::new());
        let deployment = repository.create_deployment("d").await;
        let instance = repository
            .create_instance(NewInstance::new(deployment.id, "web", Some(0)))
            .await;
        repository
            .add_instance_ip(instance.id, "default", "10.0.0.1")
            .await;

        let worker = DnsPublishWorker::new(
            LocalDnsExporter::new(repository.clone(), "bosh", false),
            Arc::new(FileRecordsPublisher::new(&path)),
            Duration::from_secs(60),
        );

        assert!(worker.publish_once().await.unwrap());
        assert!(!worker.publish_once().await.unwrap());

        repository
            .add_instance_ip(instance.id, "public", "35.0.0.1")
            .await;
        assert!(worker.publish_once().await.unwrap());

        let written: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(written["record_infos"].as_array().unwrap().len(), 2);
        assert_eq!(written["version"], 2);
    }
}
