//! Publishing record sets to consumers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use fleet_dns::DnsRecords;
use tokio::fs;

/// Pushes a record set to whatever serves it.
#[async_trait]
pub trait RecordsPublisher: Send + Sync {
    async fn publish(&self, records: &DnsRecords) -> Result<()>;
}

/// Writes the serialized record set to a file, replacing it atomically.
#[derive(Debug, Clone)]
pub struct FileRecordsPublisher {
    path: PathBuf,
}

impl FileRecordsPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordsPublisher for FileRecordsPublisher {
    async fn publish(&self, records: &DnsRecords) -> Result<()> {
        let json = records.to_json().context("Failed to serialize DNS records")?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).await.with_context(|| {
            format!(
                "Failed to move records file into place ({} -> {})",
                tmp.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_publisher_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.json");
        let publisher = FileRecordsPublisher::new(&path);

        let mut records = DnsRecords::new(3, false, "bosh");
        records.add_record("uuid1", "0", "web", None, "default", "d", "10.0.0.1");
        publisher.publish(&records).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(written["version"], 3);
        assert_eq!(written["records"][0][1], "uuid1.web.default.d.bosh");
        assert!(!path.with_extension("tmp").exists());
    }
}
