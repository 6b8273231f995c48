//! Builds the local DNS record set from the repository.

use std::sync::Arc;

use fleet_dns::{canonicalize, DnsRecords};
use tracing::debug;

use crate::db::{DbError, Repository};

/// Produces one [`DnsRecords`] set covering every deployment.
pub struct LocalDnsExporter {
    repository: Arc<dyn Repository>,
    domain: String,
    include_index_records: bool,
}

impl LocalDnsExporter {
    pub fn new(
        repository: Arc<dyn Repository>,
        domain: impl Into<String>,
        include_index_records: bool,
    ) -> Self {
        Self {
            repository,
            domain: domain.into(),
            include_index_records,
        }
    }

    /// Export all addresses under a fresh version.
    pub async fn export(&self) -> Result<DnsRecords, DbError> {
        let mut records = self.collect().await?;
        records.set_version(self.next_version().await?);
        Ok(records)
    }

    /// Allocate the next record set version.
    pub async fn next_version(&self) -> Result<i64, DbError> {
        self.repository.next_dns_version().await
    }

    /// All addresses at version 0.
    ///
    /// Deployments come in repository order, addresses in instance order.
    /// Group, network and deployment names are canonicalized.
    pub async fn collect(&self) -> Result<DnsRecords, DbError> {
        let mut records = DnsRecords::new(0, self.include_index_records, &self.domain);

        for deployment in self.repository.deployments().await? {
            let addresses = self.repository.instance_addresses(deployment.id).await?;
            debug!(
                deployment = %deployment.name,
                address_count = addresses.len(),
                "Exporting DNS records"
            );

            for address in addresses {
                let id = address.uuid.to_string();
                // Without an index the alias repeats the id name.
                let index = address.index.map_or_else(|| id.clone(), |i| i.to_string());
                records.add_record(
                    &id,
                    &index,
                    &canonicalize(&address.instance_group),
                    address.az.as_deref(),
                    &canonicalize(&address.network),
                    &canonicalize(&address.deployment),
                    &address.ip,
                );
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryRepository, NewInstance};

    #[tokio::test]
    async fn test_export_versions_and_names() {
        let repository = Arc::new(MemoryRepository::new());
        let deployment = repository.create_deployment("My_Deployment").await;
        let mut new = NewInstance::new(deployment.id, "web_server", Some(0));
        new.az = Some("z1".to_string());
        let instance = repository.create_instance(new).await;
        repository
            .add_instance_ip(instance.id, "default", "10.0.0.5")
            .await;

        let exporter = LocalDnsExporter::new(repository.clone(), "bosh", true);
        let first = exporter.export().await.unwrap();
        let second = exporter.export().await.unwrap();
        assert!(second.version() > first.version());

        let serialized = first.serialize();
        assert_eq!(
            serialized.records,
            vec![
                (
                    "10.0.0.5".to_string(),
                    format!("{}.web-server.default.my-deployment.bosh", instance.uuid)
                ),
                (
                    "10.0.0.5".to_string(),
                    "0.web-server.default.my-deployment.bosh".to_string()
                ),
            ]
        );
        assert_eq!(serialized.record_infos.len(), 1);
        assert_eq!(serialized.record_infos[0].az.as_deref(), Some("z1"));
    }

    #[tokio::test]
    async fn test_export_empty() {
        let repository = Arc::new(MemoryRepository::new());
        let exporter = LocalDnsExporter::new(repository, "bosh", false);
        let records = exporter.export().await.unwrap();
        assert!(records.is_empty());
    }
}
