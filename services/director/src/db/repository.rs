//! Read/write contract the core needs from the persistent store.

use async_trait::async_trait;

use super::models::{DeploymentRecord, InstanceAddress, InstanceRecord, VmRecord};
use super::DbError;

/// Entity repository backing the director.
///
/// Lookups that miss return `Ok(None)`; errors are reserved for store
/// failures.
#[async_trait]
pub trait Repository: Send + Sync {
    /// All deployments, ordered by name.
    async fn deployments(&self) -> Result<Vec<DeploymentRecord>, DbError>;

    /// A deployment by name.
    async fn deployment(&self, name: &str) -> Result<Option<DeploymentRecord>, DbError>;

    /// Instances of a deployment, ordered by job then index.
    async fn instances(&self, deployment_id: i64) -> Result<Vec<InstanceRecord>, DbError>;

    /// VMs recorded for a deployment.
    async fn vms(&self, deployment_id: i64) -> Result<Vec<VmRecord>, DbError>;

    /// Composite lookup by `(deployment, job, index)`.
    ///
    /// The index is typed; callers holding an unparseable index must use
    /// [`Repository::instance_by_vm`] instead.
    async fn instance_by_job_index(
        &self,
        deployment_id: i64,
        job: &str,
        index: u32,
    ) -> Result<Option<InstanceRecord>, DbError>;

    /// Lookup by the VM an instance points at. Never compares an index.
    async fn instance_by_vm(&self, vm_id: i64) -> Result<Option<InstanceRecord>, DbError>;

    /// Alternate lookup by agent id.
    async fn instance_by_agent_id(&self, agent_id: &str)
        -> Result<Option<InstanceRecord>, DbError>;

    /// Set the resurrection-paused flag of an instance.
    async fn set_resurrection_paused(&self, instance_id: i64, paused: bool) -> Result<(), DbError>;

    /// Names of address records whose content is one of `ips`.
    async fn dns_record_names(&self, ips: &[String]) -> Result<Vec<String>, DbError>;

    /// Every address of every instance in a deployment, for discovery.
    async fn instance_addresses(&self, deployment_id: i64)
        -> Result<Vec<InstanceAddress>, DbError>;

    /// Allocate the next discovery record set version.
    async fn next_dns_version(&self) -> Result<i64, DbError>;
}
