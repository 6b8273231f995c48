//! In-memory repository for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{
    AppliedSpec, DeploymentRecord, InstanceAddress, InstanceRecord, InstanceState, VmRecord, VmRef,
};
use super::{DbError, Repository};

/// Fields for inserting an instance.
#[derive(Debug, Clone)]
pub struct NewInstance {
    pub deployment_id: i64,
    pub job: String,
    pub index: Option<u32>,
    pub uuid: Uuid,
    pub az: Option<String>,
    pub state: InstanceState,
    pub resurrection_paused: bool,
    pub applied_spec: Option<AppliedSpec>,
}

impl NewInstance {
    pub fn new(deployment_id: i64, job: &str, index: Option<u32>) -> Self {
        Self {
            deployment_id,
            job: job.to_string(),
            index,
            uuid: Uuid::new_v4(),
            az: None,
            state: InstanceState::Started,
            resurrection_paused: false,
            applied_spec: None,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    dns_version: i64,
    deployments: Vec<DeploymentRecord>,
    instances: Vec<InstanceRecord>,
    instance_vms: HashMap<i64, i64>,
    vms: Vec<VmRecord>,
    dns_records: Vec<(String, String)>,
    instance_ips: Vec<(i64, String, String)>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn hydrate(&self, instance: &InstanceRecord) -> InstanceRecord {
        let mut instance = instance.clone();
        instance.vm = self
            .instance_vms
            .get(&instance.id)
            .and_then(|vm_id| self.vms.iter().find(|vm| vm.id == *vm_id))
            .map(|vm| VmRef {
                id: vm.id,
                cid: vm.cid.clone(),
                agent_id: vm.agent_id.clone(),
                active: vm.active,
            });
        instance
    }
}

/// Repository backed by in-process tables.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_deployment(&self, name: &str) -> DeploymentRecord {
        let mut tables = self.tables.write().await;
        let deployment = DeploymentRecord {
            id: tables.allocate_id(),
            name: name.to_string(),
            teams: Vec::new(),
        };
        tables.deployments.push(deployment.clone());
        deployment
    }

    pub async fn create_vm(&self, deployment_id: i64, agent_id: &str, cid: Option<&str>) -> VmRecord {
        let mut tables = self.tables.write().await;
        let vm = VmRecord {
            id: tables.allocate_id(),
            deployment_id,
            agent_id: agent_id.to_string(),
            cid: cid.map(str::to_string),
            instance_id: None,
            active: false,
        };
        tables.vms.push(vm.clone());
        vm
    }

    pub async fn create_instance(&self, new: NewInstance) -> InstanceRecord {
        let mut tables = self.tables.write().await;
        let instance = InstanceRecord {
            id: tables.allocate_id(),
            uuid: new.uuid,
            deployment_id: new.deployment_id,
            job: new.job,
            index: new.index,
            az: new.az,
            state: new.state,
            resurrection_paused: new.resurrection_paused,
            vm: None,
            applied_spec: new.applied_spec,
        };
        tables.instances.push(instance.clone());
        instance
    }

    /// Point an instance at a VM.
    pub async fn attach_vm(&self, instance_id: i64, vm_id: i64, active: bool) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        let vm = tables
            .vms
            .iter_mut()
            .find(|vm| vm.id == vm_id)
            .ok_or_else(|| DbError::NotFound(format!("vm {vm_id}")))?;
        vm.instance_id = Some(instance_id);
        vm.active = active;
        tables.instance_vms.insert(instance_id, vm_id);
        Ok(())
    }

    pub async fn create_dns_record(&self, name: &str, ip: &str) {
        let mut tables = self.tables.write().await;
        tables.dns_records.push((name.to_string(), ip.to_string()));
    }

    pub async fn add_instance_ip(&self, instance_id: i64, network: &str, ip: &str) {
        let mut tables = self.tables.write().await;
        tables
            .instance_ips
            .push((instance_id, network.to_string(), ip.to_string()));
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn deployments(&self) -> Result<Vec<DeploymentRecord>, DbError> {
        let tables = self.tables.read().await;
        let mut deployments = tables.deployments.clone();
        deployments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(deployments)
    }

    async fn deployment(&self, name: &str) -> Result<Option<DeploymentRecord>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables.deployments.iter().find(|d| d.name == name).cloned())
    }

    async fn instances(&self, deployment_id: i64) -> Result<Vec<InstanceRecord>, DbError> {
        let tables = self.tables.read().await;
        let mut instances: Vec<_> = tables
            .instances
            .iter()
            .filter(|i| i.deployment_id == deployment_id)
            .map(|i| tables.hydrate(i))
            .collect();
        instances.sort_by(|a, b| a.job.cmp(&b.job).then(a.index.cmp(&b.index)));
        Ok(instances)
    }

    async fn vms(&self, deployment_id: i64) -> Result<Vec<VmRecord>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .vms
            .iter()
            .filter(|vm| vm.deployment_id == deployment_id)
            .cloned()
            .collect())
    }

    async fn instance_by_job_index(
        &self,
        deployment_id: i64,
        job: &str,
        index: u32,
    ) -> Result<Option<InstanceRecord>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .instances
            .iter()
            .find(|i| i.deployment_id == deployment_id && i.job == job && i.index == Some(index))
            .map(|i| tables.hydrate(i)))
    }

    async fn instance_by_vm(&self, vm_id: i64) -> Result<Option<InstanceRecord>, DbError> {
        let tables = self.tables.read().await;
        let instance_id = tables
            .instance_vms
            .iter()
            .find(|(_, vm)| **vm == vm_id)
            .map(|(instance, _)| *instance);

        Ok(instance_id
            .and_then(|id| tables.instances.iter().find(|i| i.id == id))
            .map(|i| tables.hydrate(i)))
    }

    async fn instance_by_agent_id(
        &self,
        agent_id: &str,
    ) -> Result<Option<InstanceRecord>, DbError> {
        let vm_id = {
            let tables = self.tables.read().await;
            tables
                .vms
                .iter()
                .find(|vm| vm.agent_id == agent_id)
                .map(|vm| vm.id)
        };

        match vm_id {
            Some(vm_id) => self.instance_by_vm(vm_id).await,
            None => Ok(None),
        }
    }

    async fn set_resurrection_paused(&self, instance_id: i64, paused: bool) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        let instance = tables
            .instances
            .iter_mut()
            .find(|i| i.id == instance_id)
            .ok_or_else(|| DbError::NotFound(format!("instance {instance_id}")))?;
        instance.resurrection_paused = paused;
        Ok(())
    }

    async fn dns_record_names(&self, ips: &[String]) -> Result<Vec<String>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .dns_records
            .iter()
            .filter(|(_, content)| ips.contains(content))
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn instance_addresses(
        &self,
        deployment_id: i64,
    ) -> Result<Vec<InstanceAddress>, DbError> {
        let tables = self.tables.read().await;
        let Some(deployment) = tables.deployments.iter().find(|d| d.id == deployment_id) else {
            return Ok(Vec::new());
        };

        let mut addresses = Vec::new();
        for (instance_id, network, ip) in &tables.instance_ips {
            let Some(instance) = tables
                .instances
                .iter()
                .find(|i| i.id == *instance_id && i.deployment_id == deployment_id)
            else {
                continue;
            };

            addresses.push(InstanceAddress {
                uuid: instance.uuid,
                index: instance.index,
                instance_group: instance.job.clone(),
                az: instance.az.clone(),
                network: network.clone(),
                deployment: deployment.name.clone(),
                ip: ip.clone(),
            });
        }
        Ok(addresses)
    }

    async fn next_dns_version(&self) -> Result<i64, DbError> {
        let mut tables = self.tables.write().await;
        tables.dns_version += 1;
        Ok(tables.dns_version)
    }
}
