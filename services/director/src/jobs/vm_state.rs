//! Agent state polling.
//!
//! For every VM of a deployment, asks its agent for its state, merges that
//! with what the director knows (DNS names, resurrection flag) and writes one
//! status report per VM to a [`ResultSink`].
//!
//! Agents that time out still get a report built from persisted facts.
//! No agent failure aborts the poll. A repository or sink error on one VM
//! does not stop the others; the first such error is returned once every VM
//! has been processed.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::agent::{
    AgentClientFactory, AgentIndex, AgentState, StateScope, Vitals, DEFAULT_AGENT_TIMEOUT,
};
use crate::db::{DbError, DeploymentRecord, InstanceRecord, Repository, VmRecord};

use super::result_sink::{ResultSink, SinkError};

/// `job_state` reported for an agent that did not answer in time.
pub const UNRESPONSIVE_AGENT: &str = "unresponsive agent";

#[derive(Debug, Error)]
pub enum PollError {
    #[error("repository error: {0}")]
    Repository(#[from] DbError),

    #[error("result sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Status of one VM.
///
/// Keys without a value are left out rather than written as null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmStatusReport {
    pub vm_cid: Option<String>,
    pub agent_id: Option<String>,
    pub job_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ips: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_pool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vitals: Option<Vitals>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resurrection_paused: Option<bool>,
}

impl VmStatusReport {
    /// Report for a VM whose agent timed out.
    pub fn unresponsive(vm: &VmRecord) -> Self {
        Self {
            vm_cid: vm.cid.clone(),
            agent_id: Some(vm.agent_id.clone()),
            job_state: Some(UNRESPONSIVE_AGENT.to_string()),
            ..Self::default()
        }
    }

    pub fn is_unresponsive(&self) -> bool {
        self.job_state.as_deref() == Some(UNRESPONSIVE_AGENT)
    }
}

/// Outcome counts of one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    /// Reports built from an agent reply.
    pub reported: usize,
    /// Reports built for agents that timed out.
    pub unresponsive: usize,
    /// VMs skipped because their agent failed otherwise.
    pub failed: usize,
}

enum VmOutcome {
    Reported,
    Unresponsive,
    Failed,
}

pub struct VmStatePoller {
    repository: Arc<dyn Repository>,
    agents: Arc<dyn AgentClientFactory>,
    sink: Arc<dyn ResultSink>,
    timeout: Duration,
    concurrency: usize,
}

impl VmStatePoller {
    pub fn new(
        repository: Arc<dyn Repository>,
        agents: Arc<dyn AgentClientFactory>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            repository,
            agents,
            sink,
            timeout: DEFAULT_AGENT_TIMEOUT,
            concurrency: 1,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Poll up to `concurrency` agents at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Poll every VM of `deployment`.
    ///
    /// Returns the first repository or sink error, after all VMs are done.
    #[instrument(skip(self, deployment, scope), fields(deployment = %deployment.name, scope = %scope))]
    pub async fn poll(
        &self,
        deployment: &DeploymentRecord,
        scope: StateScope,
    ) -> Result<PollSummary, PollError> {
        let vms = self.repository.vms(deployment.id).await?;
        debug!(vm_count = vms.len(), "Polling agents");

        let mut outcomes = stream::iter(vms)
            .map(|vm| self.process_vm(vm, scope))
            .buffer_unordered(self.concurrency);

        let mut summary = PollSummary::default();
        let mut first_error = None;
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Ok(VmOutcome::Reported) => summary.reported += 1,
                Ok(VmOutcome::Unresponsive) => summary.unresponsive += 1,
                Ok(VmOutcome::Failed) => summary.failed += 1,
                Err(e) => {
                    error!(error = %e, "Failed to report VM state");
                    summary.failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        info!(
            reported = summary.reported,
            unresponsive = summary.unresponsive,
            failed = summary.failed,
            "Agent poll complete"
        );
        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    /// Poll every deployment in turn; one failing deployment does not skip
    /// the rest.
    pub async fn poll_all(&self, scope: StateScope) -> Result<PollSummary, PollError> {
        let mut total = PollSummary::default();
        let mut first_error = None;
        for deployment in self.repository.deployments().await? {
            match self.poll(&deployment, scope).await {
                Ok(summary) => {
                    total.reported += summary.reported;
                    total.unresponsive += summary.unresponsive;
                    total.failed += summary.failed;
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }

    /// Build and write the report of a single VM.
    async fn process_vm(&self, vm: VmRecord, scope: StateScope) -> Result<VmOutcome, PollError> {
        let client = self.agents.client(&vm.agent_id, self.timeout);

        let (report, outcome) = match client.get_state(scope).await {
            Ok(state) => (self.report_from_state(&vm, state).await?, VmOutcome::Reported),
            Err(e) if e.is_timeout() => {
                warn!(agent_id = %vm.agent_id, vm_cid = ?vm.cid, "Agent unresponsive");
                (VmStatusReport::unresponsive(&vm), VmOutcome::Unresponsive)
            }
            Err(e) => {
                warn!(agent_id = %vm.agent_id, error = %e, "Failed to get agent state");
                return Ok(VmOutcome::Failed);
            }
        };

        let document = serde_json::to_string(&report).map_err(SinkError::from)?;
        self.sink.write(&document).await?;
        Ok(outcome)
    }

    async fn report_from_state(
        &self,
        vm: &VmRecord,
        state: AgentState,
    ) -> Result<VmStatusReport, PollError> {
        let ips = state.ips();
        let dns = if ips.is_empty() {
            Vec::new()
        } else {
            self.repository.dns_record_names(&ips).await?
        };

        let index = state.index.as_ref().and_then(AgentIndex::parsed);
        let instance = self.find_instance(vm, &state, index).await?;

        Ok(VmStatusReport {
            vm_cid: state.vm_cid.clone(),
            agent_id: state.agent_id.clone(),
            job_state: state.job_state.clone(),
            ips: Some(ips),
            dns: Some(dns),
            job_name: state.job_name().map(str::to_string),
            index,
            resource_pool: state.resource_pool_name().map(str::to_string),
            vitals: state.vitals,
            resurrection_paused: instance.map(|i| i.resurrection_paused),
        })
    }

    /// The persisted instance behind a VM.
    ///
    /// The composite `(job, index)` lookup is only used with an integer index;
    /// anything else goes through the VM reference.
    async fn find_instance(
        &self,
        vm: &VmRecord,
        state: &AgentState,
        index: Option<u32>,
    ) -> Result<Option<InstanceRecord>, PollError> {
        if let (Some(job), Some(index)) = (state.job_name(), index) {
            let found = self
                .repository
                .instance_by_job_index(vm.deployment_id, job, index)
                .await?;
            if found.is_some() {
                return Ok(found);
            }
        } else if state.index.is_some() {
            debug!(agent_id = %vm.agent_id, index = ?state.index, "Agent index is not an integer");
        }

        Ok(self.repository.instance_by_vm(vm.id).await?)
    }
}
