//! Persisted entities read by the planner and the pollers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A deployment row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRecord {
    pub id: i64,
    pub name: String,
    pub teams: Vec<String>,
}

/// Instance lifecycle state as recorded by the director.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Started,
    Stopped,
    Detached,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Detached => "detached",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "started" => Some(Self::Started),
            "stopped" => Some(Self::Stopped),
            "detached" => Some(Self::Detached),
            _ => None,
        }
    }
}

/// What was last applied to an instance's VM.
///
/// Compared against the desired instance group to decide whether the VM has
/// to be recreated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedSpec {
    #[serde(default)]
    pub stemcell: Option<String>,
    #[serde(default)]
    pub vm_type: Option<String>,
    #[serde(default)]
    pub networks: Vec<String>,
}

/// The VM an instance currently points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRef {
    pub id: i64,
    pub cid: Option<String>,
    pub agent_id: String,
    pub active: bool,
}

impl VmRef {
    /// A VM that is provisioned and is the instance's active one.
    pub fn is_provisioned(&self) -> bool {
        self.active && self.cid.is_some()
    }
}

/// An instance row.
///
/// Identified by `(deployment, job, index)`; `index` is `None` when the
/// stored value is missing or not a valid integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    pub id: i64,
    pub uuid: Uuid,
    pub deployment_id: i64,
    pub job: String,
    pub index: Option<u32>,
    pub az: Option<String>,
    pub state: InstanceState,
    pub resurrection_paused: bool,
    pub vm: Option<VmRef>,
    pub applied_spec: Option<AppliedSpec>,
}

impl InstanceRecord {
    /// Whether this instance has a provisioned, active VM.
    pub fn vm_created(&self) -> bool {
        self.vm.as_ref().is_some_and(VmRef::is_provisioned)
    }

    pub fn vm_cid(&self) -> Option<&str> {
        self.vm.as_ref().and_then(|vm| vm.cid.as_deref())
    }
}

/// A VM row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRecord {
    pub id: i64,
    pub deployment_id: i64,
    pub agent_id: String,
    pub cid: Option<String>,
    pub instance_id: Option<i64>,
    pub active: bool,
}

/// One address of one instance, as fed to discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceAddress {
    pub uuid: Uuid,
    pub index: Option<u32>,
    pub instance_group: String,
    pub az: Option<String>,
    pub network: String,
    pub deployment: String,
    pub ip: String,
}
