//! Instance plans: one desired instance paired with what exists today.

use std::collections::BTreeSet;

use crate::db::InstanceRecord;

use super::instance_group::InstanceGroup;

/// A reason the existing VM cannot be kept as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Change {
    Stemcell,
    VmType,
    Networks,
    AvailabilityZone,
    Recreate,
}

/// A slot the manifest asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredInstance {
    pub index: u32,
    pub az: Option<String>,
}

/// An action record for one instance.
///
/// `desired` is `None` for deletions; `existing` is `None` for creations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePlan {
    instance_group: String,
    desired: Option<DesiredInstance>,
    existing: Option<InstanceRecord>,
    changes: BTreeSet<Change>,
}

impl InstancePlan {
    /// Plan a desired slot of `group`, optionally bound to an existing instance.
    pub fn new(
        group: &InstanceGroup,
        desired: DesiredInstance,
        existing: Option<InstanceRecord>,
        recreate: bool,
    ) -> Self {
        let changes = existing
            .as_ref()
            .map(|existing| detect_changes(group, &desired, existing, recreate))
            .unwrap_or_default();
        Self {
            instance_group: group.name().to_string(),
            desired: Some(desired),
            existing,
            changes,
        }
    }

    /// Plan the deletion of an instance nothing desires any more.
    pub fn obsolete(existing: InstanceRecord) -> Self {
        Self {
            instance_group: existing.job.clone(),
            desired: None,
            existing: Some(existing),
            changes: BTreeSet::new(),
        }
    }

    pub fn instance_group(&self) -> &str {
        &self.instance_group
    }

    pub fn desired(&self) -> Option<&DesiredInstance> {
        self.desired.as_ref()
    }

    pub fn existing(&self) -> Option<&InstanceRecord> {
        self.existing.as_ref()
    }

    pub fn changes(&self) -> &BTreeSet<Change> {
        &self.changes
    }

    pub fn is_obsolete(&self) -> bool {
        self.desired.is_none()
    }

    /// A VM has to be created: the slot is desired and its VM is missing or stale.
    pub fn new_vm_needed(&self) -> bool {
        self.desired.is_some() && !self.existing.as_ref().is_some_and(InstanceRecord::vm_created)
    }

    /// The running VM has to be shut down before it can be replaced.
    pub fn needs_shutdown(&self) -> bool {
        self.desired.is_some()
            && self.existing.as_ref().is_some_and(InstanceRecord::vm_created)
            && !self.changes.is_empty()
    }
}

fn detect_changes(
    group: &InstanceGroup,
    desired: &DesiredInstance,
    existing: &InstanceRecord,
    recreate: bool,
) -> BTreeSet<Change> {
    let mut changes = BTreeSet::new();
    if recreate {
        changes.insert(Change::Recreate);
    }
    if existing.az != desired.az {
        changes.insert(Change::AvailabilityZone);
    }

    // Without an applied spec there is nothing to compare against.
    let Some(applied) = &existing.applied_spec else {
        return changes;
    };

    if applied.stemcell.as_deref().is_some_and(|s| s != group.stemcell()) {
        changes.insert(Change::Stemcell);
    }
    if applied.vm_type.as_deref().is_some_and(|t| t != group.vm_type()) {
        changes.insert(Change::VmType);
    }
    let applied_networks: BTreeSet<&str> = applied.networks.iter().map(String::as_str).collect();
    let desired_networks: BTreeSet<&str> = group.networks().iter().map(|n| n.name.as_str()).collect();
    if applied_networks != desired_networks {
        changes.insert(Change::Networks);
    }
    changes
}
