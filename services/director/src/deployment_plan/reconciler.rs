//! Instance reconciliation.
//!
//! Binds the existing instances of a deployment to the desired slots of its
//! instance groups and derives the actions needed to converge:
//! - slots whose VM is missing or stale need a VM created
//! - changed instances of hot-swapping groups need a shutdown first
//! - instances no desired group claims are planned for deletion
//!
//! Nothing is executed here; the plans are handed to a provisioning executor.

use std::collections::{BTreeMap, HashSet};

use tracing::{info, instrument, warn};

use crate::db::InstanceRecord;

use super::instance_group::InstanceGroup;
use super::instance_plan::{DesiredInstance, InstancePlan};
use super::planner::Planner;

/// Actions computed by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Desired instances whose VM is missing or stale, in group order.
    pub create: Vec<InstancePlan>,
    /// Instances of hot-swapping groups that must shut down before recreation.
    pub hot_swap_shutdown: Vec<InstancePlan>,
    /// Instances of groups configured for hot swap that cannot use it.
    pub skipped_hot_swap_shutdown: Vec<InstancePlan>,
    /// Instances of desired groups that no desired slot claims.
    pub obsolete_instances: Vec<InstancePlan>,
    /// Instances of groups that are gone from the deployment.
    pub obsolete_instance_groups: Vec<InstancePlan>,
}

impl ReconciliationPlan {
    /// Every deletion, in-group ones first.
    pub fn deletions(&self) -> impl Iterator<Item = &InstancePlan> {
        self.obsolete_instances
            .iter()
            .chain(self.obsolete_instance_groups.iter())
    }

    pub fn is_converged(&self) -> bool {
        self.create.is_empty()
            && self.hot_swap_shutdown.is_empty()
            && self.obsolete_instances.is_empty()
            && self.obsolete_instance_groups.is_empty()
    }
}

/// Run one reconciliation pass over `planner`.
///
/// Binds instance plans to every group and replaces the planner's obsolete
/// set, then reads the resulting action lists back.
#[instrument(skip(planner), fields(deployment = %planner.name()))]
pub fn reconcile(planner: &mut Planner) -> ReconciliationPlan {
    let recreate = planner.recreate();
    let candidates: HashSet<i64> = planner
        .candidate_existing_instances()
        .iter()
        .map(|instance| instance.id)
        .collect();
    let existing = planner.existing_instances().to_vec();

    let mut claimed = HashSet::new();
    let bound: Vec<Vec<InstancePlan>> = planner
        .instance_groups()
        .iter()
        .map(|group| bind_group(group, &existing, &mut claimed, recreate))
        .collect();
    for (group, plans) in planner.instance_groups_mut().iter_mut().zip(bound) {
        group.set_instance_plans(plans);
    }

    let obsolete: Vec<InstancePlan> = existing
        .into_iter()
        .filter(|instance| !candidates.contains(&instance.id) && !claimed.contains(&instance.id))
        .map(InstancePlan::obsolete)
        .collect();
    planner.mark_instance_plans_for_deletion(obsolete);

    let plan = ReconciliationPlan {
        create: planner
            .instance_plans_with_missing_vms()
            .into_iter()
            .cloned()
            .collect(),
        hot_swap_shutdown: planner
            .instance_plans_with_hot_swap_and_needs_shutdown()
            .into_iter()
            .cloned()
            .collect(),
        skipped_hot_swap_shutdown: planner
            .skipped_instance_plans_with_hot_swap_and_needs_shutdown()
            .into_iter()
            .cloned()
            .collect(),
        obsolete_instances: planner
            .instance_groups()
            .iter()
            .flat_map(InstanceGroup::obsolete_instance_plans)
            .cloned()
            .collect(),
        obsolete_instance_groups: planner.instance_plans_for_obsolete_instance_groups().to_vec(),
    };

    info!(
        create = plan.create.len(),
        hot_swap_shutdown = plan.hot_swap_shutdown.len(),
        skipped_hot_swap_shutdown = plan.skipped_hot_swap_shutdown.len(),
        obsolete_instances = plan.obsolete_instances.len(),
        obsolete_instance_groups = plan.obsolete_instance_groups.len(),
        "Reconciliation pass complete"
    );
    plan
}

/// A claimed instance and the az its former group declared, if migrated.
struct Claim {
    instance: InstanceRecord,
    az_hint: Option<String>,
}

fn bind_group(
    group: &InstanceGroup,
    existing: &[InstanceRecord],
    claimed: &mut HashSet<i64>,
    recreate: bool,
) -> Vec<InstancePlan> {
    let count = group.instance_count();
    let mut slots: BTreeMap<u32, Claim> = BTreeMap::new();
    let mut plans = Vec::new();

    // Own instances keep their index; absorbed ones fill the gaps afterwards.
    let sources = std::iter::once((group.name(), None)).chain(
        group
            .migrated_from()
            .iter()
            .map(|m| (m.name.as_str(), m.az.as_deref())),
    );
    for (source, az_hint) in sources {
        let own = source == group.name();
        for instance in existing.iter().filter(|i| i.job == source) {
            if !claimed.insert(instance.id) {
                continue;
            }

            let Some(index) = instance.index else {
                warn!(
                    instance_group = %group.name(),
                    instance = %instance.uuid,
                    "Instance has no usable index, planning it for deletion"
                );
                plans.push(InstancePlan::obsolete(instance.clone()));
                continue;
            };

            let slot = if own {
                Some(index).filter(|i| *i < count && !slots.contains_key(i))
            } else {
                (0..count).find(|i| !slots.contains_key(i))
            };
            match slot {
                Some(slot) => {
                    slots.insert(
                        slot,
                        Claim {
                            instance: instance.clone(),
                            az_hint: az_hint.map(str::to_string),
                        },
                    );
                }
                None => plans.push(InstancePlan::obsolete(instance.clone())),
            }
        }
    }

    for index in 0..count {
        let claim = slots.remove(&index);
        let az = desired_az(group, index, claim.as_ref());
        let existing = claim.map(|c| c.instance);
        plans.push(InstancePlan::new(
            group,
            DesiredInstance { index, az },
            existing,
            recreate,
        ));
    }
    plans
}

/// Keep an instance in its current az when the group still uses it.
fn desired_az(group: &InstanceGroup, index: u32, claim: Option<&Claim>) -> Option<String> {
    let usable = |az: &String| group.azs().contains(az);
    claim
        .and_then(|c| c.instance.az.clone().filter(usable))
        .or_else(|| claim.and_then(|c| c.az_hint.clone().filter(usable)))
        .or_else(|| group.az_for_index(index))
}
