//! Instance groups: a named set of identical instance definitions.

use serde::Deserialize;

use super::instance_plan::{DesiredInstance, InstancePlan};

/// Whether a group runs continuously or on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    #[default]
    Service,
    Errand,
}

/// How a VM gets replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VmStrategy {
    /// Delete the old VM, then create the new one.
    #[default]
    DeleteCreate,
    /// Create the new VM first and swap it in ("hot swap").
    CreateSwapDelete,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateConfig {
    #[serde(default = "one")]
    pub canaries: u32,
    #[serde(default = "one")]
    pub max_in_flight: u32,
    #[serde(default)]
    pub vm_strategy: VmStrategy,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            canaries: 1,
            max_in_flight: 1,
            vm_strategy: VmStrategy::DeleteCreate,
        }
    }
}

/// A network the group's instances attach to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkBinding {
    pub name: String,
    #[serde(default)]
    pub static_ips: Vec<String>,
    #[serde(default)]
    pub default: Vec<String>,
}

/// A former group whose instances this group absorbs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MigratedFrom {
    pub name: String,
    #[serde(default)]
    pub az: Option<String>,
}

/// The manifest-derived definition of a group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceGroupSpec {
    pub name: String,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    pub instances: u32,
    #[serde(default)]
    pub azs: Vec<String>,
    #[serde(default)]
    pub networks: Vec<NetworkBinding>,
    #[serde(default)]
    pub stemcell: String,
    #[serde(default)]
    pub vm_type: String,
    #[serde(default)]
    pub vm_extensions: Vec<String>,
    #[serde(default)]
    pub persistent_disk_type: Option<String>,
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub migrated_from: Vec<MigratedFrom>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceGroup {
    spec: InstanceGroupSpec,
    canonical_name: String,
    instance_plans: Vec<InstancePlan>,
    obsolete_instance_plans: Vec<InstancePlan>,
}

impl InstanceGroup {
    pub fn new(spec: InstanceGroupSpec) -> Self {
        let canonical_name = fleet_dns::canonicalize(&spec.name);
        Self {
            spec,
            canonical_name,
            instance_plans: Vec::new(),
            obsolete_instance_plans: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// DNS-safe form of the name; unique within a deployment.
    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    pub fn spec(&self) -> &InstanceGroupSpec {
        &self.spec
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.spec.lifecycle
    }

    pub fn is_service(&self) -> bool {
        self.spec.lifecycle == Lifecycle::Service
    }

    pub fn is_errand(&self) -> bool {
        self.spec.lifecycle == Lifecycle::Errand
    }

    /// Number of instances desired.
    pub fn instance_count(&self) -> u32 {
        self.spec.instances
    }

    pub fn azs(&self) -> &[String] {
        &self.spec.azs
    }

    pub fn networks(&self) -> &[NetworkBinding] {
        &self.spec.networks
    }

    pub fn stemcell(&self) -> &str {
        &self.spec.stemcell
    }

    pub fn vm_type(&self) -> &str {
        &self.spec.vm_type
    }

    pub fn update(&self) -> &UpdateConfig {
        &self.spec.update
    }

    pub fn migrated_from(&self) -> &[MigratedFrom] {
        &self.spec.migrated_from
    }

    /// The update strategy asks for hot swap.
    pub fn hot_swap(&self) -> bool {
        self.spec.update.vm_strategy == VmStrategy::CreateSwapDelete
    }

    /// Hot swap is configured and possible.
    ///
    /// Static IPs cannot be held by two VMs at once, so any static network
    /// rules it out.
    pub fn should_hot_swap(&self) -> bool {
        self.hot_swap() && self.spec.networks.iter().all(|n| n.static_ips.is_empty())
    }

    /// Replace the group's plans. Plans without a desired slot are kept apart
    /// as in-group obsolete plans.
    pub fn set_instance_plans(&mut self, plans: Vec<InstancePlan>) {
        let (obsolete, desired): (Vec<_>, Vec<_>) =
            plans.into_iter().partition(InstancePlan::is_obsolete);
        self.instance_plans = desired;
        self.obsolete_instance_plans = obsolete;
    }

    pub fn instance_plans(&self) -> &[InstancePlan] {
        &self.instance_plans
    }

    pub fn obsolete_instance_plans(&self) -> &[InstancePlan] {
        &self.obsolete_instance_plans
    }

    pub fn desired_instances(&self) -> impl Iterator<Item = &DesiredInstance> {
        self.instance_plans.iter().filter_map(InstancePlan::desired)
    }

    /// At least one instance already has a provisioned VM.
    pub fn has_provisioned_vm(&self) -> bool {
        self.instance_plans
            .iter()
            .filter_map(InstancePlan::existing)
            .any(|existing| existing.vm_created())
    }

    pub fn instance_plans_with_missing_vms(&self) -> Vec<&InstancePlan> {
        self.instance_plans
            .iter()
            .filter(|plan| plan.new_vm_needed())
            .collect()
    }

    pub fn instance_plans_needing_shutdown(&self) -> Vec<&InstancePlan> {
        self.instance_plans
            .iter()
            .filter(|plan| plan.needs_shutdown())
            .collect()
    }

    /// The az a desired index lands in: round robin over the group's azs.
    pub fn az_for_index(&self, index: u32) -> Option<String> {
        if self.spec.azs.is_empty() {
            return None;
        }
        let slot = index as usize % self.spec.azs.len();
        self.spec.azs.get(slot).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn group(value: serde_json::Value) -> InstanceGroup {
        InstanceGroup::new(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn test_defaults() {
        let g = group(json!({ "name": "Web_Server", "instances": 2 }));
        assert!(g.is_service());
        assert_eq!(g.canonical_name(), "web-server");
        assert_eq!(g.update().canaries, 1);
        assert_eq!(g.update().vm_strategy, VmStrategy::DeleteCreate);
        assert!(!g.hot_swap());
    }

    #[rstest]
    #[case(json!({ "vm_strategy": "create-swap-delete" }), json!([{ "name": "default" }]), true, true)]
    #[case(json!({ "vm_strategy": "create-swap-delete" }), json!([{ "name": "default", "static_ips": ["10.0.0.5"] }]), true, false)]
    #[case(json!({ "vm_strategy": "delete-create" }), json!([{ "name": "default" }]), false, false)]
    fn test_hot_swap_policy(
        #[case] update: serde_json::Value,
        #[case] networks: serde_json::Value,
        #[case] hot_swap: bool,
        #[case] should_hot_swap: bool,
    ) {
        let g = group(json!({
            "name": "web",
            "instances": 1,
            "update": update,
            "networks": networks
        }));
        assert_eq!(g.hot_swap(), hot_swap);
        assert_eq!(g.should_hot_swap(), should_hot_swap);
    }

    #[test]
    fn test_az_for_index_round_robin() {
        let g = group(json!({ "name": "web", "instances": 3, "azs": ["z1", "z2"] }));
        assert_eq!(g.az_for_index(0).as_deref(), Some("z1"));
        assert_eq!(g.az_for_index(1).as_deref(), Some("z2"));
        assert_eq!(g.az_for_index(2).as_deref(), Some("z1"));

        let no_azs = group(json!({ "name": "web", "instances": 1 }));
        assert_eq!(no_azs.az_for_index(0), None);
    }

    #[test]
    fn test_errand_lifecycle() {
        let g = group(json!({ "name": "smoke-tests", "instances": 1, "lifecycle": "errand" }));
        assert!(g.is_errand());
        assert!(!g.has_provisioned_vm());
    }
}
