//! The desired-state model of one deployment.
//!
//! A [`Planner`] is built by one caller in one pass: stemcells, releases,
//! variables and instance groups are added, then instance reconciliation
//! binds existing instances to it. Once built it is only read.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::db::{DeploymentRecord, InstanceRecord};

use super::cloud::{AvailabilityZone, CloudPlanner, Network, ResourceProfile};
use super::error::PlanError;
use super::features::{resolve_flag, DeploymentFeatures, FeatureDefaults};
use super::instance_group::{InstanceGroup, UpdateConfig};
use super::instance_plan::InstancePlan;
use super::release::{ReleaseVersion, Stemcell};
use super::skip_drain::SkipDrain;
use super::variables::Variables;

/// A stored cloud or runtime config the plan was built against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigRef {
    pub id: i64,
    pub name: String,
}

/// Deploy-time options.
#[derive(Debug, Clone, Default)]
pub struct PlannerOptions {
    pub recreate: bool,
    pub fix: bool,
    pub skip_drain: SkipDrain,
    pub tags: BTreeMap<String, String>,
}

/// Everything a planner is constructed from.
#[derive(Debug, Clone)]
pub struct PlannerInputs<'a> {
    pub name: String,
    pub properties: serde_json::Value,
    pub uninterpolated_manifest: &'a serde_json::Value,
    pub raw_manifest_text: String,
    pub cloud_configs: Vec<ConfigRef>,
    pub runtime_configs: Vec<ConfigRef>,
    pub model: DeploymentRecord,
    pub existing_instances: Vec<InstanceRecord>,
    pub options: PlannerOptions,
}

/// Options handed to every instance of the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentWideOptions {
    pub fix: bool,
    pub tags: BTreeMap<String, String>,
}

pub struct Planner {
    name: String,
    canonical_name: String,
    properties: serde_json::Value,
    uninterpolated_manifest: serde_json::Value,
    raw_manifest_text: String,
    cloud_configs: Vec<ConfigRef>,
    runtime_configs: Vec<ConfigRef>,
    model: DeploymentRecord,
    existing_instances: Vec<InstanceRecord>,
    update: Option<UpdateConfig>,

    stemcells: HashMap<String, Stemcell>,
    releases: Vec<ReleaseVersion>,
    releases_by_name: HashMap<String, usize>,
    variables: Variables,
    features: DeploymentFeatures,
    addons: Vec<serde_json::Value>,

    instance_groups: Vec<InstanceGroup>,
    instance_groups_by_name: HashMap<String, usize>,
    canonical_names: HashSet<String>,
    instance_plans_for_obsolete_instance_groups: Vec<InstancePlan>,

    recreate: bool,
    fix: bool,
    skip_drain: SkipDrain,
    tags: BTreeMap<String, String>,

    cloud: Box<dyn CloudPlanner>,
    defaults: FeatureDefaults,
}

impl Planner {
    pub fn new(
        inputs: PlannerInputs<'_>,
        cloud: Box<dyn CloudPlanner>,
        defaults: FeatureDefaults,
    ) -> Self {
        let canonical_name = fleet_dns::canonicalize(&inputs.name);
        Self {
            name: inputs.name,
            canonical_name,
            properties: inputs.properties,
            // Own copy: later interpolation must not reach the audit snapshot.
            uninterpolated_manifest: inputs.uninterpolated_manifest.clone(),
            raw_manifest_text: inputs.raw_manifest_text,
            cloud_configs: inputs.cloud_configs,
            runtime_configs: inputs.runtime_configs,
            model: inputs.model,
            existing_instances: inputs.existing_instances,
            update: None,
            stemcells: HashMap::new(),
            releases: Vec::new(),
            releases_by_name: HashMap::new(),
            variables: Variables::default(),
            features: DeploymentFeatures::default(),
            addons: Vec::new(),
            instance_groups: Vec::new(),
            instance_groups_by_name: HashMap::new(),
            canonical_names: HashSet::new(),
            instance_plans_for_obsolete_instance_groups: Vec::new(),
            recreate: inputs.options.recreate,
            fix: inputs.options.fix,
            skip_drain: inputs.options.skip_drain,
            tags: inputs.options.tags,
            cloud,
            defaults,
        }
    }

    // =========================================================================
    // Deployment attributes
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    pub fn model(&self) -> &DeploymentRecord {
        &self.model
    }

    pub fn properties(&self) -> &serde_json::Value {
        &self.properties
    }

    pub fn uninterpolated_manifest(&self) -> &serde_json::Value {
        &self.uninterpolated_manifest
    }

    pub fn raw_manifest_text(&self) -> &str {
        &self.raw_manifest_text
    }

    pub fn cloud_configs(&self) -> &[ConfigRef] {
        &self.cloud_configs
    }

    pub fn runtime_configs(&self) -> &[ConfigRef] {
        &self.runtime_configs
    }

    /// Networks come from cloud configs rather than the manifest.
    pub fn using_global_networking(&self) -> bool {
        !self.cloud_configs.is_empty()
    }

    pub fn update(&self) -> Option<&UpdateConfig> {
        self.update.as_ref()
    }

    pub fn set_update(&mut self, update: UpdateConfig) {
        self.update = Some(update);
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn recreate(&self) -> bool {
        self.recreate
    }

    pub fn team_names(&self) -> &[String] {
        &self.model.teams
    }

    pub fn skip_drain_for_job(&self, name: &str) -> bool {
        self.skip_drain.for_job(name)
    }

    pub fn deployment_wide_options(&self) -> DeploymentWideOptions {
        DeploymentWideOptions {
            fix: self.fix,
            tags: self.tags.clone(),
        }
    }

    pub fn addons(&self) -> &[serde_json::Value] {
        &self.addons
    }

    pub fn add_addon(&mut self, addon: serde_json::Value) {
        self.addons.push(addon);
    }

    // =========================================================================
    // Stemcells, releases, variables
    // =========================================================================

    /// Adds a stemcell under its alias, replacing any previous one.
    pub fn add_stemcell(&mut self, stemcell: Stemcell) {
        self.stemcells.insert(stemcell.alias.clone(), stemcell);
    }

    pub fn stemcell(&self, alias: &str) -> Option<&Stemcell> {
        self.stemcells.get(alias)
    }

    pub fn stemcells(&self) -> impl Iterator<Item = &Stemcell> {
        self.stemcells.values()
    }

    pub fn add_release(&mut self, release: ReleaseVersion) -> Result<(), PlanError> {
        if self.releases_by_name.contains_key(&release.name) {
            return Err(PlanError::DuplicateReleaseName(release.name));
        }
        self.releases_by_name
            .insert(release.name.clone(), self.releases.len());
        self.releases.push(release);
        Ok(())
    }

    pub fn release(&self, name: &str) -> Option<&ReleaseVersion> {
        self.releases_by_name
            .get(name)
            .and_then(|&i| self.releases.get(i))
    }

    pub fn releases(&self) -> &[ReleaseVersion] {
        &self.releases
    }

    /// Adds every variable or none of them.
    pub fn add_variables(&mut self, incoming: Variables) -> Result<(), PlanError> {
        if let Some(duplicate) = self.first_duplicate_variable(&incoming) {
            return Err(PlanError::DuplicateVariableName(duplicate));
        }
        self.variables.add(incoming);
        Ok(())
    }

    fn first_duplicate_variable(&self, incoming: &Variables) -> Option<String> {
        let mut seen = HashSet::new();
        incoming
            .spec()
            .iter()
            .map(|variable| variable.name.as_str())
            .find(|name| self.variables.contains_variable(name) || !seen.insert(*name))
            .map(str::to_string)
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Replaces the variable set without duplicate checks.
    pub fn set_variables(&mut self, variables: Variables) {
        self.variables = variables;
    }

    // =========================================================================
    // Features
    // =========================================================================

    pub fn features(&self) -> &DeploymentFeatures {
        &self.features
    }

    pub fn set_features(&mut self, features: DeploymentFeatures) {
        self.features = features;
    }

    pub fn use_dns_addresses(&self) -> bool {
        resolve_flag(self.features.use_dns_addresses, self.defaults.use_dns_addresses)
    }

    pub fn use_short_dns_addresses(&self) -> bool {
        resolve_flag(
            self.features.use_short_dns_addresses,
            self.defaults.use_short_dns_addresses,
        )
    }

    pub fn randomize_az_placement(&self) -> bool {
        resolve_flag(
            self.features.randomize_az_placement,
            self.defaults.randomize_az_placement,
        )
    }

    // =========================================================================
    // Instance groups
    // =========================================================================

    /// Appends a group. Fails if another group has the same canonical name.
    pub fn add_instance_group(&mut self, group: InstanceGroup) -> Result<(), PlanError> {
        if self.canonical_names.contains(group.canonical_name()) {
            return Err(PlanError::CanonicalNameTaken {
                name: group.name().to_string(),
                canonical_name: group.canonical_name().to_string(),
            });
        }

        debug!(
            deployment = %self.name,
            instance_group = %group.name(),
            "Adding instance group"
        );
        self.canonical_names
            .insert(group.canonical_name().to_string());
        self.instance_groups_by_name
            .insert(group.name().to_string(), self.instance_groups.len());
        self.instance_groups.push(group);
        Ok(())
    }

    pub fn instance_group(&self, name: &str) -> Option<&InstanceGroup> {
        self.instance_groups_by_name
            .get(name)
            .and_then(|&i| self.instance_groups.get(i))
    }

    pub fn instance_group_mut(&mut self, name: &str) -> Option<&mut InstanceGroup> {
        let index = *self.instance_groups_by_name.get(name)?;
        self.instance_groups.get_mut(index)
    }

    /// All groups, in declaration order.
    pub fn instance_groups(&self) -> &[InstanceGroup] {
        &self.instance_groups
    }

    pub(crate) fn instance_groups_mut(&mut self) -> &mut [InstanceGroup] {
        &mut self.instance_groups
    }

    /// Service groups, plus errand groups that already have a VM.
    ///
    /// Declaration order is kept; it is the default convergence order.
    pub fn instance_groups_starting_on_deploy(&self) -> Vec<&InstanceGroup> {
        self.instance_groups
            .iter()
            .filter(|group| group.is_service() || group.has_provisioned_vm())
            .collect()
    }

    pub fn errand_instance_groups(&self) -> Vec<&InstanceGroup> {
        self.instance_groups
            .iter()
            .filter(|group| group.is_errand())
            .collect()
    }

    // =========================================================================
    // Existing instances and instance plans
    // =========================================================================

    pub fn existing_instances(&self) -> &[InstanceRecord] {
        &self.existing_instances
    }

    /// Existing instances a desired group may claim: those of a desired
    /// group, or of a group some desired group migrates from.
    pub fn candidate_existing_instances(&self) -> Vec<&InstanceRecord> {
        let claimable: HashSet<&str> = self
            .instance_groups
            .iter()
            .flat_map(|group| {
                std::iter::once(group.name())
                    .chain(group.migrated_from().iter().map(|m| m.name.as_str()))
            })
            .collect();

        self.existing_instances
            .iter()
            .filter(|instance| claimable.contains(instance.job.as_str()))
            .collect()
    }

    pub fn instance_plans_with_missing_vms(&self) -> Vec<&InstancePlan> {
        self.instance_groups_starting_on_deploy()
            .into_iter()
            .flat_map(InstanceGroup::instance_plans_with_missing_vms)
            .collect()
    }

    /// Plans to shut down before recreation, from groups that hot swap.
    ///
    /// A group whose policy rules hot swap out contributes nothing; the other
    /// groups are still considered.
    pub fn instance_plans_with_hot_swap_and_needs_shutdown(&self) -> Vec<&InstancePlan> {
        self.instance_groups_starting_on_deploy()
            .into_iter()
            .filter(|group| group.should_hot_swap())
            .flat_map(InstanceGroup::instance_plans_needing_shutdown)
            .collect()
    }

    /// Plans from groups configured for hot swap that cannot use it.
    pub fn skipped_instance_plans_with_hot_swap_and_needs_shutdown(&self) -> Vec<&InstancePlan> {
        self.instance_groups_starting_on_deploy()
            .into_iter()
            .filter(|group| group.hot_swap() != group.should_hot_swap())
            .flat_map(InstanceGroup::instance_plans_needing_shutdown)
            .collect()
    }

    /// Replaces the set of plans for groups no longer in the manifest.
    pub fn mark_instance_plans_for_deletion(&mut self, plans: Vec<InstancePlan>) {
        self.instance_plans_for_obsolete_instance_groups = plans;
    }

    pub fn instance_plans_for_obsolete_instance_groups(&self) -> &[InstancePlan] {
        &self.instance_plans_for_obsolete_instance_groups
    }

    // =========================================================================
    // Cloud topology
    // =========================================================================

    pub fn cloud(&self) -> &dyn CloudPlanner {
        self.cloud.as_ref()
    }

    pub fn networks(&self) -> Vec<&Network> {
        self.cloud.networks()
    }

    pub fn network(&self, name: &str) -> Option<&Network> {
        self.cloud.network(name)
    }

    pub fn availability_zone(&self, name: &str) -> Option<&AvailabilityZone> {
        self.cloud.availability_zone(name)
    }

    pub fn availability_zone_names(&self) -> Vec<String> {
        self.cloud
            .availability_zones()
            .into_iter()
            .map(|az| az.name.clone())
            .collect()
    }

    pub fn vm_type(&self, name: &str) -> Option<&ResourceProfile> {
        self.cloud.vm_type(name)
    }

    pub fn disk_type(&self, name: &str) -> Option<&ResourceProfile> {
        self.cloud.disk_type(name)
    }
}
