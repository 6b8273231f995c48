//! Cloud topology available to a deployment.
//!
//! The planner does not own networks, availability zones or resource
//! profiles. It asks a [`CloudPlanner`] injected at construction.

use std::collections::HashMap;

use serde::Deserialize;

/// How addresses on a network are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    Manual,
    Dynamic,
    Vip,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Network {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NetworkKind,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AvailabilityZone {
    pub name: String,
    #[serde(default)]
    pub cloud_properties: serde_json::Value,
}

/// A named resource profile: vm type, vm extension or disk type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourceProfile {
    pub name: String,
    #[serde(default)]
    pub cloud_properties: serde_json::Value,
}

/// Settings for compilation VMs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Compilation {
    pub workers: u32,
    pub network: String,
    #[serde(default)]
    pub az: Option<String>,
    #[serde(default)]
    pub vm_type: Option<String>,
}

/// Cloud topology queries the planner delegates.
pub trait CloudPlanner: Send + Sync {
    fn networks(&self) -> Vec<&Network>;
    fn network(&self, name: &str) -> Option<&Network>;
    /// A network that existed in a previous cloud config but no longer does.
    fn deleted_network(&self, name: &str) -> Option<&Network>;
    fn availability_zones(&self) -> Vec<&AvailabilityZone>;
    fn availability_zone(&self, name: &str) -> Option<&AvailabilityZone>;
    fn vm_type(&self, name: &str) -> Option<&ResourceProfile>;
    fn vm_extension(&self, name: &str) -> Option<&ResourceProfile>;
    fn disk_type(&self, name: &str) -> Option<&ResourceProfile>;
    fn compilation(&self) -> Option<&Compilation>;
}

/// The `cloud config` document, as far as planning needs it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloudConfig {
    #[serde(default)]
    pub networks: Vec<Network>,
    #[serde(default)]
    pub azs: Vec<AvailabilityZone>,
    #[serde(default)]
    pub vm_types: Vec<ResourceProfile>,
    #[serde(default)]
    pub vm_extensions: Vec<ResourceProfile>,
    #[serde(default)]
    pub disk_types: Vec<ResourceProfile>,
    #[serde(default)]
    pub compilation: Option<Compilation>,
}

/// A [`CloudPlanner`] over a fixed cloud config.
///
/// Keeps declaration order for listings and a name index for lookups.
#[derive(Debug, Clone, Default)]
pub struct StaticCloudPlanner {
    config: CloudConfig,
    deleted_networks: Vec<Network>,
    networks_by_name: HashMap<String, usize>,
    azs_by_name: HashMap<String, usize>,
}

impl StaticCloudPlanner {
    pub fn new(config: CloudConfig) -> Self {
        let networks_by_name = index_by_name(config.networks.iter().map(|n| n.name.as_str()));
        let azs_by_name = index_by_name(config.azs.iter().map(|az| az.name.as_str()));
        Self {
            config,
            deleted_networks: Vec::new(),
            networks_by_name,
            azs_by_name,
        }
    }

    /// Networks present in the previous cloud config but not in this one.
    pub fn with_deleted_networks(mut self, deleted: Vec<Network>) -> Self {
        self.deleted_networks = deleted;
        self
    }
}

fn index_by_name<'a>(names: impl Iterator<Item = &'a str>) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    for (position, name) in names.enumerate() {
        // First declaration wins.
        index.entry(name.to_string()).or_insert(position);
    }
    index
}

fn find_profile<'a>(profiles: &'a [ResourceProfile], name: &str) -> Option<&'a ResourceProfile> {
    profiles.iter().find(|p| p.name == name)
}

impl CloudPlanner for StaticCloudPlanner {
    fn networks(&self) -> Vec<&Network> {
        self.config.networks.iter().collect()
    }

    fn network(&self, name: &str) -> Option<&Network> {
        self.networks_by_name
            .get(name)
            .and_then(|&i| self.config.networks.get(i))
    }

    fn deleted_network(&self, name: &str) -> Option<&Network> {
        self.deleted_networks.iter().find(|n| n.name == name)
    }

    fn availability_zones(&self) -> Vec<&AvailabilityZone> {
        self.config.azs.iter().collect()
    }

    fn availability_zone(&self, name: &str) -> Option<&AvailabilityZone> {
        self.azs_by_name.get(name).and_then(|&i| self.config.azs.get(i))
    }

    fn vm_type(&self, name: &str) -> Option<&ResourceProfile> {
        find_profile(&self.config.vm_types, name)
    }

    fn vm_extension(&self, name: &str) -> Option<&ResourceProfile> {
        find_profile(&self.config.vm_extensions, name)
    }

    fn disk_type(&self, name: &str) -> Option<&ResourceProfile> {
        find_profile(&self.config.disk_types, name)
    }

    fn compilation(&self) -> Option<&Compilation> {
        self.config.compilation.as_ref()
    }
}
