//! Deployment feature flags.
//!
//! A deployment may override process-wide policy per flag; an unset flag
//! falls back to the process default, never the other way around.

use serde::Deserialize;

/// Process-wide defaults for flags a deployment leaves unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureDefaults {
    pub use_dns_addresses: bool,
    pub use_short_dns_addresses: bool,
    pub randomize_az_placement: bool,
}

/// The `features` section of a deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeploymentFeatures {
    #[serde(default)]
    pub use_dns_addresses: Option<bool>,
    #[serde(default)]
    pub use_short_dns_addresses: Option<bool>,
    #[serde(default)]
    pub randomize_az_placement: Option<bool>,
    #[serde(default)]
    pub converge_variables: bool,
}

/// Resolve a deployment-level flag against its process default.
pub fn resolve_flag(flag: Option<bool>, default: bool) -> bool {
    flag.unwrap_or(default)
}
