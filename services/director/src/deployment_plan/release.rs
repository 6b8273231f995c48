//! Releases and stemcells referenced by a deployment.

use serde::Deserialize;

/// A release pinned to one version.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseVersion {
    pub name: String,
    pub version: String,
}

/// A stemcell, addressed by its alias within the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Stemcell {
    pub alias: String,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub version: String,
}
