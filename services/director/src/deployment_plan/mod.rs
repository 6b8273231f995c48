//! Desired-state planning for one deployment.
//!
//! - `planner`: the deployment model (groups, releases, variables, features)
//! - `instance_group` / `instance_plan`: groups and per-instance actions
//! - `reconciler`: binds existing instances and computes the action lists
//! - `cloud`: the cloud topology the planner delegates to

pub mod cloud;
mod error;
mod features;
mod instance_group;
mod instance_plan;
mod planner;
mod reconciler;
mod release;
mod skip_drain;
mod variables;

pub use cloud::{
    AvailabilityZone, CloudConfig, CloudPlanner, Compilation, Network, NetworkKind,
    ResourceProfile, StaticCloudPlanner,
};
pub use error::PlanError;
pub use features::{resolve_flag, DeploymentFeatures, FeatureDefaults};
pub use instance_group::{
    InstanceGroup, InstanceGroupSpec, Lifecycle, MigratedFrom, NetworkBinding, UpdateConfig,
    VmStrategy,
};
pub use instance_plan::{Change, DesiredInstance, InstancePlan};
pub use planner::{ConfigRef, DeploymentWideOptions, Planner, PlannerInputs, PlannerOptions};
pub use reconciler::{reconcile, ReconciliationPlan};
pub use release::{ReleaseVersion, Stemcell};
pub use skip_drain::SkipDrain;
pub use variables::{VariableSpec, Variables};
