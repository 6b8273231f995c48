//! Configuration errors raised while building a deployment plan.

use thiserror::Error;

/// Errors that make a deployment plan invalid.
///
/// All of these are fatal to plan construction; the violating call leaves
/// the plan unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// Another instance group already uses this canonical name.
    #[error("invalid instance group name '{name}': canonical name '{canonical_name}' already taken")]
    CanonicalNameTaken {
        name: String,
        canonical_name: String,
    },

    /// A release with this name is already part of the plan.
    #[error("duplicate release name '{0}'")]
    DuplicateReleaseName(String),

    /// A variable with this name is already part of the plan.
    #[error("duplicate variable name '{0}'")]
    DuplicateVariableName(String),
}
