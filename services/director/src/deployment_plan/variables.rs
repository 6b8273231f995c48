//! Deployment variables.

use serde::Deserialize;

/// One entry of the `variables` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}

/// An ordered set of variable definitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    spec: Vec<VariableSpec>,
}

impl Variables {
    pub fn new(spec: Vec<VariableSpec>) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &[VariableSpec] {
        &self.spec
    }

    pub fn get_variable(&self, name: &str) -> Option<&VariableSpec> {
        self.spec.iter().find(|v| v.name == name)
    }

    pub fn contains_variable(&self, name: &str) -> bool {
        self.get_variable(name).is_some()
    }

    /// Append every definition of `other`. Does not check for duplicates.
    pub fn add(&mut self, other: Variables) {
        self.spec.extend(other.spec);
    }

    pub fn len(&self) -> usize {
        self.spec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spec.is_empty()
    }
}
