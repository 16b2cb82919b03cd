//! Instance resource: a binding of a solution to one or more targets.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::compare::{string_maps_equal, DeepEquals};

/// How an instance picks its targets: by name, or by constraint selector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSelector {
    /// Explicit target name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Property selector matched against target constraints.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub selector: HashMap<String, String>,
}

/// Desired state of an instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    /// Instance name.
    pub name: String,
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    /// Namespace scope; empty means default.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,
    /// Referenced solution name.
    pub solution: String,
    /// Target binding.
    #[serde(default)]
    pub target: TargetSelector,
    /// Instance parameters substituted into component properties.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, String>,
}

/// An instance as read back from the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceState {
    /// Instance identifier.
    pub id: String,
    /// Desired state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<InstanceSpec>,
}

impl DeepEquals for InstanceSpec {
    fn deep_equals(&self, other: &Self) -> bool {
        self.name == other.name
            && self.scope == other.scope
            && self.solution == other.solution
            && self.target.name == other.target.name
            && string_maps_equal(&self.target.selector, &other.target.selector, &[])
            && string_maps_equal(&self.parameters, &other.parameters, &[])
    }
}
