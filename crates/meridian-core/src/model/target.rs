//! Target resource: a concrete runtime where components run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::compare::{slices_equal, string_maps_equal, DeepEquals};
use crate::model::ComponentSpec;

/// Desired state of a target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    /// Target properties (provider binding, endpoints, capabilities).
    #[serde(default)]
    pub properties: HashMap<String, String>,
    /// Components managed directly on the target, outside any solution.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentSpec>,
    /// Placement constraints matched against instance selectors.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub constraints: HashMap<String, String>,
}

/// A target as read back from the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetState {
    /// Target identifier.
    pub id: String,
    /// Desired state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<TargetSpec>,
}

impl DeepEquals for TargetSpec {
    fn deep_equals(&self, other: &Self) -> bool {
        self.display_name == other.display_name
            && string_maps_equal(&self.properties, &other.properties, &[])
            && string_maps_equal(&self.constraints, &other.constraints, &[])
            && slices_equal(&self.components, &other.components)
    }
}
