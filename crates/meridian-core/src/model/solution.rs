//! Solution resource: a deployable bundle of components.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::compare::{properties_equal, slices_equal, string_maps_equal, DeepEquals};
use crate::model::Properties;

/// One deployable component of a solution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Component name, unique within the solution.
    pub name: String,
    /// Provider-facing component type, e.g. `container`, `helm.v3`.
    #[serde(rename = "type")]
    pub component_type: String,
    /// Loose component configuration.
    #[serde(default)]
    pub properties: Properties,
    /// String metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    /// Names of components that must be applied before this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// Desired state of a solution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionSpec {
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    /// Component list; order is not significant, dependencies are.
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
    /// String metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// A solution as read back from the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionState {
    /// Solution identifier.
    pub id: String,
    /// Desired state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<SolutionSpec>,
}

impl DeepEquals for ComponentSpec {
    fn deep_equals(&self, other: &Self) -> bool {
        if self.name != other.name || self.component_type != other.component_type {
            return false;
        }
        if !properties_equal(&self.properties, &other.properties) {
            return false;
        }
        if !string_maps_equal(&self.metadata, &other.metadata, &[]) {
            return false;
        }
        let mut a = self.dependencies.clone();
        let mut b = other.dependencies.clone();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }
}

impl DeepEquals for SolutionSpec {
    fn deep_equals(&self, other: &Self) -> bool {
        self.display_name == other.display_name
            && string_maps_equal(&self.metadata, &other.metadata, &[])
            && slices_equal(&self.components, &other.components)
    }
}
