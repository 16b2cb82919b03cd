//! AI model resource.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::compare::{string_maps_equal, DeepEquals};

/// Desired state of an AI model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    /// Model properties (format, version, artifact location).
    #[serde(default)]
    pub properties: HashMap<String, String>,
    /// Placement constraints.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub constraints: HashMap<String, String>,
}

/// An AI model as read back from the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelState {
    /// Model identifier.
    pub id: String,
    /// Desired state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<ModelSpec>,
}

impl DeepEquals for ModelSpec {
    fn deep_equals(&self, other: &Self) -> bool {
        self.display_name == other.display_name
            && string_maps_equal(&self.properties, &other.properties, &[])
            && string_maps_equal(&self.constraints, &other.constraints, &[])
    }
}
