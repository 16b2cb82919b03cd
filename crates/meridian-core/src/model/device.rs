//! Device resource: a physical or virtual edge device tracked by the fabric.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::compare::{string_maps_equal, DeepEquals};

/// Desired state of a device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSpec {
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    /// Device properties (addresses, credentials references, capabilities).
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

/// A device as read back from the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceState {
    /// Device identifier.
    pub id: String,
    /// Desired state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<DeviceSpec>,
}

impl DeepEquals for DeviceSpec {
    fn deep_equals(&self, other: &Self) -> bool {
        self.display_name == other.display_name
            && string_maps_equal(&self.properties, &other.properties, &[])
    }
}
