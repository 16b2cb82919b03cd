//! Site resource: one control-plane instance participating in the federation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compare::{string_maps_equal, DeepEquals};

/// Desired state of a federation site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSpec {
    /// Site name, unique across the federation.
    pub name: String,
    /// Public key used to verify reports from this site.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// True for the one row representing the current process.
    #[serde(default)]
    pub is_self: bool,
    /// Free-form site properties.
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

/// Last state the site reported on heartbeat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatus {
    /// Most recent reported key/value state.
    #[serde(default)]
    pub last_reported: HashMap<String, String>,
    /// When the last report arrived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reported_at: Option<DateTime<Utc>>,
}

/// A site as read back from the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteState {
    /// Site identifier.
    pub id: String,
    /// Desired state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<SiteSpec>,
    /// Reported state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SiteStatus>,
}

impl DeepEquals for SiteSpec {
    fn deep_equals(&self, other: &Self) -> bool {
        self.name == other.name
            && self.is_self == other.is_self
            && self.public_key == other.public_key
            && string_maps_equal(&self.properties, &other.properties, &[])
    }
}
