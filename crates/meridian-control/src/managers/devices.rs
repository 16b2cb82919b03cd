//! Devices registry manager.

use std::sync::Arc;

use meridian_core::model::{DeviceSpec, DeviceState};
use meridian_state::StateStore;

use super::{decode_part, KindRegistry};
use crate::error::ControlResult;

/// Manages the `fabric/devices` registry slice.
#[derive(Debug)]
pub struct DevicesManager {
    registry: KindRegistry,
}

impl DevicesManager {
    /// Create a devices manager over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            registry: KindRegistry::new(store, "fabric", "devices", "Device"),
        }
    }

    /// Register or update a device.
    pub async fn upsert_spec(&self, name: &str, spec: DeviceSpec) -> ControlResult<()> {
        self.registry.upsert("", name, &spec, None).await?;
        Ok(())
    }

    /// Fetch one device.
    pub async fn get_spec(&self, name: &str) -> ControlResult<DeviceState> {
        let entry = self.registry.get_entry("", name).await?;
        Ok(DeviceState {
            id: entry.id.clone(),
            spec: decode_part(&entry, "spec")?,
        })
    }

    /// List all devices.
    pub async fn list_specs(&self) -> ControlResult<Vec<DeviceState>> {
        let mut devices = Vec::new();
        for entry in self.registry.list_entries("").await? {
            devices.push(DeviceState {
                id: entry.id.clone(),
                spec: decode_part(&entry, "spec")?,
            });
        }
        Ok(devices)
    }

    /// Delete a device.
    pub async fn delete_spec(&self, name: &str) -> ControlResult<()> {
        self.registry.delete("", name).await
    }
}

#[cfg(test)]
mod tests {
    use meridian_state::MemoryStateStore;

    use super::*;

    #[tokio::test]
    async fn round_trip() {
        let devices = DevicesManager::new(Arc::new(MemoryStateStore::new()));
        let spec = DeviceSpec {
            display_name: "camera-1".to_owned(),
            properties: [("ip".to_owned(), "10.0.0.7".to_owned())]
                .into_iter()
                .collect(),
        };

        devices.upsert_spec("cam1", spec).await.expect("upsert failed");

        let state = devices.get_spec("cam1").await.expect("get failed");
        assert_eq!(state.spec.unwrap().display_name, "camera-1");
        assert_eq!(devices.list_specs().await.unwrap().len(), 1);

        devices.delete_spec("cam1").await.expect("delete failed");
        assert!(devices.get_spec("cam1").await.is_err());
    }
}
