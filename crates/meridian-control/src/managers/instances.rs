//! Instances registry manager.

use std::sync::Arc;

use meridian_core::model::{InstanceSpec, InstanceState};
use meridian_state::StateStore;

use super::{decode_part, KindRegistry};
use crate::error::ControlResult;

/// Manages the `solution/instances` registry slice.
#[derive(Debug)]
pub struct InstancesManager {
    registry: KindRegistry,
}

impl InstancesManager {
    /// Create an instances manager over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            registry: KindRegistry::new(store, "solution", "instances", "Instance"),
        }
    }

    /// Register or update an instance in the given scope.
    pub async fn upsert_spec(
        &self,
        scope: &str,
        name: &str,
        spec: InstanceSpec,
    ) -> ControlResult<()> {
        self.registry.upsert(scope, name, &spec, None).await?;
        Ok(())
    }

    /// Fetch one instance.
    pub async fn get_spec(&self, scope: &str, name: &str) -> ControlResult<InstanceState> {
        let entry = self.registry.get_entry(scope, name).await?;
        Ok(InstanceState {
            id: entry.id.clone(),
            spec: decode_part(&entry, "spec")?,
        })
    }

    /// List instances in a scope.
    pub async fn list_specs(&self, scope: &str) -> ControlResult<Vec<InstanceState>> {
        let mut instances = Vec::new();
        for entry in self.registry.list_entries(scope).await? {
            instances.push(InstanceState {
                id: entry.id.clone(),
                spec: decode_part(&entry, "spec")?,
            });
        }
        Ok(instances)
    }

    /// Delete an instance.
    pub async fn delete_spec(&self, scope: &str, name: &str) -> ControlResult<()> {
        self.registry.delete(scope, name).await
    }
}
