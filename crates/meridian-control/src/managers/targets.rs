//! Targets registry manager.

use std::sync::Arc;

use meridian_core::model::{TargetSpec, TargetState};
use meridian_state::StateStore;

use super::{decode_part, KindRegistry};
use crate::error::ControlResult;

/// Manages the `fabric/targets` registry slice.
#[derive(Debug)]
pub struct TargetsManager {
    registry: KindRegistry,
}

impl TargetsManager {
    /// Create a targets manager over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            registry: KindRegistry::new(store, "fabric", "targets", "Target"),
        }
    }

    /// Register or update a target in the given scope.
    pub async fn upsert_spec(&self, scope: &str, name: &str, spec: TargetSpec) -> ControlResult<()> {
        self.registry.upsert(scope, name, &spec, None).await?;
        Ok(())
    }

    /// Fetch one target.
    pub async fn get_spec(&self, scope: &str, name: &str) -> ControlResult<TargetState> {
        let entry = self.registry.get_entry(scope, name).await?;
        Ok(TargetState {
            id: entry.id.clone(),
            spec: decode_part(&entry, "spec")?,
        })
    }

    /// List targets in a scope.
    pub async fn list_specs(&self, scope: &str) -> ControlResult<Vec<TargetState>> {
        let mut targets = Vec::new();
        for entry in self.registry.list_entries(scope).await? {
            targets.push(TargetState {
                id: entry.id.clone(),
                spec: decode_part(&entry, "spec")?,
            });
        }
        Ok(targets)
    }

    /// Delete a target.
    pub async fn delete_spec(&self, scope: &str, name: &str) -> ControlResult<()> {
        self.registry.delete(scope, name).await
    }
}
