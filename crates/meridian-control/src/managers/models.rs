//! AI models registry manager.

use std::sync::Arc;

use meridian_core::model::{ModelSpec, ModelState};
use meridian_state::StateStore;

use super::{decode_part, KindRegistry};
use crate::error::ControlResult;

/// Manages the `ai/models` registry slice.
#[derive(Debug)]
pub struct ModelsManager {
    registry: KindRegistry,
}

impl ModelsManager {
    /// Create a models manager over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            registry: KindRegistry::new(store, "ai", "models", "Model"),
        }
    }

    /// Register or update a model.
    pub async fn upsert_spec(&self, name: &str, spec: ModelSpec) -> ControlResult<()> {
        self.registry.upsert("", name, &spec, None).await?;
        Ok(())
    }

    /// Fetch one model.
    pub async fn get_spec(&self, name: &str) -> ControlResult<ModelState> {
        let entry = self.registry.get_entry("", name).await?;
        Ok(ModelState {
            id: entry.id.clone(),
            spec: decode_part(&entry, "spec")?,
        })
    }

    /// List all models.
    pub async fn list_specs(&self) -> ControlResult<Vec<ModelState>> {
        let mut models = Vec::new();
        for entry in self.registry.list_entries("").await? {
            models.push(ModelState {
                id: entry.id.clone(),
                spec: decode_part(&entry, "spec")?,
            });
        }
        Ok(models)
    }

    /// Delete a model.
    pub async fn delete_spec(&self, name: &str) -> ControlResult<()> {
        self.registry.delete("", name).await
    }
}
