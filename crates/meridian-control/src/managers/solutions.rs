//! Solutions registry manager.

use std::sync::Arc;

use meridian_core::model::{SolutionSpec, SolutionState};
use meridian_state::StateStore;

use super::{decode_part, KindRegistry};
use crate::error::ControlResult;

/// Manages the `solution/solutions` registry slice.
#[derive(Debug)]
pub struct SolutionsManager {
    registry: KindRegistry,
}

impl SolutionsManager {
    /// Create a solutions manager over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            registry: KindRegistry::new(store, "solution", "solutions", "Solution"),
        }
    }

    /// Register or update a solution in the given scope.
    pub async fn upsert_spec(
        &self,
        scope: &str,
        name: &str,
        spec: SolutionSpec,
    ) -> ControlResult<()> {
        self.registry.upsert(scope, name, &spec, None).await?;
        Ok(())
    }

    /// Fetch one solution.
    pub async fn get_spec(&self, scope: &str, name: &str) -> ControlResult<SolutionState> {
        let entry = self.registry.get_entry(scope, name).await?;
        Ok(SolutionState {
            id: entry.id.clone(),
            spec: decode_part(&entry, "spec")?,
        })
    }

    /// List solutions in a scope.
    pub async fn list_specs(&self, scope: &str) -> ControlResult<Vec<SolutionState>> {
        let mut solutions = Vec::new();
        for entry in self.registry.list_entries(scope).await? {
            solutions.push(SolutionState {
                id: entry.id.clone(),
                spec: decode_part(&entry, "spec")?,
            });
        }
        Ok(solutions)
    }

    /// Delete a solution.
    pub async fn delete_spec(&self, scope: &str, name: &str) -> ControlResult<()> {
        self.registry.delete(scope, name).await
    }
}

#[cfg(test)]
mod tests {
    use meridian_core::model::ComponentSpec;
    use meridian_state::MemoryStateStore;

    use super::*;

    #[tokio::test]
    async fn round_trip_preserves_components() {
        let solutions = SolutionsManager::new(Arc::new(MemoryStateStore::new()));
        let spec = SolutionSpec {
            components: vec![ComponentSpec {
                name: "web".to_owned(),
                component_type: "container".to_owned(),
                dependencies: vec!["db".to_owned()],
                ..ComponentSpec::default()
            }],
            ..SolutionSpec::default()
        };

        solutions.upsert_spec("", "app", spec).await.expect("upsert failed");

        let state = solutions.get_spec("", "app").await.expect("get failed");
        let components = state.spec.unwrap().components;
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].dependencies, vec!["db".to_owned()]);
    }

    #[tokio::test]
    async fn scopes_are_isolated() {
        let solutions = SolutionsManager::new(Arc::new(MemoryStateStore::new()));
        solutions
            .upsert_spec("tenant-a", "app", SolutionSpec::default())
            .await
            .unwrap();

        assert!(solutions.get_spec("tenant-a", "app").await.is_ok());
        assert!(solutions.get_spec("", "app").await.is_err());
        assert!(solutions.list_specs("tenant-b").await.unwrap().is_empty());
    }
}
