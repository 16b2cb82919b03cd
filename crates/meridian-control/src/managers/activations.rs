//! Activations registry manager.
//!
//! Stores the most recent [`ActivationStatus`] per instance. The status is
//! written by the reconciler on every attempt and read back for summary
//! queries and upstream reporting.

use std::sync::Arc;

use meridian_core::model::ActivationStatus;
use meridian_state::StateStore;

use super::{decode_part, KindRegistry};
use crate::error::{ControlError, ControlResult};

/// Manages the `workflow/activations` registry slice.
#[derive(Debug)]
pub struct ActivationsManager {
    registry: KindRegistry,
}

impl ActivationsManager {
    /// Create an activations manager over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            registry: KindRegistry::new(store, "workflow", "activations", "Activation"),
        }
    }

    /// Persist the outcome of one reconciliation attempt.
    pub async fn report_status(
        &self,
        scope: &str,
        instance: &str,
        status: &ActivationStatus,
    ) -> ControlResult<()> {
        self.registry
            .upsert(scope, instance, status, Some(serde_json::to_value(status)?))
            .await?;
        Ok(())
    }

    /// Most recent status for an instance.
    pub async fn get_status(&self, scope: &str, instance: &str) -> ControlResult<ActivationStatus> {
        let entry = self.registry.get_entry(scope, instance).await?;
        decode_part(&entry, "status")?
            .ok_or_else(|| ControlError::not_found(format!("activation status for {instance}")))
    }

    /// All recorded statuses in a scope.
    pub async fn list_statuses(&self, scope: &str) -> ControlResult<Vec<ActivationStatus>> {
        let mut statuses = Vec::new();
        for entry in self.registry.list_entries(scope).await? {
            if let Some(status) = decode_part(&entry, "status")? {
                statuses.push(status);
            }
        }
        Ok(statuses)
    }

    /// Forget an instance's activation history.
    pub async fn delete_status(&self, scope: &str, instance: &str) -> ControlResult<()> {
        self.registry.delete(scope, instance).await
    }
}

#[cfg(test)]
mod tests {
    use meridian_core::model::ActivationPhase;
    use meridian_state::MemoryStateStore;

    use super::*;

    #[tokio::test]
    async fn report_and_read_back() {
        let activations = ActivationsManager::new(Arc::new(MemoryStateStore::new()));
        let status = ActivationStatus {
            instance_id: "app-prod".to_owned(),
            generation: 2,
            status: ActivationPhase::Succeeded,
            stage: "deploy".to_owned(),
            ..ActivationStatus::default()
        };

        activations
            .report_status("", "app-prod", &status)
            .await
            .expect("report failed");

        let read = activations.get_status("", "app-prod").await.expect("get failed");
        assert_eq!(read.generation, 2);
        assert_eq!(read.status, ActivationPhase::Succeeded);
    }

    #[tokio::test]
    async fn missing_status_is_not_found() {
        let activations = ActivationsManager::new(Arc::new(MemoryStateStore::new()));
        let err = activations.get_status("", "ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn newer_report_replaces_older() {
        let activations = ActivationsManager::new(Arc::new(MemoryStateStore::new()));

        for generation in 1..=3 {
            let status = ActivationStatus {
                instance_id: "app-prod".to_owned(),
                generation,
                ..ActivationStatus::default()
            };
            activations.report_status("", "app-prod", &status).await.unwrap();
        }

        let read = activations.get_status("", "app-prod").await.unwrap();
        assert_eq!(read.generation, 3);
        assert_eq!(activations.list_statuses("").await.unwrap().len(), 1);
    }
}
