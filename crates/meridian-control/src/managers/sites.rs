//! Sites registry manager.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use meridian_core::model::{SiteSpec, SiteState};
use meridian_state::StateStore;

use super::{decode_part, KindRegistry};
use crate::error::{ControlError, ControlResult};

/// Manages the `federation/sites` registry slice.
///
/// One row marked `is_self` represents the current process; the manager
/// rejects writes that would create a second one.
#[derive(Debug)]
pub struct SitesManager {
    registry: KindRegistry,
}

impl SitesManager {
    /// Create a sites manager over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            registry: KindRegistry::new(store, "federation", "sites", "Site"),
        }
    }

    /// Register or update a site.
    pub async fn upsert_spec(&self, name: &str, spec: SiteSpec) -> ControlResult<()> {
        if spec.is_self {
            for existing in self.list_specs().await? {
                let is_other_self = existing.id != name
                    && existing.spec.as_ref().is_some_and(|s| s.is_self);
                if is_other_self {
                    return Err(ControlError::invalid_spec(format!(
                        "site {} is already marked as self",
                        existing.id
                    )));
                }
            }
        }

        self.registry.upsert("", name, &spec, None).await?;
        info!(site = %name, is_self = spec.is_self, "site registered");
        Ok(())
    }

    /// Fetch one site.
    pub async fn get_spec(&self, name: &str) -> ControlResult<SiteState> {
        let entry = self.registry.get_entry("", name).await?;
        Ok(SiteState {
            id: entry.id.clone(),
            spec: decode_part(&entry, "spec")?,
            status: decode_part(&entry, "status")?,
        })
    }

    /// List all registered sites.
    pub async fn list_specs(&self) -> ControlResult<Vec<SiteState>> {
        let mut sites = Vec::new();
        for entry in self.registry.list_entries("").await? {
            sites.push(SiteState {
                id: entry.id.clone(),
                spec: decode_part(&entry, "spec")?,
                status: decode_part(&entry, "status")?,
            });
        }
        Ok(sites)
    }

    /// Deregister a site.
    pub async fn delete_spec(&self, name: &str) -> ControlResult<()> {
        self.registry.delete("", name).await?;
        info!(site = %name, "site deregistered");
        Ok(())
    }

    /// Merge a heartbeat report into the site's status.
    pub async fn report_state(
        &self,
        name: &str,
        reported: HashMap<String, String>,
    ) -> ControlResult<()> {
        let current = self.get_spec(name).await?;
        let spec = current
            .spec
            .ok_or_else(|| ControlError::not_found(name.to_owned()))?;

        let mut status = current.status.unwrap_or_default();
        status.last_reported.extend(reported);
        status.last_reported_at = Some(Utc::now());

        self.registry
            .upsert("", name, &spec, Some(serde_json::to_value(&status)?))
            .await?;
        Ok(())
    }

    /// The site representing the current process, when registered.
    pub async fn self_site(&self) -> ControlResult<Option<SiteState>> {
        Ok(self
            .list_specs()
            .await?
            .into_iter()
            .find(|s| s.spec.as_ref().is_some_and(|spec| spec.is_self)))
    }
}
