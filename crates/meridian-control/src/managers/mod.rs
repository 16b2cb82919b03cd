//! Registry managers, one per resource kind.
//!
//! Each manager owns one `(group, resource)` slice of the state store. On
//! upsert the manager shapes the canonical envelope
//! `{apiVersion, kind, metadata.name, spec, status?}`; on read it decodes
//! the `spec` submap back into the kind's typed struct. The serialised form
//! is the contract: bodies are never shared as in-memory aliases.

mod activations;
mod catalogs;
mod devices;
mod instances;
mod models;
mod sites;
mod solutions;
mod targets;

pub use activations::ActivationsManager;
pub use catalogs::CatalogsManager;
pub use devices::DevicesManager;
pub use instances::InstancesManager;
pub use models::ModelsManager;
pub use sites::SitesManager;
pub use solutions::SolutionsManager;
pub use targets::TargetsManager;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use meridian_state::{EntryMeta, StateEntry, StateStore, UpsertRequest};

use crate::error::ControlResult;

/// Store access for one resource kind.
///
/// Managers embed this for the mechanical envelope/decode work and add
/// kind-specific behaviour on top.
pub(crate) struct KindRegistry {
    store: Arc<dyn StateStore>,
    group: &'static str,
    resource: &'static str,
    kind: &'static str,
}

impl KindRegistry {
    pub(crate) fn new(
        store: Arc<dyn StateStore>,
        group: &'static str,
        resource: &'static str,
        kind: &'static str,
    ) -> Self {
        Self {
            store,
            group,
            resource,
            kind,
        }
    }

    pub(crate) fn meta(&self, scope: &str) -> EntryMeta {
        EntryMeta::for_kind(self.group, self.resource)
            .in_scope(scope)
            .with_template(format!(
                r#"{{"apiVersion": "{}/v1", "kind": "{}", "metadata": {{"name": "${{{{$name()}}}}"}}}}"#,
                self.group, self.kind
            ))
    }

    /// Build the canonical envelope and write it through the store.
    pub(crate) async fn upsert<S: Serialize>(
        &self,
        scope: &str,
        name: &str,
        spec: &S,
        status: Option<Value>,
    ) -> ControlResult<String> {
        let mut body = json!({
            "apiVersion": format!("{}/v1", self.group),
            "kind": self.kind,
            "metadata": { "name": name },
            "spec": serde_json::to_value(spec)?,
        });
        if let Some(status) = status {
            body["status"] = status;
        }
        let etag = self
            .store
            .upsert(UpsertRequest::new(name, body), &self.meta(scope))
            .await?;
        Ok(etag)
    }

    pub(crate) async fn get_entry(&self, scope: &str, name: &str) -> ControlResult<StateEntry> {
        Ok(self.store.get(name, &self.meta(scope)).await?)
    }

    pub(crate) async fn list_entries(&self, scope: &str) -> ControlResult<Vec<StateEntry>> {
        Ok(self.store.list(&self.meta(scope)).await?)
    }

    pub(crate) async fn delete(&self, scope: &str, name: &str) -> ControlResult<()> {
        Ok(self.store.delete(name, &self.meta(scope)).await?)
    }
}

impl std::fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindRegistry")
            .field("group", &self.group)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

/// Decode one submap (`spec` or `status`) of a stored envelope.
pub(crate) fn decode_part<T: DeserializeOwned>(
    entry: &StateEntry,
    key: &str,
) -> ControlResult<Option<T>> {
    match entry.body.get(key) {
        Some(value) if !value.is_null() => Ok(Some(serde_json::from_value(value.clone())?)),
        _ => Ok(None),
    }
}
