//! Catalogs registry manager.
//!
//! Catalogs form a DAG per site via `parent_name`. The DAG is expressed by
//! name references only; cycle detection is a graph walk at write time, so
//! no cyclic ownership ever exists in memory. Every successful upsert is
//! announced on the `catalog` topic.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use meridian_core::bus::{topics, Event, EventBus};
use meridian_core::model::{CatalogSpec, CatalogState, EDGE_CATALOG_TYPE};
use meridian_state::StateStore;

use super::{decode_part, KindRegistry};
use crate::error::{ControlError, ControlResult};

/// Manages the `federation/catalogs` registry slice.
pub struct CatalogsManager {
    registry: KindRegistry,
    bus: Arc<EventBus>,
}

impl CatalogsManager {
    /// Create a catalogs manager over the given store and bus.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, bus: Arc<EventBus>) -> Self {
        Self {
            registry: KindRegistry::new(store, "federation", "catalogs", "Catalog"),
            bus,
        }
    }

    /// Write a catalog and publish it on the `catalog` topic.
    ///
    /// Fails with `InvalidSpec` when the write would close a parent cycle
    /// within the catalog's site.
    pub async fn upsert_spec(&self, name: &str, spec: CatalogSpec) -> ControlResult<()> {
        self.check_parent_cycle(name, &spec).await?;

        self.registry.upsert("", name, &spec, None).await?;
        info!(catalog = %name, site = %spec.site_id, "catalog upserted");

        let event = Event::from_body(&spec)?;
        self.bus.publish(topics::CATALOG, event).await;
        Ok(())
    }

    /// Fetch one catalog.
    pub async fn get_spec(&self, name: &str) -> ControlResult<CatalogState> {
        let entry = self.registry.get_entry("", name).await?;
        Ok(CatalogState {
            id: entry.id.clone(),
            spec: decode_part(&entry, "spec")?,
            status: decode_part(&entry, "status")?,
        })
    }

    /// List all catalogs.
    pub async fn list_specs(&self) -> ControlResult<Vec<CatalogState>> {
        let mut catalogs = Vec::new();
        for entry in self.registry.list_entries("").await? {
            catalogs.push(CatalogState {
                id: entry.id.clone(),
                spec: decode_part(&entry, "spec")?,
                status: decode_part(&entry, "status")?,
            });
        }
        Ok(catalogs)
    }

    /// Delete a catalog.
    pub async fn delete_spec(&self, name: &str) -> ControlResult<()> {
        self.registry.delete("", name).await?;
        info!(catalog = %name, "catalog deleted");
        Ok(())
    }

    /// Parent of a catalog, when it has one.
    pub async fn get_parent(&self, name: &str) -> ControlResult<Option<CatalogState>> {
        let state = self.get_spec(name).await?;
        match state.parent() {
            "" => Ok(None),
            parent => Ok(Some(self.get_spec(parent).await?)),
        }
    }

    /// Direct children of a catalog within its site.
    pub async fn get_children(&self, name: &str) -> ControlResult<Vec<CatalogState>> {
        Ok(self
            .list_specs()
            .await?
            .into_iter()
            .filter(|c| c.parent() == name)
            .collect())
    }

    /// All edge catalogs, optionally restricted to one site.
    pub async fn get_edges(&self, site: Option<&str>) -> ControlResult<Vec<CatalogState>> {
        Ok(self
            .list_specs()
            .await?
            .into_iter()
            .filter(|c| c.catalog_type() == EDGE_CATALOG_TYPE)
            .filter(|c| {
                site.is_none()
                    || c.spec
                        .as_ref()
                        .is_some_and(|s| Some(s.site_id.as_str()) == site)
            })
            .collect())
    }

    /// Walk the parent chain of the incoming spec and reject cycles.
    async fn check_parent_cycle(&self, name: &str, spec: &CatalogSpec) -> ControlResult<()> {
        let Some(first_parent) = spec.parent_name.as_deref() else {
            return Ok(());
        };
        if first_parent == name {
            return Err(ControlError::invalid_spec(format!(
                "catalog {name} cannot be its own parent"
            )));
        }

        let existing = self.list_specs().await?;
        let mut visited: HashSet<String> = HashSet::new();
        let mut cursor = first_parent.to_owned();

        loop {
            if cursor == name {
                return Err(ControlError::invalid_spec(format!(
                    "catalog {name} closes a parent cycle"
                )));
            }
            if !visited.insert(cursor.clone()) {
                // Pre-existing cycle among ancestors; the new node does not
                // reach itself, so the write is allowed to proceed.
                debug!(catalog = %name, "ancestor chain already cyclic");
                return Ok(());
            }
            let parent = existing
                .iter()
                .filter(|c| {
                    c.spec
                        .as_ref()
                        .is_some_and(|s| s.site_id == spec.site_id)
                })
                .find(|c| c.id == cursor)
                .map(|c| c.parent().to_owned());
            match parent {
                Some(p) if !p.is_empty() => cursor = p,
                _ => return Ok(()),
            }
        }
    }
}

impl std::fmt::Debug for CatalogsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogsManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use meridian_state::MemoryStateStore;
    use serde_json::json;

    use super::*;

    fn manager() -> CatalogsManager {
        CatalogsManager::new(Arc::new(MemoryStateStore::new()), Arc::new(EventBus::new()))
    }

    fn catalog(name: &str, parent: Option<&str>) -> CatalogSpec {
        CatalogSpec {
            site_id: "hq".to_owned(),
            name: name.to_owned(),
            catalog_type: "config".to_owned(),
            parent_name: parent.map(ToOwned::to_owned),
            properties: json!({"k": "v"}).as_object().unwrap().clone(),
            ..CatalogSpec::default()
        }
    }

    #[tokio::test]
    async fn upsert_and_get_round_trip() {
        let catalogs = manager();
        catalogs
            .upsert_spec("c1", catalog("c1", None))
            .await
            .expect("upsert failed");

        let state = catalogs.get_spec("c1").await.expect("get failed");
        let spec = state.spec.unwrap();
        assert_eq!(spec.name, "c1");
        assert_eq!(spec.properties["k"], json!("v"));
    }

    #[tokio::test]
    async fn upsert_publishes_catalog_event() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            bus.subscribe_fn(topics::CATALOG, move |_, event| {
                let seen = Arc::clone(&seen);
                async move {
                    let spec: CatalogSpec = event.body_as()?;
                    seen.lock().unwrap().push(spec.name);
                    Ok(())
                }
            })
            .await;
        }

        let catalogs = CatalogsManager::new(Arc::new(MemoryStateStore::new()), bus);
        catalogs.upsert_spec("c1", catalog("c1", None)).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["c1".to_owned()]);
    }

    #[tokio::test]
    async fn parent_chain_traversal() {
        let catalogs = manager();
        catalogs.upsert_spec("root", catalog("root", None)).await.unwrap();
        catalogs
            .upsert_spec("child", catalog("child", Some("root")))
            .await
            .unwrap();

        let parent = catalogs.get_parent("child").await.unwrap().unwrap();
        assert_eq!(parent.id, "root");
        assert!(catalogs.get_parent("root").await.unwrap().is_none());

        let children = catalogs.get_children("root").await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, "child");
    }

    #[tokio::test]
    async fn self_parent_is_rejected() {
        let catalogs = manager();
        let result = catalogs.upsert_spec("c1", catalog("c1", Some("c1"))).await;
        assert!(matches!(result, Err(ControlError::InvalidSpec(_))));
    }

    #[tokio::test]
    async fn parent_cycle_is_rejected() {
        let catalogs = manager();
        catalogs.upsert_spec("a", catalog("a", None)).await.unwrap();
        catalogs.upsert_spec("b", catalog("b", Some("a"))).await.unwrap();
        catalogs.upsert_spec("c", catalog("c", Some("b"))).await.unwrap();

        // Re-pointing a under c would close a -> b -> c -> a.
        let result = catalogs.upsert_spec("a", catalog("a", Some("c"))).await;
        assert!(matches!(result, Err(ControlError::InvalidSpec(_))));
    }

    #[tokio::test]
    async fn cycles_are_scoped_per_site() {
        let catalogs = manager();
        catalogs.upsert_spec("a", catalog("a", None)).await.unwrap();
        catalogs.upsert_spec("b", catalog("b", Some("a"))).await.unwrap();

        // The same chain written from another site is not a cycle there:
        // the walk only follows ancestors within the writing site.
        let mut foreign = catalog("a", Some("b"));
        foreign.site_id = "edge1".to_owned();
        catalogs.upsert_spec("a", foreign).await.unwrap();
    }

    #[tokio::test]
    async fn edges_are_listed_by_type() {
        let catalogs = manager();
        catalogs.upsert_spec("n1", catalog("n1", None)).await.unwrap();

        let mut edge = catalog("e1", None);
        edge.catalog_type = EDGE_CATALOG_TYPE.to_owned();
        edge.metadata = [
            ("from".to_owned(), "n1".to_owned()),
            ("to".to_owned(), "n2".to_owned()),
        ]
        .into_iter()
        .collect();
        catalogs.upsert_spec("e1", edge).await.unwrap();

        let edges = catalogs.get_edges(Some("hq")).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from(), "n1");
        assert_eq!(edges[0].to(), "n2");
        assert!(catalogs.get_edges(Some("edge1")).await.unwrap().is_empty());
    }
}
