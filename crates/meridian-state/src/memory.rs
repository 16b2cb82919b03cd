//! In-memory state store backend.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{StateError, StateResult};
use crate::traits::StateStore;
use crate::types::{EntryMeta, StateEntry, UpsertRequest};

/// Key addressing one entry. `version` is deliberately excluded: drivers
/// treat it as a rendering hint, not an identity component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StoreKey {
    scope: String,
    group: String,
    resource: String,
    id: String,
}

impl StoreKey {
    fn new(id: &str, meta: &EntryMeta) -> Self {
        Self {
            scope: meta.scope.clone(),
            group: meta.group.clone(),
            resource: meta.resource.clone(),
            id: id.to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredEntry {
    body: serde_json::Value,
    etag: String,
}

/// In-memory [`StateStore`] backend.
///
/// Data is lost on restart; intended for tests and single-node deployments
/// where the registry is reconstructed from upstream sync.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: DashMap<StoreKey, StoredEntry>,
    etag_counter: AtomicU64,
}

impl MemoryStateStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries across all resource kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn next_etag(&self) -> String {
        self.etag_counter.fetch_add(1, Ordering::Relaxed).to_string()
    }

    fn validate(id: &str, meta: &EntryMeta) -> StateResult<()> {
        if id.is_empty() {
            return Err(StateError::bad_request("entry id must not be empty"));
        }
        if meta.resource.is_empty() {
            return Err(StateError::bad_request("resource metadata must not be empty"));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, id: &str, meta: &EntryMeta) -> StateResult<StateEntry> {
        Self::validate(id, meta)?;
        let key = StoreKey::new(id, meta);
        self.entries
            .get(&key)
            .map(|stored| StateEntry {
                id: id.to_owned(),
                body: stored.body.clone(),
                etag: stored.etag.clone(),
            })
            .ok_or_else(|| StateError::NotFound(id.to_owned()))
    }

    async fn list(&self, meta: &EntryMeta) -> StateResult<Vec<StateEntry>> {
        if meta.resource.is_empty() {
            return Err(StateError::bad_request("resource metadata must not be empty"));
        }
        let mut entries: Vec<StateEntry> = self
            .entries
            .iter()
            .filter(|r| {
                let key = r.key();
                key.scope == meta.scope && key.group == meta.group && key.resource == meta.resource
            })
            .map(|r| StateEntry {
                id: r.key().id.clone(),
                body: r.value().body.clone(),
                etag: r.value().etag.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    async fn upsert(&self, request: UpsertRequest, meta: &EntryMeta) -> StateResult<String> {
        Self::validate(&request.id, meta)?;
        let key = StoreKey::new(&request.id, meta);

        // Entry-level locking comes from the DashMap shard; the entry body
        // must stay free of other store calls.
        let etag = match self.entries.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                let stored = occupied.get();
                if let Some(supplied) = &request.etag {
                    if supplied != &stored.etag {
                        return Err(StateError::Conflict {
                            id: request.id,
                            supplied: supplied.clone(),
                            stored: stored.etag.clone(),
                        });
                    }
                }
                if stored.body == request.body {
                    stored.etag.clone()
                } else {
                    let etag = self.next_etag();
                    occupied.insert(StoredEntry {
                        body: request.body,
                        etag: etag.clone(),
                    });
                    etag
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                if let Some(supplied) = &request.etag {
                    return Err(StateError::Conflict {
                        id: request.id.clone(),
                        supplied: supplied.clone(),
                        stored: String::new(),
                    });
                }
                let etag = self.next_etag();
                vacant.insert(StoredEntry {
                    body: request.body,
                    etag: etag.clone(),
                });
                etag
            }
        };
        Ok(etag)
    }

    async fn delete(&self, id: &str, meta: &EntryMeta) -> StateResult<()> {
        Self::validate(id, meta)?;
        let key = StoreKey::new(id, meta);
        if self.entries.remove(&key).is_none() {
            return Err(StateError::NotFound(id.to_owned()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sites_meta() -> EntryMeta {
        EntryMeta::for_kind("federation", "sites")
    }

    #[tokio::test]
    async fn upsert_and_get_round_trip() {
        let store = MemoryStateStore::new();
        let body = json!({"spec": {"name": "edge1", "nested": {"a": 1, "b": [true, null]}}});

        let etag = store
            .upsert(UpsertRequest::new("edge1", body.clone()), &sites_meta())
            .await
            .expect("upsert failed");

        let entry = store.get("edge1", &sites_meta()).await.expect("get failed");
        assert_eq!(entry.body, body);
        assert_eq!(entry.etag, etag);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = MemoryStateStore::new();
        let err = store.get("nope", &sites_meta()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn unchanged_body_keeps_etag() {
        let store = MemoryStateStore::new();
        let body = json!({"spec": {"name": "edge1"}});

        let first = store
            .upsert(UpsertRequest::new("edge1", body.clone()), &sites_meta())
            .await
            .unwrap();
        let second = store
            .upsert(UpsertRequest::new("edge1", body), &sites_meta())
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn changed_body_bumps_etag() {
        let store = MemoryStateStore::new();

        let first = store
            .upsert(UpsertRequest::new("edge1", json!({"v": 1})), &sites_meta())
            .await
            .unwrap();
        let second = store
            .upsert(UpsertRequest::new("edge1", json!({"v": 2})), &sites_meta())
            .await
            .unwrap();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn stale_etag_conflicts() {
        let store = MemoryStateStore::new();

        let etag = store
            .upsert(UpsertRequest::new("edge1", json!({"v": 1})), &sites_meta())
            .await
            .unwrap();
        store
            .upsert(UpsertRequest::new("edge1", json!({"v": 2})), &sites_meta())
            .await
            .unwrap();

        let result = store
            .upsert(
                UpsertRequest::new("edge1", json!({"v": 3})).with_etag(etag),
                &sites_meta(),
            )
            .await;
        assert!(matches!(result, Err(StateError::Conflict { .. })));
    }

    #[tokio::test]
    async fn matching_etag_replaces() {
        let store = MemoryStateStore::new();

        let etag = store
            .upsert(UpsertRequest::new("edge1", json!({"v": 1})), &sites_meta())
            .await
            .unwrap();
        let new_etag = store
            .upsert(
                UpsertRequest::new("edge1", json!({"v": 2})).with_etag(etag),
                &sites_meta(),
            )
            .await
            .expect("guarded upsert failed");

        let entry = store.get("edge1", &sites_meta()).await.unwrap();
        assert_eq!(entry.body, json!({"v": 2}));
        assert_eq!(entry.etag, new_etag);
    }

    #[tokio::test]
    async fn etag_on_missing_entry_conflicts() {
        let store = MemoryStateStore::new();
        let result = store
            .upsert(
                UpsertRequest::new("edge1", json!({})).with_etag("42"),
                &sites_meta(),
            )
            .await;
        assert!(matches!(result, Err(StateError::Conflict { .. })));
    }

    #[tokio::test]
    async fn list_is_scoped_by_kind_and_scope() {
        let store = MemoryStateStore::new();
        let sites = sites_meta();
        let catalogs = EntryMeta::for_kind("federation", "catalogs");
        let scoped = sites_meta().in_scope("tenant-a");

        store
            .upsert(UpsertRequest::new("edge1", json!({})), &sites)
            .await
            .unwrap();
        store
            .upsert(UpsertRequest::new("edge2", json!({})), &sites)
            .await
            .unwrap();
        store
            .upsert(UpsertRequest::new("c1", json!({})), &catalogs)
            .await
            .unwrap();
        store
            .upsert(UpsertRequest::new("edge1", json!({})), &scoped)
            .await
            .unwrap();

        let listed = store.list(&sites).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "edge1");
        assert_eq!(listed[1].id, "edge2");

        assert_eq!(store.list(&catalogs).await.unwrap().len(), 1);
        assert_eq!(store.list(&scoped).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let store = MemoryStateStore::new();
        store
            .upsert(UpsertRequest::new("edge1", json!({})), &sites_meta())
            .await
            .unwrap();

        store.delete("edge1", &sites_meta()).await.expect("delete failed");
        assert!(store.get("edge1", &sites_meta()).await.is_err());

        let err = store.delete("edge1", &sites_meta()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn empty_id_is_rejected() {
        let store = MemoryStateStore::new();
        let result = store
            .upsert(UpsertRequest::new("", json!({})), &sites_meta())
            .await;
        assert!(matches!(result, Err(StateError::BadRequest(_))));
    }

    #[tokio::test]
    async fn empty_resource_is_rejected() {
        let store = MemoryStateStore::new();
        let meta = EntryMeta::for_kind("federation", "");
        let result = store.upsert(UpsertRequest::new("x", json!({})), &meta).await;
        assert!(matches!(result, Err(StateError::BadRequest(_))));
    }
}
