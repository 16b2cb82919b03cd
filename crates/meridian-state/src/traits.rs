use async_trait::async_trait;

use crate::error::StateResult;
use crate::types::{EntryMeta, StateEntry, UpsertRequest};

/// Typed CRUD over a slice of the registry.
///
/// Operations are linearisable per `(scope, group, resource, id)`; cross-key
/// operations are not transactional.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch one entry. Fails with `NotFound` when absent.
    async fn get(&self, id: &str, meta: &EntryMeta) -> StateResult<StateEntry>;

    /// List all entries under `(scope, group, resource)`.
    async fn list(&self, meta: &EntryMeta) -> StateResult<Vec<StateEntry>>;

    /// Insert or replace an entry, returning the new etag.
    ///
    /// When the request carries an etag it must match the stored one, else
    /// the call fails with `Conflict`. Upserting a body identical to the
    /// stored body returns the existing etag unchanged.
    async fn upsert(&self, request: UpsertRequest, meta: &EntryMeta) -> StateResult<String>;

    /// Delete an entry. Fails with `NotFound` when absent.
    async fn delete(&self, id: &str, meta: &EntryMeta) -> StateResult<()>;
}
