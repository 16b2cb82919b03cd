//! Core types for meridian-state.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resource coordinates scoping a store operation.
///
/// The tuple `(scope, group, resource, id)` uniquely addresses an entry. An
/// empty `scope` means the `default` namespace. `template` is an opaque
/// string a backend may use to render a canonical envelope; the in-memory
/// backend ignores it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    /// Namespace scope; empty means default.
    #[serde(default)]
    pub scope: String,
    /// API group, e.g. `federation`.
    pub group: String,
    /// API version, e.g. `v1`.
    pub version: String,
    /// Resource plural, e.g. `sites`.
    pub resource: String,
    /// Optional envelope template for the backing driver.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl EntryMeta {
    /// Metadata for a resource kind at version `v1` in the default scope.
    #[must_use]
    pub fn for_kind(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            scope: String::new(),
            group: group.into(),
            version: "v1".to_owned(),
            resource: resource.into(),
            template: None,
        }
    }

    /// Same coordinates in an explicit scope.
    #[must_use]
    pub fn in_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Attach an envelope template.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }
}

/// A stored entry: identifier, opaque body, concurrency tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEntry {
    /// Entry identifier, unique within `(scope, group, resource)`.
    pub id: String,
    /// Opaque JSON body. Nested maps are preserved verbatim.
    pub body: Value,
    /// Opaque optimistic-concurrency tag.
    pub etag: String,
}

/// An upsert payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertRequest {
    /// Entry identifier.
    pub id: String,
    /// New body.
    pub body: Value,
    /// Expected etag; `None` skips the concurrency check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl UpsertRequest {
    /// Create an upsert without a concurrency check.
    #[must_use]
    pub fn new(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            body,
            etag: None,
        }
    }

    /// Require the stored etag to match before replacing.
    #[must_use]
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }
}
