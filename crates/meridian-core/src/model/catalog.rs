//! Catalog resource: a typed declarative document in the registry.
//!
//! Catalogs form a DAG per site through `parent_name`. A catalog of type
//! `edge` whose metadata carries `from`/`to` entries describes a graph edge;
//! every other catalog is a node.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::compare::DeepEquals;
use crate::model::Properties;

/// Catalog type marking a graph edge.
pub const EDGE_CATALOG_TYPE: &str = "edge";

/// Reference to an object in another registry slice (or another site).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    /// Owning site.
    pub site_id: String,
    /// Object name.
    pub name: String,
    /// API group.
    pub group: String,
    /// API version.
    pub version: String,
    /// Object kind.
    pub kind: String,
    /// Namespace scope.
    #[serde(default)]
    pub scope: String,
    /// Optional address hint for reaching the object.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
    /// Observed generation of the referenced object.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub generation: String,
    /// Free-form reference metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Desired state of a catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSpec {
    /// Site the catalog originates from.
    pub site_id: String,
    /// Catalog name, unique per site.
    pub name: String,
    /// Catalog type, e.g. `config`, `asset`, or [`EDGE_CATALOG_TYPE`].
    #[serde(rename = "type")]
    pub catalog_type: String,
    /// Loose document body.
    #[serde(default)]
    pub properties: Properties,
    /// String metadata; `from`/`to` entries describe edges.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    /// Parent catalog name within the same site.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    /// Optional reference to a registry object this catalog mirrors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_ref: Option<ObjectRef>,
    /// Writer-assigned generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
}

/// Control-plane-written catalog status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogStatus {
    /// Status properties.
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

/// A catalog as read back from the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogState {
    /// Catalog identifier.
    pub id: String,
    /// Desired state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<CatalogSpec>,
    /// Reported state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CatalogStatus>,
}

impl CatalogState {
    /// Parent catalog name, empty when the catalog is a root.
    #[must_use]
    pub fn parent(&self) -> &str {
        self.spec
            .as_ref()
            .and_then(|s| s.parent_name.as_deref())
            .unwrap_or("")
    }

    /// Catalog type.
    #[must_use]
    pub fn catalog_type(&self) -> &str {
        self.spec.as_ref().map_or("", |s| s.catalog_type.as_str())
    }

    /// Document body, empty when the spec is missing.
    #[must_use]
    pub fn properties(&self) -> Properties {
        self.spec
            .as_ref()
            .map(|s| s.properties.clone())
            .unwrap_or_default()
    }

    /// Edge source node; empty for non-edge catalogs.
    #[must_use]
    pub fn from(&self) -> &str {
        self.edge_endpoint("from")
    }

    /// Edge destination node; empty for non-edge catalogs.
    #[must_use]
    pub fn to(&self) -> &str {
        self.edge_endpoint("to")
    }

    fn edge_endpoint(&self, key: &str) -> &str {
        match &self.spec {
            Some(spec) if spec.catalog_type == EDGE_CATALOG_TYPE => {
                spec.metadata.get(key).map_or("", String::as_str)
            }
            _ => "",
        }
    }
}

impl DeepEquals for CatalogSpec {
    fn deep_equals(&self, other: &Self) -> bool {
        self.site_id == other.site_id
            && self.name == other.name
            && self.parent_name == other.parent_name
            && self.generation == other.generation
            && self.properties == other.properties
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn edge(from: &str, to: &str) -> CatalogState {
        CatalogState {
            id: format!("{from}-{to}"),
            spec: Some(CatalogSpec {
                site_id: "hq".to_owned(),
                name: format!("{from}-{to}"),
                catalog_type: EDGE_CATALOG_TYPE.to_owned(),
                metadata: [
                    ("from".to_owned(), from.to_owned()),
                    ("to".to_owned(), to.to_owned()),
                ]
                .into_iter()
                .collect(),
                ..CatalogSpec::default()
            }),
            status: None,
        }
    }

    #[test]
    fn edge_accessors() {
        let e = edge("a", "b");
        assert_eq!(e.from(), "a");
        assert_eq!(e.to(), "b");
        assert_eq!(e.catalog_type(), "edge");
    }

    #[test]
    fn non_edge_has_no_endpoints() {
        let mut node = edge("a", "b");
        node.spec.as_mut().unwrap().catalog_type = "config".to_owned();
        assert_eq!(node.from(), "");
        assert_eq!(node.to(), "");
    }

    #[test]
    fn missing_spec_reads_empty() {
        let state = CatalogState {
            id: "c1".to_owned(),
            spec: None,
            status: None,
        };
        assert_eq!(state.parent(), "");
        assert_eq!(state.catalog_type(), "");
        assert!(state.properties().is_empty());
    }

    #[test]
    fn deep_equals_compares_identity_and_body() {
        let a = CatalogSpec {
            site_id: "hq".to_owned(),
            name: "c1".to_owned(),
            catalog_type: "config".to_owned(),
            properties: json!({"k": {"nested": true}}).as_object().unwrap().clone(),
            ..CatalogSpec::default()
        };
        let mut b = a.clone();
        assert!(a.deep_equals(&b));

        b.properties = json!({"k": {"nested": false}}).as_object().unwrap().clone();
        assert!(!a.deep_equals(&b));

        let mut c = a.clone();
        c.parent_name = Some("root".to_owned());
        assert!(!a.deep_equals(&c));
    }

    #[test]
    fn spec_serialises_camel_case() {
        let spec = CatalogSpec {
            site_id: "hq".to_owned(),
            name: "c1".to_owned(),
            catalog_type: "config".to_owned(),
            parent_name: Some("root".to_owned()),
            ..CatalogSpec::default()
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["siteId"], json!("hq"));
        assert_eq!(value["type"], json!("config"));
        assert_eq!(value["parentName"], json!("root"));
    }
}
