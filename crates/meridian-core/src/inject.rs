//! Value injection.
//!
//! Registry documents may reference the identity of the instance, solution,
//! target, or activation they are evaluated under through the literal tokens
//! `$instance()`, `$solution()`, `$target()`, `$activation()`. Tokens are
//! resolved by string substitution at read time.

use std::collections::HashMap;

use serde_json::Value;

use crate::compare::display_value;

/// The literal injection tokens, in resolution order.
pub const INJECTION_TOKENS: [&str; 4] =
    ["$instance()", "$solution()", "$target()", "$activation()"];

/// Identities substituted for the injection tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueInjections {
    /// Replaces `$instance()`.
    pub instance_id: String,
    /// Replaces `$solution()`.
    pub solution_id: String,
    /// Replaces `$target()`.
    pub target_id: String,
    /// Replaces `$activation()`.
    pub activation_id: String,
}

/// Replace every injection token in `value` with the corresponding id.
///
/// With no injections supplied the value passes through untouched. This is a
/// plain string substitution, not a parser: a literal `$instance()` in user
/// content cannot be escaped today.
#[must_use]
pub fn resolve_string(value: &str, injections: Option<&ValueInjections>) -> String {
    match injections {
        Some(inj) => value
            .replace("$instance()", &inj.instance_id)
            .replace("$solution()", &inj.solution_id)
            .replace("$target()", &inj.target_id)
            .replace("$activation()", &inj.activation_id),
        None => value.to_owned(),
    }
}

/// Read a string-map property, resolving injection tokens. Missing keys
/// read as empty.
#[must_use]
pub fn read_property(
    properties: &HashMap<String, String>,
    key: &str,
    injections: Option<&ValueInjections>,
) -> String {
    properties
        .get(key)
        .map(|v| resolve_string(v, injections))
        .unwrap_or_default()
}

/// Read a loose property by display form, resolving injection tokens.
#[must_use]
pub fn read_property_loose(
    properties: &serde_json::Map<String, Value>,
    key: &str,
    injections: Option<&ValueInjections>,
) -> String {
    properties
        .get(key)
        .map(|v| resolve_string(&display_value(v), injections))
        .unwrap_or_default()
}

/// Collect the string properties under `prefix`, stripping the prefix and
/// resolving injection tokens in the values.
#[must_use]
pub fn collect_properties_with_prefix(
    properties: &serde_json::Map<String, Value>,
    prefix: &str,
    injections: Option<&ValueInjections>,
) -> serde_json::Map<String, Value> {
    let mut ret = serde_json::Map::new();
    for (k, v) in properties {
        if let (Some(key), Value::String(s)) = (k.strip_prefix(prefix), v) {
            ret.insert(
                key.to_owned(),
                Value::String(resolve_string(s, injections)),
            );
        }
    }
    ret
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn injections() -> ValueInjections {
        ValueInjections {
            instance_id: "i1".to_owned(),
            solution_id: "s1".to_owned(),
            target_id: "t1".to_owned(),
            activation_id: "a1".to_owned(),
        }
    }

    #[test]
    fn resolves_all_tokens() {
        let resolved = resolve_string(
            "$instance()/$solution()/$target()/$activation()",
            Some(&injections()),
        );
        assert_eq!(resolved, "i1/s1/t1/a1");
    }

    #[test]
    fn no_injections_passes_through() {
        assert_eq!(
            resolve_string("http://$instance()/x", None),
            "http://$instance()/x"
        );
    }

    #[test]
    fn absent_id_resolves_to_empty() {
        let inj = ValueInjections {
            instance_id: "i1".to_owned(),
            ..ValueInjections::default()
        };
        assert_eq!(
            resolve_string("http://$instance()$target()/x", Some(&inj)),
            "http://i1/x"
        );
    }

    #[test]
    fn read_property_resolves() {
        let props = json!({"url": "http://$target()/api", "n": 2});
        assert_eq!(
            read_property_loose(props.as_object().unwrap(), "url", Some(&injections())),
            "http://t1/api"
        );
        assert_eq!(
            read_property_loose(props.as_object().unwrap(), "missing", None),
            ""
        );
    }

    #[test]
    fn collect_with_prefix_strips_and_resolves() {
        let props = json!({
            "helm.chart": "nginx",
            "helm.values.host": "$instance().local",
            "image": "v1"
        });
        let collected = collect_properties_with_prefix(
            props.as_object().unwrap(),
            "helm.",
            Some(&injections()),
        );
        assert_eq!(collected.len(), 2);
        assert_eq!(collected["chart"], json!("nginx"));
        assert_eq!(collected["values.host"], json!("i1.local"));
    }
}
