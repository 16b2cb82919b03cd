//! Semantic equality over registry specs.
//!
//! Deployed specs are compared against observed state to decide whether a
//! component needs to be re-applied. Equality is not structural: string
//! values carrying injection tokens compare equal to anything, because the
//! token is filled differently on every site and instance.

use std::collections::HashMap;

use serde_json::Value;

use crate::inject::INJECTION_TOKENS;

/// Memberwise semantic equality.
///
/// Implemented by every spec type that participates in reconciliation
/// comparisons. The multiset helpers ([`slices_equal`], [`slices_cover`],
/// [`slices_any`]) accept any implementor.
pub trait DeepEquals {
    /// True when `self` and `other` are semantically equal.
    fn deep_equals(&self, other: &Self) -> bool;
}

/// True when the string contains any value-injection token.
#[must_use]
pub fn has_injection_token(value: &str) -> bool {
    INJECTION_TOKENS.iter().any(|token| value.contains(token))
}

/// Compare two string values under the injection skip rule: a pair compares
/// equal whenever either side carries an injection token.
#[must_use]
pub fn values_equal(a: &str, b: &str) -> bool {
    a == b || has_injection_token(a) || has_injection_token(b)
}

/// Compare two string maps for equality.
///
/// Values compare under the injection skip rule. A key present on one side
/// only fails the comparison unless it is listed in `ignored_missing_keys`.
#[must_use]
pub fn string_maps_equal(
    a: &HashMap<String, String>,
    b: &HashMap<String, String>,
    ignored_missing_keys: &[&str],
) -> bool {
    for (k, v) in a {
        match b.get(k) {
            Some(bv) => {
                if !values_equal(v, bv) {
                    return false;
                }
            }
            None => {
                if !ignored_missing_keys.contains(&k.as_str()) {
                    return false;
                }
            }
        }
    }
    for (k, v) in b {
        match a.get(k) {
            Some(av) => {
                if !values_equal(v, av) {
                    return false;
                }
            }
            None => {
                if !ignored_missing_keys.contains(&k.as_str()) {
                    return false;
                }
            }
        }
    }
    true
}

/// Compare only the `env.*` entries of two string maps.
///
/// Keys missing from either side are skipped entirely; only values present
/// on both sides are compared, under the injection skip rule.
#[must_use]
pub fn env_maps_equal(a: &HashMap<String, String>, b: &HashMap<String, String>) -> bool {
    for (k, v) in a {
        if k.starts_with("env.") {
            if let Some(bv) = b.get(k) {
                if !values_equal(v, bv) {
                    return false;
                }
            }
        }
    }
    for (k, v) in b {
        if k.starts_with("env.") {
            if let Some(av) = a.get(k) {
                if !values_equal(v, av) {
                    return false;
                }
            }
        }
    }
    true
}

/// Collect the `env.*` entries of a loose properties map as strings.
#[must_use]
pub fn extract_raw_env_from_properties(
    properties: &serde_json::Map<String, Value>,
) -> HashMap<String, String> {
    properties
        .iter()
        .filter(|(k, _)| k.starts_with("env."))
        .map(|(k, v)| (k.clone(), display_value(v)))
        .collect()
}

/// Compare two loose properties maps.
///
/// String values compare under the injection skip rule; every other value
/// compares structurally. Keys must match exactly.
#[must_use]
pub fn properties_equal(
    a: &serde_json::Map<String, Value>,
    b: &serde_json::Map<String, Value>,
) -> bool {
    if a.len() != b.len() {
        return false;
    }
    for (k, v) in a {
        match b.get(k) {
            Some(bv) => match (v, bv) {
                (Value::String(s), Value::String(bs)) => {
                    if !values_equal(s, bs) {
                        return false;
                    }
                }
                _ => {
                    if v != bv {
                        return false;
                    }
                }
            },
            None => return false,
        }
    }
    true
}

/// Multiset equality over [`DeepEquals`] items: every element of `a` must
/// pair with a distinct element of `b`, and the lengths must match.
pub fn slices_equal<K: DeepEquals>(a: &[K], b: &[K]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    for ia in a {
        let mut found = false;
        for (j, jb) in b.iter().enumerate() {
            if !used[j] && ia.deep_equals(jb) {
                used[j] = true;
                found = true;
                break;
            }
        }
        if !found {
            return false;
        }
    }
    true
}

/// True when every element of `src` matches some element of `dest`.
pub fn slices_cover<K: DeepEquals>(src: &[K], dest: &[K]) -> bool {
    src.iter()
        .all(|ia| dest.iter().any(|jb| ia.deep_equals(jb)))
}

/// True when at least one element of `src` matches an element of `dest`.
pub fn slices_any<K: DeepEquals>(src: &[K], dest: &[K]) -> bool {
    src.iter()
        .any(|ia| dest.iter().any(|jb| ia.deep_equals(jb)))
}

/// Property check: when `a` carries `key`, `b` must carry an equal value.
/// A key absent from `a` passes regardless of `b`.
#[must_use]
pub fn check_property(
    a: &HashMap<String, String>,
    b: &HashMap<String, String>,
    key: &str,
    ignore_case: bool,
) -> bool {
    match a.get(key) {
        Some(va) => match b.get(key) {
            Some(vb) => {
                if ignore_case {
                    va.eq_ignore_ascii_case(vb)
                } else {
                    va == vb
                }
            }
            None => false,
        },
        None => true,
    }
}

/// Symmetric property check: equal values, or the key absent on both sides.
#[must_use]
pub fn has_same_property(
    a: &HashMap<String, String>,
    b: &HashMap<String, String>,
    key: &str,
) -> bool {
    match (a.get(key), b.get(key)) {
        (Some(va), Some(vb)) => va == vb,
        (None, None) => true,
        _ => false,
    }
}

/// [`check_property`] over loose properties maps; values are compared by
/// their display form.
#[must_use]
pub fn check_property_loose(
    a: &serde_json::Map<String, Value>,
    b: &serde_json::Map<String, Value>,
    key: &str,
    ignore_case: bool,
) -> bool {
    match a.get(key) {
        Some(va) => match b.get(key) {
            Some(vb) => {
                let (va, vb) = (display_value(va), display_value(vb));
                if ignore_case {
                    va.eq_ignore_ascii_case(&vb)
                } else {
                    va == vb
                }
            }
            None => false,
        },
        None => true,
    }
}

/// [`has_same_property`] over loose properties maps.
#[must_use]
pub fn has_same_property_loose(
    a: &serde_json::Map<String, Value>,
    b: &serde_json::Map<String, Value>,
    key: &str,
) -> bool {
    match (a.get(key), b.get(key)) {
        (Some(va), Some(vb)) => display_value(va) == display_value(vb),
        (None, None) => true,
        _ => false,
    }
}

/// Render a loose value the way a user wrote it: bare string contents,
/// JSON text for everything else.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
