//! The settings document: a loosely typed JSON object with three reserved
//! provenance fields owned by the write path.
//!
//! Two write primitives exist and they are deliberately separate:
//! [`merge_patch`] is additive and is the only one the save path uses;
//! [`replace_whole`] can drop keys and is reserved for migrations.

use serde_json::{Map, Value};

use crate::CoreError;

pub type Document = Map<String, Value>;

pub const VERSION_KEY: &str = "version";
pub const UPDATED_AT_KEY: &str = "updatedAt";
pub const UPDATED_BY_KEY: &str = "updatedBy";

pub const RESERVED_KEYS: [&str; 3] = [VERSION_KEY, UPDATED_AT_KEY, UPDATED_BY_KEY];

/// Version counter of a document. Absent or malformed reads as 0.
pub fn version_of(doc: &Document) -> u64 {
    match doc.get(VERSION_KEY) {
        Some(Value::Number(n)) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        _ => None,
    }
    .unwrap_or(0)
}

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Deep-merge `patch` into `target`.
///
/// Keys present in both whose values are both objects are merged recursively.
/// Every other value in `patch`, arrays included, replaces the target value.
/// Keys absent from `patch` are never removed.
pub fn merge_patch(target: &mut Document, patch: &Document) {
    for (key, incoming) in patch {
        match (target.get_mut(key), incoming) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_patch(existing, nested);
            }
            _ => {
                target.insert(key.clone(), incoming.clone());
            }
        }
    }
}

/// Replace `target` with `replacement` wholesale. Returns the top-level keys
/// that existed before and are gone afterwards.
pub fn replace_whole(target: &mut Document, replacement: Document) -> Vec<String> {
    let dropped = target
        .keys()
        .filter(|k| !replacement.contains_key(*k))
        .cloned()
        .collect();
    *target = replacement;
    dropped
}

/// Write the provenance fields of a new revision.
pub fn stamp(doc: &mut Document, version: u64, updated_at: &str, updated_by: &str) {
    doc.insert(VERSION_KEY.into(), Value::from(version));
    stamp_provenance(doc, updated_at, updated_by);
}

/// Write `updatedAt` / `updatedBy` without touching the version counter.
pub fn stamp_provenance(doc: &mut Document, updated_at: &str, updated_by: &str) {
    doc.insert(UPDATED_AT_KEY.into(), Value::from(updated_at));
    doc.insert(UPDATED_BY_KEY.into(), Value::from(updated_by));
}

/// Copy of `doc` without the reserved fields.
pub fn without_reserved(doc: &Document) -> Document {
    doc.iter()
        .filter(|(k, _)| !is_reserved(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Look up a nested value by key path.
pub fn get_path<'a>(doc: &'a Document, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = doc.get(*first)?;
    for key in rest {
        current = current.as_object()?.get(*key)?;
    }
    Some(current)
}

/// Insert a value at a nested key path, creating intermediate objects.
/// A non-object value in the way is replaced by an object.
pub fn set_path(doc: &mut Document, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = doc;
    for key in parents {
        let slot = current
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => return,
        };
    }
    current.insert((*last).to_string(), value);
}

pub fn to_msgpack(doc: &Document) -> Result<Vec<u8>, CoreError> {
    rmp_serde::to_vec(doc).map_err(|e| CoreError::Serialization(e.to_string()))
}

pub fn from_msgpack(bytes: &[u8]) -> Result<Document, CoreError> {
    rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
}

/// Byte length of the JSON serialization of `doc`.
pub fn json_size(doc: &Document) -> Result<u64, CoreError> {
    Ok(serde_json::to_vec(doc)?.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn merge_recurses_into_objects() {
        let mut target = doc(json!({"header": {"height": 80, "sticky": true}, "title": "Acme"}));
        merge_patch(&mut target, &doc(json!({"header": {"height": 96}})));
        assert_eq!(
            Value::Object(target),
            json!({"header": {"height": 96, "sticky": true}, "title": "Acme"})
        );
    }

    #[test]
    fn merge_replaces_arrays() {
        let mut target = doc(json!({"nav": [{"label": "A"}, {"label": "B"}]}));
        merge_patch(&mut target, &doc(json!({"nav": [{"label": "C"}]})));
        assert_eq!(target["nav"], json!([{"label": "C"}]));
    }

    #[test]
    fn merge_replaces_scalar_with_object_and_back() {
        let mut target = doc(json!({"a": 1, "b": {"x": 1}}));
        merge_patch(&mut target, &doc(json!({"a": {"y": 2}, "b": 3})));
        assert_eq!(Value::Object(target), json!({"a": {"y": 2}, "b": 3}));
    }

    #[test]
    fn merge_never_removes_keys() {
        let mut target = doc(json!({"keep": true, "header": {"logo": {"url": "/a.svg"}}}));
        merge_patch(&mut target, &doc(json!({"header": {}})));
        assert_eq!(target["keep"], json!(true));
        assert_eq!(target["header"]["logo"]["url"], json!("/a.svg"));
    }

    #[test]
    fn replace_whole_reports_dropped_keys() {
        let mut target = doc(json!({"a": 1, "b": 2}));
        let dropped = replace_whole(&mut target, doc(json!({"b": 3, "c": 4})));
        assert_eq!(dropped, vec!["a".to_string()]);
        assert_eq!(Value::Object(target), json!({"b": 3, "c": 4}));
    }

    #[test]
    fn version_defaults_to_zero() {
        assert_eq!(version_of(&doc(json!({}))), 0);
        assert_eq!(version_of(&doc(json!({"version": "7"}))), 0);
        assert_eq!(version_of(&doc(json!({"version": 7}))), 7);
        assert_eq!(version_of(&doc(json!({"version": 7.0}))), 7);
    }

    #[test]
    fn stamp_sets_provenance() {
        let mut d = doc(json!({"title": "Acme"}));
        stamp(&mut d, 4, "2024-05-01T10:00:00.000Z", "alice");
        assert_eq!(d["version"], json!(4));
        assert_eq!(d["updatedAt"], json!("2024-05-01T10:00:00.000Z"));
        assert_eq!(d["updatedBy"], json!("alice"));
    }

    #[test]
    fn set_path_creates_parents() {
        let mut d = doc(json!({"header": 5}));
        set_path(&mut d, &["header", "border", "width"], json!(2));
        assert_eq!(get_path(&d, &["header", "border", "width"]), Some(&json!(2)));
    }

    #[test]
    fn msgpack_roundtrip_preserves_numbers() {
        let d = doc(json!({"a": 1, "b": 1.5, "c": [true, null, "x"], "d": {"e": -3}}));
        let bytes = to_msgpack(&d).unwrap();
        assert_eq!(from_msgpack(&bytes).unwrap(), d);
    }
}
