//! Shallow, top-level key diff between two settings documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::document::Document;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    /// Keys only in `after`, with their new value.
    pub added: Map<String, Value>,
    /// Keys only in `before`, with their old value.
    pub removed: Map<String, Value>,
    /// Keys in both whose values differ, as `{"before": .., "after": ..}`.
    pub changed: Map<String, Value>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Whether applying `after` would drop keys. Destructive saves are gated
    /// on this.
    pub fn has_removals(&self) -> bool {
        !self.removed.is_empty()
    }

    /// All keys touched, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .added
            .keys()
            .chain(self.removed.keys())
            .chain(self.changed.keys())
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

pub fn diff(before: &Document, after: &Document) -> Diff {
    let mut out = Diff::default();
    for (key, old) in before {
        match after.get(key) {
            None => {
                out.removed.insert(key.clone(), old.clone());
            }
            Some(new) if !values_equal(old, new) => {
                out.changed
                    .insert(key.clone(), json!({"before": old, "after": new}));
            }
            Some(_) => {}
        }
    }
    for (key, new) in after {
        if !before.contains_key(key) {
            out.added.insert(key.clone(), new.clone());
        }
    }
    out
}

/// Structural equality. Object key order never matters and numbers compare
/// by value, so `1` equals `1.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => match (x.as_u64(), y.as_u64()) {
                (Some(i), Some(j)) => i == j,
                _ => x.as_f64() == y.as_f64(),
            },
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, x)| ym.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn classifies_keys() {
        let before = doc(json!({"a": 1, "b": {"x": 1}, "c": [1, 2]}));
        let after = doc(json!({"b": {"x": 2}, "c": [1, 2], "d": true}));
        let d = diff(&before, &after);
        assert_eq!(Value::Object(d.added.clone()), json!({"d": true}));
        assert_eq!(Value::Object(d.removed.clone()), json!({"a": 1}));
        assert_eq!(
            Value::Object(d.changed.clone()),
            json!({"b": {"before": {"x": 1}, "after": {"x": 2}}})
        );
        assert!(d.has_removals());
        assert_eq!(d.keys(), vec!["a", "b", "d"]);
    }

    #[test]
    fn self_diff_is_empty() {
        let a = doc(json!({"a": 1, "nested": {"z": [1, {"k": "v"}], "y": null}}));
        assert!(diff(&a, &a).is_empty());
    }

    #[test]
    fn added_and_removed_are_mirrored() {
        let a = doc(json!({"a": 1, "b": 2, "shared": 0}));
        let b = doc(json!({"c": 3, "shared": 1}));
        let ab = diff(&a, &b);
        let ba = diff(&b, &a);
        let keys = |m: &Map<String, Value>| m.keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys(&ab.added), keys(&ba.removed));
        assert_eq!(keys(&ab.removed), keys(&ba.added));
        assert_eq!(keys(&ab.changed), keys(&ba.changed));
    }

    #[test]
    fn numbers_compare_by_value() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(values_equal(&json!({"h": 0, "s": 0}), &json!({"s": 0.0, "h": 0})));
        assert!(!values_equal(&json!(1), &json!(1.5)));
        assert!(!values_equal(&json!([1, 2]), &json!([2, 1])));
        assert!(!values_equal(&json!(-1), &json!(u64::MAX)));
    }

    #[test]
    fn no_op_save_diff_is_empty_ignoring_key_order() {
        let before = doc(json!({"header": {"height": 80, "sticky": true}}));
        let after = doc(json!({"header": {"sticky": true, "height": 80.0}}));
        assert!(diff(&before, &after).is_empty());
    }
}
