//! Descriptive key/value attributes
//!
//! Captured from non-upload data associations on the platform. Insertion
//! order is preserved so that rendering is stable.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered attribute map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(IndexMap<String, Value>);

impl Attributes {
    /// Create empty attribute map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Set a single attribute
    ///
    /// Empty values (`null`, `false`, `""`, `[]`, `{}`, `0`) are skipped,
    /// matching how the platform marks an association as unset.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        if is_set(&value) {
            self.0.insert(key.into(), value);
        }
    }

    /// Merge every key of a JSON object
    ///
    /// Non-object values are ignored.
    pub fn merge_object(&mut self, object: &Value) {
        if let Value::Object(map) = object {
            for (key, value) in map {
                self.insert(key.clone(), value.clone());
            }
        }
    }

    /// Merge another attribute map, overriding existing keys
    pub fn extend(&mut self, other: &Attributes) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Get attribute value
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Check whether key is present
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Remove attribute, returning its value
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Number of attributes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no attributes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_map_has_nothing() {
        let attrs = Attributes::new();
        assert!(attrs.is_empty());
        assert!(!attrs.contains("key"));
        assert!(attrs.get("key").is_none());
    }

    #[test]
    fn insert_and_get() {
        let mut attrs = Attributes::new();
        attrs.insert("key", json!("blah"));
        assert!(attrs.contains("key"));
        assert_eq!(attrs.get("key"), Some(&json!("blah")));
    }

    #[test]
    fn unset_values_are_skipped() {
        let mut attrs = Attributes::new();
        attrs.insert("null", json!(null));
        attrs.insert("false", json!(false));
        attrs.insert("empty", json!(""));
        attrs.insert("zero", json!(0));
        assert!(attrs.is_empty());
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut attrs = Attributes::new();
        attrs.insert("b", json!(1));
        attrs.insert("a", json!(2));
        attrs.merge_object(&json!({"c": 3}));
        let keys: Vec<_> = attrs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn equal_maps_compare_equal() {
        let mut a = Attributes::new();
        let mut b = Attributes::new();
        a.insert("key", json!("blah"));
        b.insert("key", json!("blah"));
        assert_eq!(a, b);
    }
}
