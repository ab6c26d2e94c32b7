//! Authored key order of JSON records
//!
//! Typed models rebuild a record field by field when it is written back.
//! [`KeyOrder`] remembers the order the keys were read in, so the rewritten
//! record lists them the same way. Keys the record did not have before are
//! placed after the known ones, in the order they were produced.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyOrder(Vec<String>);

impl KeyOrder {
    /// Capture the order of `map`'s keys
    pub fn of(map: &Map<String, Value>) -> Self {
        Self(map.keys().cloned().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reorder `map` to match the captured order
    pub fn apply(&self, map: Map<String, Value>) -> Map<String, Value> {
        if self.0.is_empty() {
            return map;
        }
        let rank = |key: &str| {
            self.0
                .iter()
                .position(|known| known == key)
                .unwrap_or(self.0.len())
        };
        let mut entries: Vec<(String, Value)> = map.into_iter().collect();
        // Stable: unknown keys keep their relative order
        entries.sort_by_key(|(key, _)| rank(key));
        entries.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn keys(map: &Map<String, Value>) -> Vec<&str> {
        map.keys().map(String::as_str).collect()
    }

    #[test]
    fn restores_authored_order() {
        let order = KeyOrder::of(&object(json!({"profile": 1, "schema": 2, "data": 3, "title": 4})));
        let rebuilt = object(json!({"title": 4, "profile": 1, "schema": 2, "data": 3}));
        assert_eq!(keys(&order.apply(rebuilt)), vec!["profile", "schema", "data", "title"]);
    }

    #[test]
    fn new_keys_follow_known_ones() {
        let order = KeyOrder::of(&object(json!({"name": 1, "data": 2})));
        let rebuilt = object(json!({"algorithm": 0, "data": 2, "container": 0, "name": 1}));
        assert_eq!(keys(&order.apply(rebuilt)), vec!["name", "data", "algorithm", "container"]);
    }

    #[test]
    fn empty_order_is_identity() {
        let rebuilt = object(json!({"b": 1, "a": 2}));
        assert_eq!(keys(&KeyOrder::default().apply(rebuilt)), vec!["b", "a"]);
    }
}
