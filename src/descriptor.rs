//! Variable descriptors and their container
//!
//! A descriptor binds one argument name to either a literal value or a
//! resource reference:
//!
//! ```json
//! { "name": "k", "value": 3 }
//! { "name": "points", "resource": "points", "metaschema": "xy" }
//! ```
//!
//! Shape is enforced once, when the record is parsed. Everything after that
//! works with [`Binding`] and never re-checks keys.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::{DatapackError, Result};
use crate::record::KeyOrder;

/// What a descriptor binds its name to
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Literal of any JSON type (including null)
    Value(Value),
    /// Reference to a stored resource, plus the metaschema to resolve it under
    Resource {
        id: String,
        metaschema: Option<String>,
    },
}

/// One named entry in an argument list
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub name: String,
    pub binding: Binding,
    /// Authoring keys (title, description, type, ...) carried through untouched
    pub extra: Map<String, Value>,
    key_order: KeyOrder,
}

impl Descriptor {
    pub fn value(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            binding: Binding::Value(value),
            extra: Map::new(),
            key_order: KeyOrder::default(),
        }
    }

    pub fn resource(name: impl Into<String>, id: impl Into<String>, metaschema: Option<&str>) -> Self {
        Self {
            name: name.into(),
            binding: Binding::Resource {
                id: id.into(),
                metaschema: metaschema.map(str::to_string),
            },
            extra: Map::new(),
            key_order: KeyOrder::default(),
        }
    }

    /// Parse a descriptor record, failing on anything but exactly one kind
    pub fn from_record(record: Value) -> Result<Self> {
        let Value::Object(mut map) = record else {
            return Err(malformed("<unnamed>", "descriptor is not an object"));
        };
        let key_order = KeyOrder::of(&map);

        let name = match map.get("name") {
            Some(Value::String(name)) => name.clone(),
            _ => return Err(malformed("<unnamed>", "missing string 'name'")),
        };

        let binding = match (map.get("value"), map.get("resource")) {
            (Some(value), None) => Binding::Value(value.clone()),
            (None, Some(Value::String(id))) => {
                let metaschema = match map.get("metaschema") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(m)) => Some(m.clone()),
                    Some(_) => return Err(malformed(&name, "'metaschema' must be a string")),
                };
                Binding::Resource {
                    id: id.clone(),
                    metaschema,
                }
            }
            (None, Some(_)) => return Err(malformed(&name, "'resource' must be a string")),
            (Some(_), Some(_)) => {
                return Err(malformed(&name, "carries both 'value' and 'resource'"))
            }
            (None, None) => {
                return Err(malformed(&name, "carries neither 'value' nor 'resource'"))
            }
        };

        // A value descriptor keeps any `metaschema` key as an authoring key
        let bound: &[&str] = match binding {
            Binding::Value(_) => &["name", "value"],
            Binding::Resource { .. } => &["name", "resource", "metaschema"],
        };
        map.retain(|key, _| !bound.contains(&key.as_str()));

        Ok(Self {
            name,
            binding,
            extra: map,
            key_order,
        })
    }

    /// Persisted form, keys in authored order
    pub fn to_record(&self) -> Value {
        let mut map = Map::new();
        map.insert("name".into(), Value::String(self.name.clone()));
        match &self.binding {
            Binding::Value(value) => {
                map.insert("value".into(), value.clone());
            }
            Binding::Resource { id, metaschema } => {
                map.insert("resource".into(), Value::String(id.clone()));
                if let Some(m) = metaschema {
                    map.insert("metaschema".into(), Value::String(m.clone()));
                }
            }
        }
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(self.key_order.apply(map))
    }

    pub fn is_value(&self) -> bool {
        matches!(self.binding, Binding::Value(_))
    }

    /// Literal, if this is a value descriptor
    pub fn literal(&self) -> Option<&Value> {
        match &self.binding {
            Binding::Value(v) => Some(v),
            Binding::Resource { .. } => None,
        }
    }
}

fn malformed(name: &str, reason: &str) -> DatapackError {
    DatapackError::MalformedDescriptor {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Descriptor container: an ordered argument list plus execution metadata
///
/// Top-level keys, `data` included, keep their authored positions;
/// `algorithm` and `container` live among them.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSet {
    pub data: Vec<Descriptor>,
    meta: Map<String, Value>,
}

impl ArgumentSet {
    pub fn new(data: Vec<Descriptor>) -> Self {
        Self {
            data,
            meta: Map::new(),
        }
    }

    /// Parse and validate a container record
    ///
    /// `origin` names the record in errors. Every descriptor is checked and
    /// names must be unique, so a bad container fails before any side effect.
    pub fn from_record(record: Value, origin: &str) -> Result<Self> {
        let Value::Object(mut meta) = record else {
            return Err(DatapackError::InvalidRecord {
                path: origin.to_string(),
                details: "arguments record is not an object".into(),
            });
        };

        // `data` stays in `meta` as a placeholder holding its position
        let entries = match meta.get_mut("data").map(Value::take) {
            Some(Value::Array(entries)) => entries,
            None => Vec::new(),
            Some(_) => {
                return Err(DatapackError::InvalidRecord {
                    path: origin.to_string(),
                    details: "'data' must be an array of descriptors".into(),
                })
            }
        };

        let mut seen = HashSet::new();
        let mut data = Vec::with_capacity(entries.len());
        for entry in entries {
            let descriptor = Descriptor::from_record(entry)?;
            if !seen.insert(descriptor.name.clone()) {
                return Err(DatapackError::DuplicateDescriptor {
                    name: descriptor.name,
                    container: origin.to_string(),
                });
            }
            data.push(descriptor);
        }

        Ok(Self { data, meta })
    }

    pub fn to_record(&self) -> Value {
        let mut map = self.meta.clone();
        map.insert(
            "data".into(),
            Value::Array(self.data.iter().map(Descriptor::to_record).collect()),
        );
        Value::Object(map)
    }

    pub fn get(&self, name: &str) -> Option<&Descriptor> {
        self.data.iter().find(|d| d.name == name)
    }

    pub fn algorithm(&self) -> Option<&str> {
        self.meta.get("algorithm").and_then(Value::as_str)
    }

    pub fn container(&self) -> Option<&str> {
        self.meta.get("container").and_then(Value::as_str)
    }

    /// Refresh execution metadata from the invocation's identifiers
    pub fn set_metadata(&mut self, algorithm: &str, container: Option<&str>) {
        self.meta
            .insert("algorithm".into(), Value::String(algorithm.to_string()));
        match container {
            Some(c) => {
                self.meta
                    .insert("container".into(), Value::String(c.to_string()));
            }
            None => {
                self.meta.insert("container".into(), Value::Null);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_value_descriptor() {
        let d = Descriptor::from_record(json!({"name": "k", "value": 3, "title": "K"})).unwrap();
        assert_eq!(d.binding, Binding::Value(json!(3)));
        assert_eq!(d.extra["title"], "K");
    }

    #[test]
    fn null_value_is_still_a_value() {
        let d = Descriptor::from_record(json!({"name": "k", "value": null})).unwrap();
        assert_eq!(d.literal(), Some(&Value::Null));
    }

    #[test]
    fn parses_resource_descriptor() {
        let d = Descriptor::from_record(json!({
            "name": "data",
            "resource": "points",
            "metaschema": "xy"
        }))
        .unwrap();
        assert_eq!(
            d.binding,
            Binding::Resource {
                id: "points".into(),
                metaschema: Some("xy".into())
            }
        );
    }

    #[test]
    fn rejects_neither_kind() {
        let err = Descriptor::from_record(json!({"name": "k"})).unwrap_err();
        assert!(matches!(err, DatapackError::MalformedDescriptor { ref name, .. } if name == "k"));
        assert!(err.to_string().contains("neither"));
    }

    #[test]
    fn rejects_both_kinds() {
        let err =
            Descriptor::from_record(json!({"name": "k", "value": 1, "resource": "r"})).unwrap_err();
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn rejects_missing_name() {
        let err = Descriptor::from_record(json!({"value": 1})).unwrap_err();
        assert!(matches!(err, DatapackError::MalformedDescriptor { .. }));
    }

    fn keys(value: &Value) -> Vec<&str> {
        value.as_object().unwrap().keys().map(String::as_str).collect()
    }

    #[test]
    fn record_keeps_authoring_keys() {
        let record = json!({"name": "k", "value": 3, "description": "slope"});
        let d = Descriptor::from_record(record.clone()).unwrap();
        assert_eq!(d.to_record(), record);
    }

    #[test]
    fn record_keeps_authored_key_order() {
        let record = json!({"title": "K", "value": 3, "name": "k", "type": "number"});
        let d = Descriptor::from_record(record).unwrap();
        assert_eq!(keys(&d.to_record()), vec!["title", "value", "name", "type"]);

        let record = json!({"metaschema": "xy", "name": "points", "resource": "R"});
        let d = Descriptor::from_record(record).unwrap();
        assert_eq!(keys(&d.to_record()), vec!["metaschema", "name", "resource"]);
    }

    #[test]
    fn value_descriptor_keeps_metaschema_key() {
        let record = json!({"name": "k", "value": 3, "metaschema": "xy"});
        let d = Descriptor::from_record(record.clone()).unwrap();
        assert_eq!(d.binding, Binding::Value(json!(3)));
        assert_eq!(d.extra["metaschema"], "xy");
        assert_eq!(d.to_record(), record);
    }

    #[test]
    fn container_keeps_top_level_order() {
        let record = json!({"name": "default", "data": [], "title": "Fit", "algorithm": "old"});
        let mut args = ArgumentSet::from_record(record, "fit.default").unwrap();
        args.set_metadata("fit", Some("local"));
        assert_eq!(
            keys(&args.to_record()),
            vec!["name", "data", "title", "algorithm", "container"]
        );
    }

    #[test]
    fn container_rejects_duplicate_names() {
        let record = json!({"data": [
            {"name": "k", "value": 1},
            {"name": "k", "value": 2}
        ]});
        let err = ArgumentSet::from_record(record, "fit.default").unwrap_err();
        assert!(matches!(err, DatapackError::DuplicateDescriptor { .. }));
    }

    #[test]
    fn container_rejects_any_malformed_entry() {
        let record = json!({"data": [
            {"name": "ok", "value": 1},
            {"name": "bad"}
        ]});
        assert!(ArgumentSet::from_record(record, "fit.default").is_err());
    }

    #[test]
    fn container_metadata_refresh() {
        let record = json!({"name": "default", "algorithm": "old", "data": []});
        let mut args = ArgumentSet::from_record(record, "fit.default").unwrap();
        assert_eq!(args.algorithm(), Some("old"));

        args.set_metadata("fit", Some("python-base"));
        let out = args.to_record();
        assert_eq!(out["algorithm"], "fit");
        assert_eq!(out["container"], "python-base");
        assert_eq!(out["name"], "default");
        assert!(out["data"].as_array().unwrap().is_empty());
    }
}
