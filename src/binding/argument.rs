//! A single resolved argument or unit result

use serde_json::{Map, Value};

use crate::error::Result;
use crate::resource::{Resource, TabularHandle};

/// Resolved value bound to one argument name
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// Literal from a value descriptor (or any raw JSON from a unit)
    Value(Value),
    /// Tabular resource with its resolved schema and metaschema companion
    Table(TabularHandle),
    /// Non-tabular resource, passed through as stored
    Record(Map<String, Value>),
}

impl Argument {
    /// Short tag for logs and events
    pub fn kind(&self) -> &'static str {
        match self {
            Argument::Value(_) => "value",
            Argument::Table(_) => "table",
            Argument::Record(_) => "record",
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Argument::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TabularHandle> {
        match self {
            Argument::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Wire form sent to external units
    pub fn to_unit_value(&self) -> Result<Value> {
        match self {
            Argument::Value(v) => Ok(v.clone()),
            Argument::Table(t) => t.to_unit_value(),
            Argument::Record(map) => Ok(Value::Object(map.clone())),
        }
    }

    /// Literal to store in a value descriptor
    ///
    /// A table lands in its persisted form, so the companion never leaks.
    pub fn into_literal(self) -> Result<Value> {
        match self {
            Argument::Value(v) => Ok(v),
            Argument::Table(t) => t.into_resource().to_value(),
            Argument::Record(map) => Ok(Value::Object(map)),
        }
    }

    /// Persisted form of a result bound to a resource descriptor
    ///
    /// With `sentinel` set, the schema is forced to `"metaschema"` whatever
    /// the unit returned in its place.
    pub fn into_resource(self, origin: &str, sentinel: bool) -> Result<Resource> {
        let raw = match self {
            Argument::Table(t) => {
                let mut resource = t.into_resource();
                if sentinel {
                    resource.restore_sentinel_schema();
                }
                return Ok(resource);
            }
            Argument::Record(map) => Value::Object(map),
            Argument::Value(v) => v,
        };
        if sentinel {
            Resource::from_value_with_sentinel(raw, origin)
        } else {
            Resource::from_value(raw, origin)
        }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

impl From<TabularHandle> for Argument {
    fn from(handle: TabularHandle) -> Self {
        Argument::Table(handle)
    }
}
