//! Bindings - resolved arguments for one unit invocation
//!
//! `Bindings` holds the ordered name → argument mapping handed to a unit and
//! the mapping a unit hands back. Descriptors resolve independently, in list
//! order; no descriptor sees another's resolved value.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use super::argument::Argument;
use super::schema::resolve_schema;
use crate::descriptor::{Binding, Descriptor};
use crate::error::{DatapackError, Result};
use crate::resource::Resource;
use crate::store::DataStore;

/// Ordered name → argument mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    resolved: IndexMap<String, Argument>,
}

impl Bindings {
    /// Create empty bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every descriptor against the store
    pub async fn from_descriptors(descriptors: &[Descriptor], store: &DataStore) -> Result<Self> {
        let mut bindings = Self::new();
        for descriptor in descriptors {
            let argument = resolve_descriptor(descriptor, store).await?;
            debug!(name = %descriptor.name, kind = argument.kind(), "resolved descriptor");
            bindings.set(descriptor.name.clone(), argument);
        }
        Ok(bindings)
    }

    /// Parse a unit's JSON result object; every entry is a raw value
    pub fn from_json_object(value: Value, unit: &str) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(DatapackError::computation(
                unit,
                format!("expected a JSON object of results, got {}", json_type(&value)),
            ));
        };
        Ok(map
            .into_iter()
            .map(|(name, v)| (name, Argument::Value(v)))
            .collect())
    }

    /// Set a resolved argument
    pub fn set(&mut self, name: impl Into<String>, argument: impl Into<Argument>) {
        self.resolved.insert(name.into(), argument.into());
    }

    /// Get a resolved argument
    pub fn get(&self, name: &str) -> Option<&Argument> {
        self.resolved.get(name)
    }

    /// Take an argument out, keeping the order of the rest
    pub fn remove(&mut self, name: &str) -> Option<Argument> {
        self.resolved.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolved.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.resolved.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Argument)> {
        self.resolved.iter()
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    /// Wire form: one JSON object keyed by argument name
    pub fn to_value(&self) -> Result<Value> {
        let map = self
            .resolved
            .iter()
            .map(|(name, arg)| Ok((name.clone(), arg.to_unit_value()?)))
            .collect::<Result<Map<String, Value>>>()?;
        Ok(Value::Object(map))
    }
}

impl FromIterator<(String, Argument)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (String, Argument)>>(iter: I) -> Self {
        Self {
            resolved: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Bindings {
    type Item = (String, Argument);
    type IntoIter = indexmap::map::IntoIter<String, Argument>;

    fn into_iter(self) -> Self::IntoIter {
        self.resolved.into_iter()
    }
}

async fn resolve_descriptor(descriptor: &Descriptor, store: &DataStore) -> Result<Argument> {
    let (id, metaschema) = match &descriptor.binding {
        Binding::Value(value) => return Ok(Argument::Value(value.clone())),
        Binding::Resource { id, metaschema } => (id, metaschema.as_deref()),
    };

    let resource = store
        .load_resource(id)
        .await?
        .ok_or_else(|| DatapackError::EmptyResource {
            resource: id.clone(),
        })?;

    match resource {
        Resource::Tabular(tabular) => {
            if metaschema.is_none() {
                return Err(DatapackError::MissingMetaschemaReference {
                    resource: id.clone(),
                    descriptor: descriptor.name.clone(),
                });
            }
            let handle = resolve_schema(store, id, tabular, metaschema).await?;
            Ok(Argument::Table(handle))
        }
        Resource::Opaque(record) => Ok(Argument::Record(record)),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
