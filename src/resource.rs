//! Resources, schemas and metaschemas
//!
//! A stored resource is either tabular (profile `tabular-data-resource` or
//! `parameter-tabular-data-resource`) or opaque. Tabular resources carry a
//! schema slot that is either an inline field list or the sentinel string
//! `"metaschema"`, which defers the schema to an external metaschema.
//!
//! The resolved metaschema only ever lives on a [`TabularHandle`]. No
//! persisted type has a slot for it, and any `metaschema` key arriving from
//! storage or from a unit is dropped on conversion.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DatapackError, Result};
use crate::record::KeyOrder;

pub const TABULAR_PROFILE: &str = "tabular-data-resource";
pub const PARAMETER_PROFILE: &str = "parameter-tabular-data-resource";

/// Schema value meaning "derive from the metaschema named by the descriptor"
pub const METASCHEMA_SENTINEL: &str = "metaschema";

/// Key under which the transient metaschema is exposed to units
const METASCHEMA_KEY: &str = "metaschema";

pub fn is_tabular_profile(profile: &str) -> bool {
    profile == TABULAR_PROFILE || profile == PARAMETER_PROFILE
}

/// Field list plus any other schema keys (primaryKey, missingValues, ...)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub fields: Vec<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Schema {
    pub fn field_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter_map(|f| f.get("name").and_then(Value::as_str))
            .collect()
    }
}

/// Where a tabular resource's schema comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SchemaRepr", into = "SchemaRepr")]
pub enum SchemaSlot {
    /// Governed by an external metaschema; persisted as `"metaschema"`
    Metaschema,
    Inline(Schema),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SchemaRepr {
    Sentinel(String),
    Inline(Schema),
}

impl TryFrom<SchemaRepr> for SchemaSlot {
    type Error = String;

    fn try_from(repr: SchemaRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            SchemaRepr::Sentinel(s) if s == METASCHEMA_SENTINEL => Ok(SchemaSlot::Metaschema),
            SchemaRepr::Sentinel(s) => Err(format!(
                "schema must be an object or \"{METASCHEMA_SENTINEL}\", got \"{s}\""
            )),
            SchemaRepr::Inline(schema) => Ok(SchemaSlot::Inline(schema)),
        }
    }
}

impl From<SchemaSlot> for SchemaRepr {
    fn from(slot: SchemaSlot) -> Self {
        match slot {
            SchemaSlot::Metaschema => SchemaRepr::Sentinel(METASCHEMA_SENTINEL.to_string()),
            SchemaSlot::Inline(schema) => SchemaRepr::Inline(schema),
        }
    }
}

/// A stored tabular (or parameter) resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularResource {
    /// name, title, description, ... in authored order
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub profile: String,
    pub schema: SchemaSlot,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(skip)]
    pub key_order: KeyOrder,
}

impl TabularResource {
    /// Concrete working schema, if resolved or inline
    pub fn schema(&self) -> Option<&Schema> {
        match &self.schema {
            SchemaSlot::Inline(schema) => Some(schema),
            SchemaSlot::Metaschema => None,
        }
    }

    pub fn rows(&self) -> &[Value] {
        self.data.as_array().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Record form, keys in authored order
    pub fn to_record(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(self.key_order.apply(map)),
            other => Err(DatapackError::InvalidRecord {
                path: self.profile.clone(),
                details: format!("resource serialized to {other}, not an object"),
            }),
        }
    }
}

/// A stored resource record
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Tabular(TabularResource),
    Opaque(Map<String, Value>),
}

impl Resource {
    /// Convert a raw record; `origin` names it in errors
    pub fn from_value(value: Value, origin: &str) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(DatapackError::InvalidRecord {
                path: origin.to_string(),
                details: "resource is not an object".into(),
            });
        };
        map.retain(|key, _| key != METASCHEMA_KEY);

        let tabular = map
            .get("profile")
            .and_then(Value::as_str)
            .is_some_and(is_tabular_profile);

        if tabular {
            let key_order = KeyOrder::of(&map);
            let mut resource: TabularResource = serde_json::from_value(Value::Object(map))
                .map_err(|e| DatapackError::InvalidRecord {
                    path: origin.to_string(),
                    details: e.to_string(),
                })?;
            resource.key_order = key_order;
            Ok(Resource::Tabular(resource))
        } else {
            Ok(Resource::Opaque(map))
        }
    }

    /// Convert a raw unit result whose stored original holds the sentinel
    ///
    /// The `schema` key is overwritten with `"metaschema"` before parsing,
    /// so a missing, null or concrete schema from the unit never fails the
    /// write and never replaces the sentinel.
    pub fn from_value_with_sentinel(value: Value, origin: &str) -> Result<Self> {
        let value = match value {
            Value::Object(mut map) => {
                map.insert(
                    "schema".into(),
                    Value::String(METASCHEMA_SENTINEL.to_string()),
                );
                Value::Object(map)
            }
            other => other,
        };
        Self::from_value(value, origin)
    }

    /// Persisted form (never contains a metaschema key)
    pub fn to_value(&self) -> Result<Value> {
        match self {
            Resource::Tabular(t) => Ok(Value::Object(t.to_record()?)),
            Resource::Opaque(map) => Ok(Value::Object(map.clone())),
        }
    }

    /// Key order the record was read with
    pub fn key_order(&self) -> KeyOrder {
        match self {
            Resource::Tabular(t) => t.key_order.clone(),
            Resource::Opaque(map) => KeyOrder::of(map),
        }
    }

    /// Lay this record's keys out like `order`
    pub fn adopt_key_order(&mut self, order: KeyOrder) {
        match self {
            Resource::Tabular(t) => t.key_order = order,
            Resource::Opaque(map) => *map = order.apply(std::mem::take(map)),
        }
    }

    pub fn profile(&self) -> Option<&str> {
        match self {
            Resource::Tabular(t) => Some(&t.profile),
            Resource::Opaque(map) => map.get("profile").and_then(Value::as_str),
        }
    }

    /// Whether the stored schema defers to a metaschema
    pub fn has_sentinel_schema(&self) -> bool {
        match self {
            Resource::Tabular(t) => t.schema == SchemaSlot::Metaschema,
            Resource::Opaque(map) => {
                map.get("schema").and_then(Value::as_str) == Some(METASCHEMA_SENTINEL)
            }
        }
    }

    /// Put the sentinel back in place of whatever schema the unit produced
    pub fn restore_sentinel_schema(&mut self) {
        match self {
            Resource::Tabular(t) => t.schema = SchemaSlot::Metaschema,
            Resource::Opaque(map) => {
                map.insert(
                    "schema".into(),
                    Value::String(METASCHEMA_SENTINEL.to_string()),
                );
            }
        }
    }
}

/// A field-definition template that schemas are derived from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metaschema {
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub schema: Schema,
}

/// A resolved tabular resource as handed to a unit
///
/// `metaschema` is the non-persisted companion. [`TabularHandle::into_resource`]
/// is the only way back to a storable type, and it drops the companion.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularHandle {
    pub name: String,
    pub resource: TabularResource,
    pub metaschema: Option<Metaschema>,
}

impl TabularHandle {
    pub fn new(name: impl Into<String>, resource: TabularResource) -> Self {
        Self {
            name: name.into(),
            resource,
            metaschema: None,
        }
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.resource.schema()
    }

    pub fn into_resource(self) -> Resource {
        Resource::Tabular(self.resource)
    }

    /// Wire form for external units: the record plus a `metaschema` key
    pub fn to_unit_value(&self) -> Result<Value> {
        let mut map = self.resource.to_record()?;
        if let Some(metaschema) = &self.metaschema {
            map.insert(
                METASCHEMA_KEY.into(),
                serde_json::to_value(&metaschema.schema)?,
            );
        }
        Ok(Value::Object(map))
    }
}
