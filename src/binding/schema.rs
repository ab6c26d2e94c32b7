//! Schema resolution for tabular resources
//!
//! The metaschema reference comes from the descriptor (or view), never from
//! the resource, so one resource can be read under different metaschemas.

use tracing::debug;

use crate::error::{DatapackError, Result};
use crate::resource::{Metaschema, Schema, SchemaSlot, TabularHandle, TabularResource};
use crate::store::DataStore;

/// Template-only field attribute
const INDEX_ATTRIBUTE: &str = "index";

/// Copy the metaschema's schema and strip `index` from every field
pub fn derive_schema(metaschema: &Metaschema) -> Schema {
    let mut schema = metaschema.schema.clone();
    for field in &mut schema.fields {
        field.remove(INDEX_ATTRIBUTE);
    }
    schema
}

/// Attach a loaded metaschema to a resource
///
/// A sentinel schema is replaced in memory by the derived one; an inline
/// schema is kept. Either way the metaschema rides along as the companion.
pub fn attach_metaschema(
    name: &str,
    mut resource: TabularResource,
    metaschema: Metaschema,
) -> TabularHandle {
    if resource.schema == SchemaSlot::Metaschema {
        resource.schema = SchemaSlot::Inline(derive_schema(&metaschema));
    }
    TabularHandle {
        name: name.to_string(),
        resource,
        metaschema: Some(metaschema),
    }
}

/// Load the referenced metaschema and build the tabular handle
///
/// With no reference the resource is handed over exactly as stored.
pub async fn resolve_schema(
    store: &DataStore,
    name: &str,
    resource: TabularResource,
    metaschema: Option<&str>,
) -> Result<TabularHandle> {
    let Some(reference) = metaschema else {
        return Ok(TabularHandle::new(name, resource));
    };

    let loaded = store
        .load_metaschema(reference)
        .await?
        .ok_or_else(|| DatapackError::MetaschemaNotFound {
            metaschema: reference.to_string(),
        })?;

    debug!(resource = name, metaschema = reference, "resolved schema from metaschema");
    Ok(attach_metaschema(name, resource, loaded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn metaschema() -> Metaschema {
        serde_json::from_value(json!({
            "name": "M",
            "schema": {"fields": [
                {"index": 0, "name": "x", "type": "number"},
                {"index": 1, "name": "y", "type": "number"}
            ]}
        }))
        .unwrap()
    }

    fn tabular(schema: Value) -> TabularResource {
        serde_json::from_value(json!({
            "profile": "tabular-data-resource",
            "schema": schema,
            "data": []
        }))
        .unwrap()
    }

    #[test]
    fn derived_fields_lack_index() {
        let schema = derive_schema(&metaschema());
        assert_eq!(schema.field_names(), vec!["x", "y"]);
        assert!(schema.fields.iter().all(|f| !f.contains_key("index")));
    }

    #[test]
    fn derivation_leaves_metaschema_untouched() {
        let source = metaschema();
        let before = source.clone();
        let _ = derive_schema(&source);
        assert_eq!(source, before);
    }

    #[test]
    fn sentinel_is_replaced_in_memory() {
        let handle = attach_metaschema("R", tabular(json!("metaschema")), metaschema());
        let schema = handle.schema().unwrap();
        assert_eq!(
            serde_json::to_value(schema).unwrap(),
            json!({"fields": [
                {"name": "x", "type": "number"},
                {"name": "y", "type": "number"}
            ]})
        );
        assert_eq!(handle.metaschema, Some(metaschema()));
    }

    #[test]
    fn inline_schema_is_kept() {
        let inline = json!({"fields": [{"name": "z"}]});
        let handle = attach_metaschema("R", tabular(inline), metaschema());
        assert_eq!(handle.schema().unwrap().field_names(), vec!["z"]);
        assert!(handle.metaschema.is_some());
    }
}
