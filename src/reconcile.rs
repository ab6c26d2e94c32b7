//! Output reconciliation - unit results back into descriptors
//!
//! For each descriptor named in the results:
//! - value descriptors are overwritten in place
//! - resource descriptors have their resource rewritten under the same id,
//!   with the companion metaschema dropped and a stored `"metaschema"`
//!   schema put back over whatever the unit returned
//!
//! Descriptors the unit did not mention are left untouched. Each resource
//! write is atomic on its own; there is no transaction across resources.

use std::sync::Arc;

use tracing::{debug, info};

use crate::binding::Bindings;
use crate::descriptor::{ArgumentSet, Binding};
use crate::error::Result;
use crate::event_log::{EventKind, EventLog};
use crate::resource::Resource;
use crate::store::DataStore;

/// What a reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Value descriptors overwritten
    pub values: Vec<String>,
    /// Resource ids persisted
    pub resources: Vec<String>,
    /// Result names matching no descriptor
    pub ignored: Vec<String>,
}

impl Reconciliation {
    /// Descriptor names and resource ids touched, in order
    pub fn updated(&self) -> Vec<String> {
        self.values
            .iter()
            .chain(self.resources.iter())
            .cloned()
            .collect()
    }
}

/// Merge `outputs` into `set`, persisting resources as they are reached
pub async fn reconcile(
    set: &mut ArgumentSet,
    mut outputs: Bindings,
    store: &DataStore,
    event_log: &EventLog,
) -> Result<Reconciliation> {
    let mut report = Reconciliation::default();

    for descriptor in &mut set.data {
        let Some(result) = outputs.remove(&descriptor.name) else {
            debug!(name = %descriptor.name, "no result, descriptor unchanged");
            continue;
        };

        match &mut descriptor.binding {
            Binding::Value(value) => {
                *value = result.into_literal()?;
                event_log.emit(EventKind::ValueUpdated {
                    subject: Arc::from(descriptor.name.as_str()),
                    value: value.clone(),
                });
                report.values.push(descriptor.name.clone());
            }
            Binding::Resource { id, .. } => {
                let original = store.load_resource(id).await?;
                let preserve = original
                    .as_ref()
                    .is_some_and(Resource::has_sentinel_schema);

                let mut updated = result.into_resource(id, preserve)?;
                if let Some(original) = &original {
                    updated.adopt_key_order(original.key_order());
                }

                store.save_resource(id, &updated).await?;
                info!(resource = %id, schema_preserved = preserve, "resource updated");
                event_log.emit(EventKind::ResourcePersisted {
                    subject: Arc::from(id.as_str()),
                    schema_preserved: preserve,
                });
                report.resources.push(id.clone());
            }
        }
    }

    report.ignored = outputs.names();
    if !report.ignored.is_empty() {
        debug!(ignored = ?report.ignored, "results with no matching descriptor");
    }

    Ok(report)
}
