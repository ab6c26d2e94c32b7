//! View rendering pipeline
//!
//! Resolves a view's resources into tabular handles, calls the renderer
//! selected by `specType`, and exports the artifact twice: a rasterised
//! image and the serialised artifact object. Exports land in `views/`, or in
//! `views/<algorithm>.<arguments>/` when rendered for a run. Resource and
//! descriptor records are only ever read here.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::binding::resolve_schema;
use crate::config::RunId;
use crate::error::{DatapackError, Result};
use crate::event_log::{EventKind, EventLog};
use crate::resource::Resource;
use crate::store::{write_atomic, DataStore};
use crate::unit::{UnitRegistry, ViewResources};

/// Where a rendered view was exported
#[derive(Debug, Clone, PartialEq)]
pub struct ViewExport {
    pub image: PathBuf,
    pub object: PathBuf,
}

/// Render `view` and export its artifact, scoped to `run` when given
#[instrument(skip(store, units, event_log))]
pub async fn render_view(
    store: &DataStore,
    units: &UnitRegistry,
    event_log: &EventLog,
    view: &str,
    run: Option<&RunId>,
) -> Result<ViewExport> {
    let config = store.config();
    let image_path = config.view_image_path(view, run)?;
    let object_path = config.view_object_path(view, run)?;

    let record = store.load_view(view).await?;
    let renderer = units.load_renderer(store, &record).await?;

    let mut resources = ViewResources::new();
    for id in &record.resources {
        let resource = store
            .load_resource(id)
            .await?
            .ok_or_else(|| DatapackError::EmptyResource { resource: id.clone() })?;

        let tabular = match resource {
            Resource::Tabular(t) => t,
            Resource::Opaque(record) => {
                let profile = record.get("profile").and_then(|p| p.as_str());
                return Err(DatapackError::NotTabular {
                    resource: id.clone(),
                    profile: profile.unwrap_or("none").to_string(),
                });
            }
        };

        let metaschema = record.metaschemas.get(id).map(String::as_str);
        let handle = resolve_schema(store, id, tabular, metaschema).await?;
        resources.insert(id.clone(), handle);
    }

    let artifact = renderer.render(view, resources).await?;
    event_log.emit(EventKind::ViewRendered {
        subject: Arc::from(view),
        resources: record.resources.clone(),
    });

    info!("Saving image at {}", image_path.display());
    write_atomic(&image_path, &artifact.image()?).await?;
    event_log.emit(EventKind::ArtefactExported {
        subject: Arc::from(view),
        path: image_path.display().to_string(),
    });

    info!("Saving object at {}", object_path.display());
    let mut object = serde_json::to_string_pretty(&artifact.object()?)?;
    object.push('\n');
    write_atomic(&object_path, object.as_bytes()).await?;
    event_log.emit(EventKind::ArtefactExported {
        subject: Arc::from(view),
        path: object_path.display().to_string(),
    });

    Ok(ViewExport {
        image: image_path,
        object: object_path,
    })
}
