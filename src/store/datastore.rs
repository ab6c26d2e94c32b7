//! DataStore - JSON records on disk
//!
//! Records are addressed by identifier and located through [`Config`].
//! A missing file and a file containing `null` both read as "no record".

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::descriptor::ArgumentSet;
use crate::error::{DatapackError, Result};
use crate::resource::{Metaschema, Resource};
use crate::unit::AlgorithmRecord;
use crate::view::View;

/// Read a JSON record; `None` if the file is absent or holds `null`
pub async fn read_json(path: &Path) -> Result<Option<Value>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value: Value = serde_json::from_str(&text).map_err(|e| DatapackError::InvalidRecord {
        path: path.display().to_string(),
        details: e.to_string(),
    })?;
    Ok((!value.is_null()).then_some(value))
}

/// Write bytes next to `path`, then rename over it
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".tmp-{}", std::process::id()));
    path.with_file_name(name)
}

async fn write_json(path: &Path, value: &Value) -> Result<()> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    write_atomic(path, text.as_bytes()).await
}

/// Typed access to one datapackage
#[derive(Debug, Clone)]
pub struct DataStore {
    config: Config,
}

impl DataStore {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load a resource record, `None` if absent or empty
    pub async fn load_resource(&self, id: &str) -> Result<Option<Resource>> {
        let path = self.config.resource_path(id)?;
        let Some(value) = read_json(&path).await? else {
            debug!(resource = id, "resource absent");
            return Ok(None);
        };
        Resource::from_value(value, &path.display().to_string()).map(Some)
    }

    pub async fn save_resource(&self, id: &str, resource: &Resource) -> Result<()> {
        let path = self.config.resource_path(id)?;
        debug!(resource = id, path = %path.display(), "saving resource");
        write_json(&path, &resource.to_value()?).await
    }

    pub async fn load_metaschema(&self, id: &str) -> Result<Option<Metaschema>> {
        let path = self.config.metaschema_path(id)?;
        let Some(value) = read_json(&path).await? else {
            return Ok(None);
        };
        let metaschema =
            serde_json::from_value(value).map_err(|e| DatapackError::InvalidRecord {
                path: path.display().to_string(),
                details: e.to_string(),
            })?;
        Ok(Some(metaschema))
    }

    /// Load and validate a descriptor container
    pub async fn load_arguments(&self, algorithm: &str, arguments: &str) -> Result<ArgumentSet> {
        let path = self.config.arguments_path(algorithm, arguments)?;
        let origin = path.display().to_string();
        let value = read_json(&path)
            .await?
            .ok_or_else(|| DatapackError::InvalidRecord {
                path: origin.clone(),
                details: "arguments record not found".into(),
            })?;
        ArgumentSet::from_record(value, &origin)
    }

    pub async fn save_arguments(
        &self,
        algorithm: &str,
        arguments: &str,
        set: &ArgumentSet,
    ) -> Result<PathBuf> {
        let path = self.config.arguments_path(algorithm, arguments)?;
        write_json(&path, &set.to_record()).await?;
        Ok(path)
    }

    pub async fn load_algorithm_record(&self, algorithm: &str) -> Result<Option<AlgorithmRecord>> {
        let path = self.config.algorithm_record_path(algorithm)?;
        let Some(value) = read_json(&path).await? else {
            return Ok(None);
        };
        let record = serde_json::from_value(value).map_err(|e| DatapackError::InvalidRecord {
            path: path.display().to_string(),
            details: e.to_string(),
        })?;
        Ok(Some(record))
    }

    pub async fn load_view(&self, view: &str) -> Result<View> {
        let path = self.config.view_path(view)?;
        let origin = path.display().to_string();
        let value = read_json(&path)
            .await?
            .ok_or_else(|| DatapackError::InvalidRecord {
                path: origin.clone(),
                details: "view record not found".into(),
            })?;
        serde_json::from_value(value).map_err(|e| DatapackError::InvalidRecord {
            path: origin,
            details: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, DataStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::new(Config::new(dir.path()));
        (dir, store)
    }

    #[tokio::test]
    async fn absent_resource_is_none() {
        let (_dir, store) = store();
        assert!(store.load_resource("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn null_resource_is_none() {
        let (dir, store) = store();
        let path = dir.path().join("resources/empty.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "null").unwrap();
        assert!(store.load_resource("empty").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_resource() {
        let (dir, store) = store();
        let resource = Resource::from_value(
            json!({"profile": "tabular-data-resource", "schema": "metaschema", "data": []}),
            "r",
        )
        .unwrap();
        store.save_resource("r", &resource).await.unwrap();

        let text = std::fs::read_to_string(dir.path().join("resources/r.json")).unwrap();
        assert!(text.contains("  \"schema\": \"metaschema\""));
        assert_eq!(store.load_resource("r").await.unwrap(), Some(resource));
    }

    #[tokio::test]
    async fn write_atomic_leaves_no_temp_file() {
        let (dir, _store) = store();
        let path = dir.path().join("views/plot.png");
        write_atomic(&path, b"png").await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path().join("views"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["plot.png"]);
    }

    #[tokio::test]
    async fn invalid_json_names_the_file() {
        let (dir, store) = store();
        let path = dir.path().join("metaschemas/xy.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let err = store.load_metaschema("xy").await.unwrap_err();
        assert!(err.to_string().contains("xy.json"));
    }

    #[tokio::test]
    async fn missing_arguments_record_is_an_error() {
        let (_dir, store) = store();
        let err = store.load_arguments("fit", "default").await.unwrap_err();
        assert!(matches!(err, DatapackError::InvalidRecord { .. }));
    }
}
