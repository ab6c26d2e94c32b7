//! Unit registry - identifier → unit lookup
//!
//! Algorithms and renderers live in separate namespaces. In-process units
//! are registered up front; anything else resolves to an executable inside
//! the datapackage (`algorithms/` or `views/`), located by path and never
//! via `PATH`, so a unit cannot collide with a program or library that
//! happens to share its name.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::command::{CommandAlgorithm, CommandRenderer};
use super::{Algorithm, Renderer};
use crate::error::{DatapackError, Result};
use crate::store::DataStore;
use crate::view::{View, COMMAND_SPEC_TYPE};

/// Cached units, cheap to clone
#[derive(Clone, Default)]
pub struct UnitRegistry {
    /// algorithm id → unit
    algorithms: Arc<DashMap<String, Arc<dyn Algorithm>>>,
    /// specType → renderer
    renderers: Arc<DashMap<String, Arc<dyn Renderer>>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an in-process algorithm under its own name
    pub fn register_algorithm(&self, algorithm: impl Algorithm + 'static) {
        let algorithm: Arc<dyn Algorithm> = Arc::new(algorithm);
        self.algorithms
            .insert(algorithm.name().to_string(), algorithm);
    }

    /// Register an in-process renderer for a view specType
    pub fn register_renderer(&self, spec_type: impl Into<String>, renderer: impl Renderer + 'static) {
        self.renderers.insert(spec_type.into(), Arc::new(renderer));
    }

    pub fn has_algorithm(&self, name: &str) -> bool {
        self.algorithms.contains_key(name)
    }

    /// Resolve an algorithm identifier to a callable unit
    ///
    /// Registered units win; otherwise the executable named by the algorithm
    /// record's `code` (or the algorithm name) under algorithms/ is used.
    pub async fn load_algorithm(&self, store: &DataStore, name: &str) -> Result<Arc<dyn Algorithm>> {
        if let Some(found) = self.algorithms.get(name) {
            return Ok(Arc::clone(found.value()));
        }

        let config = store.config();
        let record = store.load_algorithm_record(name).await?.unwrap_or_default();
        let code = record.code.as_deref().unwrap_or(name);
        let program = config.algorithm_code_path(code)?;
        let program = locate(&program).await.ok_or_else(|| DatapackError::AlgorithmNotFound {
            algorithm: name.to_string(),
            location: program.display().to_string(),
        })?;
        debug!(algorithm = name, program = %program.display(), "loaded command algorithm");

        let workdir = canonical_root(config.root()).await?;
        let algorithm: Arc<dyn Algorithm> =
            Arc::new(CommandAlgorithm::new(name, program, workdir));

        // Entry API keeps a concurrently registered unit if one raced us
        Ok(Arc::clone(
            self.algorithms
                .entry(name.to_string())
                .or_insert(algorithm)
                .value(),
        ))
    }

    /// Resolve the renderer for a view's specType
    pub async fn load_renderer(&self, store: &DataStore, view: &View) -> Result<Arc<dyn Renderer>> {
        if let Some(found) = self.renderers.get(&view.spec_type) {
            return Ok(Arc::clone(found.value()));
        }

        if view.spec_type != COMMAND_SPEC_TYPE {
            return Err(DatapackError::UnsupportedSpecType {
                spec_type: view.spec_type.clone(),
            });
        }

        let spec_file = view
            .spec_file
            .as_deref()
            .ok_or_else(|| DatapackError::InvalidRecord {
                path: "view".into(),
                details: "specType 'command' requires a specFile".into(),
            })?;
        let config = store.config();
        let program = config.view_code_path(spec_file)?;
        let program = locate(&program)
            .await
            .ok_or_else(|| DatapackError::computation(spec_file, "rendering unit not found"))?;

        let workdir = canonical_root(config.root()).await?;
        Ok(Arc::new(CommandRenderer::new(spec_file, program, workdir)))
    }
}

impl std::fmt::Debug for UnitRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitRegistry")
            .field("algorithms", &self.algorithms.len())
            .field("renderers", &self.renderers.len())
            .finish()
    }
}

/// Absolute path of an existing regular file
async fn locate(path: &Path) -> Option<std::path::PathBuf> {
    let absolute = tokio::fs::canonicalize(path).await.ok()?;
    let meta = tokio::fs::metadata(&absolute).await.ok()?;
    meta.is_file().then_some(absolute)
}

async fn canonical_root(root: &Path) -> Result<std::path::PathBuf> {
    Ok(tokio::fs::canonicalize(root).await?)
}
