//! # Unit Abstraction Layer
//!
//! Traits and implementations for the externally supplied units the
//! pipeline calls: algorithms and renderers.
//!
//! ## Overview
//!
//! - [`Algorithm`] - named arguments in, named results out
//! - [`Renderer`] - named tabular handles in, one [`Artifact`] out
//! - [`UnitRegistry`] - identifier → unit lookup, one namespace per kind
//! - [`CommandAlgorithm`] / [`CommandRenderer`] - executables inside the
//!   datapackage, spoken to over JSON on stdin/stdout
//!
//! ## Registering in-process units
//!
//! ```rust
//! use datapack::unit::{FnAlgorithm, UnitRegistry};
//! use datapack::binding::Bindings;
//! use serde_json::json;
//!
//! let units = UnitRegistry::new();
//! units.register_algorithm(FnAlgorithm::new("double", |inputs: Bindings| {
//!     let k = inputs.get("k").and_then(|a| a.as_value()).and_then(|v| v.as_i64()).unwrap_or(0);
//!     let mut out = Bindings::new();
//!     out.set("k", json!(k * 2));
//!     Ok(out)
//! }));
//! assert!(units.has_algorithm("double"));
//! ```

mod command;
mod registry;

pub use command::{CommandAlgorithm, CommandArtifact, CommandRenderer, IMAGE_PATH_ENV};
pub use registry::UnitRegistry;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::binding::Bindings;
use crate::error::Result;
use crate::resource::TabularHandle;

// ============================================================================
// ALGORITHMS
// ============================================================================

/// A computation unit: named arguments in, named results out
///
/// Results may name any subset of the inputs; missing names are not errors.
#[async_trait]
pub trait Algorithm: Send + Sync {
    /// Identifier the unit was loaded under
    fn name(&self) -> &str;

    /// Run the unit once
    async fn run(&self, inputs: Bindings) -> Result<Bindings>;
}

/// Adapter turning a closure into an [`Algorithm`]
pub struct FnAlgorithm<F> {
    name: String,
    f: F,
}

impl<F> FnAlgorithm<F>
where
    F: Fn(Bindings) -> Result<Bindings> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> Algorithm for FnAlgorithm<F>
where
    F: Fn(Bindings) -> Result<Bindings> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, inputs: Bindings) -> Result<Bindings> {
        (self.f)(inputs)
    }
}

/// Optional `algorithms/<name>.json` record
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AlgorithmRecord {
    /// Executable file under algorithms/ (defaults to the algorithm name)
    #[serde(default)]
    pub code: Option<String>,
}

// ============================================================================
// RENDERERS
// ============================================================================

/// Tabular handles keyed by resource identifier, in view order
pub type ViewResources = IndexMap<String, TabularHandle>;

/// Output of a rendering unit
pub trait Artifact: Send {
    /// Rasterised image bytes
    fn image(&self) -> Result<Vec<u8>>;

    /// Serialised artifact object, for later reuse
    fn object(&self) -> Result<Value>;
}

/// A rendering unit: tabular handles in, one artifact out
#[async_trait]
pub trait Renderer: Send + Sync {
    fn name(&self) -> &str;

    async fn render(&self, view: &str, resources: ViewResources) -> Result<Box<dyn Artifact>>;
}
