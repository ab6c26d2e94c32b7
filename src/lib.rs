//! Datapack - execute datapackage algorithms and render views
//!
//! Resolves an argument set into named inputs, runs the algorithm, and
//! writes its results back into the same datapackage.

pub mod binding;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod event_log;
pub mod reconcile;
pub mod record;
pub mod render;
pub mod resource;
pub mod runner;
pub mod store;
pub mod unit;
pub mod validate;
pub mod view;

pub use binding::{Argument, Bindings};
pub use config::{Config, RunId};
pub use descriptor::{ArgumentSet, Binding, Descriptor};
pub use error::{DatapackError, FixSuggestion, Result};
pub use event_log::{Event, EventKind, EventLog};
pub use resource::{Metaschema, Resource, Schema, SchemaSlot, TabularHandle, TabularResource};
pub use runner::{ExecuteRequest, Execution, Runner};
pub use store::DataStore;
pub use unit::{Algorithm, Artifact, Renderer, UnitRegistry};
pub use view::View;
