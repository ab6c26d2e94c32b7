//! Binding Module - descriptors to named arguments
//!
//! Turns an argument list into the named inputs of a unit:
//! - `argument`: one resolved argument (literal, tabular handle or raw record)
//! - `schema`: metaschema derivation for tabular resources
//! - `resolve`: the ordered name → argument mapping (`Bindings`)
//!
//! Data flow:
//! ```text
//! ArgumentSet (descriptors)
//!        ↓
//!  value    → Argument::Value
//!  resource → DataStore → schema resolution → Argument::Table / Argument::Record
//!        ↓
//!     Bindings → unit
//! ```

mod argument;
mod resolve;
mod schema;

// Re-export public types
pub use argument::Argument;
pub use resolve::Bindings;
pub use schema::{attach_metaschema, derive_schema, resolve_schema};
