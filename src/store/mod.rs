//! Store Module - datapackage persistence
//!
//! File-backed storage for every record the pipeline reads or writes.
//! All writes are write-new-then-rename.
//!
//! Key types:
//! - `DataStore`: typed load/save of resources, metaschemas, arguments and views
//! - `ContainerLock`: exclusive per-container execution lock

mod datastore;
mod lock;

// Re-export all public types
pub use datastore::{read_json, write_atomic, DataStore};
pub use lock::ContainerLock;
