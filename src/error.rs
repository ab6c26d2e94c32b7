//! Error types with fix suggestions
//!
//! Codes are grouped by pipeline stage:
//! - DPK-00x: configuration (parameters, descriptors, records)
//! - DPK-01x: resolution (resources, metaschemas)
//! - DPK-02x: computation (algorithms, renderers)
//! - DPK-03x: storage

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

pub type Result<T, E = DatapackError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum DatapackError {
    // ─────────────────────────────────────────────────────────────
    // Configuration errors (DPK-001 to DPK-005)
    // ─────────────────────────────────────────────────────────────
    #[error("DPK-001: {name} environment variable missing")]
    MissingParameter { name: String },

    #[error("DPK-002: Malformed descriptor '{name}': {reason}")]
    MalformedDescriptor { name: String, reason: String },

    #[error("DPK-003: Duplicate descriptor name '{name}' in '{container}'")]
    DuplicateDescriptor { name: String, container: String },

    #[error("DPK-004: Invalid identifier '{id}': {reason}")]
    InvalidIdentifier { id: String, reason: String },

    #[error("DPK-005: Invalid record '{path}': {details}")]
    InvalidRecord { path: String, details: String },

    // ─────────────────────────────────────────────────────────────
    // Resolution errors (DPK-010 to DPK-013)
    // ─────────────────────────────────────────────────────────────
    #[error("DPK-010: Tried to load an empty resource '{resource}'")]
    EmptyResource { resource: String },

    #[error("DPK-011: Argument '{descriptor}' for tabular data resource '{resource}' does not specify metaschema")]
    MissingMetaschemaReference { resource: String, descriptor: String },

    #[error("DPK-012: Metaschema '{metaschema}' not found")]
    MetaschemaNotFound { metaschema: String },

    #[error("DPK-013: Resource '{resource}' is not a tabular data resource (profile: {profile})")]
    NotTabular { resource: String, profile: String },

    // ─────────────────────────────────────────────────────────────
    // Computation errors (DPK-020 to DPK-022)
    // ─────────────────────────────────────────────────────────────
    #[error("DPK-020: Algorithm '{algorithm}' not found (looked in {location})")]
    AlgorithmNotFound { algorithm: String, location: String },

    #[error("DPK-021: Unsupported view specType '{spec_type}'")]
    UnsupportedSpecType { spec_type: String },

    #[error("DPK-022: Unit '{unit}' failed: {details}")]
    Computation { unit: String, details: String },

    // ─────────────────────────────────────────────────────────────
    // Storage errors (DPK-030 to DPK-032)
    // ─────────────────────────────────────────────────────────────
    #[error("DPK-030: IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DPK-031: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DPK-032: Arguments '{container}' are locked by another execution ({lock})")]
    ContainerLocked { container: String, lock: String },
}

impl DatapackError {
    /// Wrap any unit failure under the unit's identifier
    pub fn computation(unit: impl Into<String>, details: impl ToString) -> Self {
        DatapackError::Computation {
            unit: unit.into(),
            details: details.to_string(),
        }
    }

    /// Stable error code (e.g. "DPK-010")
    pub fn code(&self) -> &'static str {
        match self {
            DatapackError::MissingParameter { .. } => "DPK-001",
            DatapackError::MalformedDescriptor { .. } => "DPK-002",
            DatapackError::DuplicateDescriptor { .. } => "DPK-003",
            DatapackError::InvalidIdentifier { .. } => "DPK-004",
            DatapackError::InvalidRecord { .. } => "DPK-005",
            DatapackError::EmptyResource { .. } => "DPK-010",
            DatapackError::MissingMetaschemaReference { .. } => "DPK-011",
            DatapackError::MetaschemaNotFound { .. } => "DPK-012",
            DatapackError::NotTabular { .. } => "DPK-013",
            DatapackError::AlgorithmNotFound { .. } => "DPK-020",
            DatapackError::UnsupportedSpecType { .. } => "DPK-021",
            DatapackError::Computation { .. } => "DPK-022",
            DatapackError::Io(_) => "DPK-030",
            DatapackError::Json(_) => "DPK-031",
            DatapackError::ContainerLocked { .. } => "DPK-032",
        }
    }
}

impl FixSuggestion for DatapackError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            DatapackError::MissingParameter { .. } => {
                Some("Set the variable or pass the matching --flag")
            }
            DatapackError::MalformedDescriptor { .. } => {
                Some("Give each argument either a 'value' or a 'resource' key, not both")
            }
            DatapackError::DuplicateDescriptor { .. } => Some("Use unique argument names"),
            DatapackError::InvalidIdentifier { .. } => {
                Some("Use letters, digits, '_', '-' and '.' only (no path separators)")
            }
            DatapackError::InvalidRecord { .. } => Some("Check the record's JSON structure"),
            DatapackError::EmptyResource { .. } => {
                Some("Check the resource exists under resources/ and is not null")
            }
            DatapackError::MissingMetaschemaReference { .. } => {
                Some("Add a 'metaschema' key to the argument referencing the resource")
            }
            DatapackError::MetaschemaNotFound { .. } => {
                Some("Check the metaschema exists under metaschemas/")
            }
            DatapackError::NotTabular { .. } => {
                Some("Views can only render tabular-data-resource profiles")
            }
            DatapackError::AlgorithmNotFound { .. } => {
                Some("Place an executable under algorithms/ or set 'code' in the algorithm record")
            }
            DatapackError::UnsupportedSpecType { .. } => {
                Some("Use specType 'command' with a specFile under views/")
            }
            DatapackError::Computation { .. } => {
                Some("Check the unit's stderr; it must print a JSON object on stdout")
            }
            DatapackError::Io(_) => Some("Check file path and permissions"),
            DatapackError::Json(_) => Some("Ensure the record is valid JSON (try parsing with jq)"),
            DatapackError::ContainerLocked { .. } => {
                Some("Wait for the other execution, or remove a stale .lock file")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_codes() {
        let err = DatapackError::EmptyResource {
            resource: "R".into(),
        };
        assert!(err.to_string().starts_with("DPK-010"));
        assert_eq!(err.code(), "DPK-010");
    }

    #[test]
    fn missing_metaschema_names_offenders() {
        let err = DatapackError::MissingMetaschemaReference {
            resource: "points".into(),
            descriptor: "data".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("points"));
        assert!(msg.contains("data"));
    }

    #[test]
    fn every_variant_has_a_suggestion() {
        let errors = [
            DatapackError::MissingParameter { name: "RUN".into() },
            DatapackError::computation("fit", "boom"),
            DatapackError::Io(std::io::Error::other("disk")),
        ];
        for err in errors {
            assert!(err.fix_suggestion().is_some(), "{err}");
        }
    }
}
