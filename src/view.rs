//! View record parsing

use std::collections::HashMap;

use serde::Deserialize;

/// A view: which resources to render, and with what
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct View {
    #[serde(default)]
    pub resources: Vec<String>,
    /// Rendering backend tag
    pub spec_type: String,
    /// Rendering unit under views/
    #[serde(default, alias = "code")]
    pub spec_file: Option<String>,
    /// Per-resource metaschema references (resource id -> metaschema id)
    #[serde(default)]
    pub metaschemas: HashMap<String, String>,
}

/// specType served by an executable under views/
pub const COMMAND_SPEC_TYPE: &str = "command";
