//! Datapackage configuration
//!
//! Every component receives a [`Config`] instead of reading process-wide
//! paths. All record locations derive from the datapackage root:
//!
//! ```text
//! <root>/resources/<resource>.json
//! <root>/metaschemas/<metaschema>.json
//! <root>/algorithms/<algorithm>.json      (optional record)
//! <root>/algorithms/<code>                (executable)
//! <root>/arguments/<algorithm>.<arguments>.json
//! <root>/views/<view>.json
//! <root>/views/<view>.png, <view>.object.json            (exports)
//! <root>/views/<algorithm>.<arguments>/<view>.png, ...    (exports for a run)
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{DatapackError, Result};

/// Default datapackage directory, relative to the working directory
pub const DEFAULT_ROOT: &str = "datapackage";

/// Identifiers become file names, so they are restricted to a safe charset
static IDENTIFIER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").unwrap());

/// Validate an identifier used to build a record path
pub fn validate_identifier(id: &str) -> Result<()> {
    if !IDENTIFIER_PATTERN.is_match(id) {
        return Err(DatapackError::InvalidIdentifier {
            id: id.to_string(),
            reason: "must start with a letter or digit, then letters, digits, '_', '-' or '.'"
                .into(),
        });
    }
    if id.contains("..") {
        return Err(DatapackError::InvalidIdentifier {
            id: id.to_string(),
            reason: "must not contain '..'".into(),
        });
    }
    Ok(())
}

/// One algorithm run: an algorithm paired with its argument set
///
/// Written `<algorithm>.<arguments>`, the stem of the arguments record. The
/// first '.' splits the two, so the algorithm part never contains one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunId {
    pub algorithm: String,
    pub arguments: String,
}

impl RunId {
    pub fn new(algorithm: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse `<algorithm>.<arguments>`
    pub fn parse(run: &str) -> Result<Self> {
        let Some((algorithm, arguments)) = run.split_once('.') else {
            return Err(DatapackError::InvalidIdentifier {
                id: run.to_string(),
                reason: "a run is written '<algorithm>.<arguments>'".into(),
            });
        };
        validate_identifier(algorithm)?;
        validate_identifier(arguments)?;
        Ok(Self::new(algorithm, arguments))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.algorithm, self.arguments)
    }
}

/// Location of one datapackage on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    root: PathBuf,
}

impl Config {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `DATAPACKAGE_PATH` if given, else `./datapackage`
    pub fn from_root(root: Option<PathBuf>) -> Self {
        Self::new(root.unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.root.join("resources")
    }

    pub fn metaschemas_dir(&self) -> PathBuf {
        self.root.join("metaschemas")
    }

    pub fn algorithms_dir(&self) -> PathBuf {
        self.root.join("algorithms")
    }

    pub fn arguments_dir(&self) -> PathBuf {
        self.root.join("arguments")
    }

    pub fn views_dir(&self) -> PathBuf {
        self.root.join("views")
    }

    pub fn resource_path(&self, resource: &str) -> Result<PathBuf> {
        validate_identifier(resource)?;
        Ok(self.resources_dir().join(format!("{resource}.json")))
    }

    pub fn metaschema_path(&self, metaschema: &str) -> Result<PathBuf> {
        validate_identifier(metaschema)?;
        Ok(self.metaschemas_dir().join(format!("{metaschema}.json")))
    }

    pub fn algorithm_record_path(&self, algorithm: &str) -> Result<PathBuf> {
        validate_identifier(algorithm)?;
        Ok(self.algorithms_dir().join(format!("{algorithm}.json")))
    }

    /// Executable inside the algorithm namespace (never resolved via PATH)
    pub fn algorithm_code_path(&self, code: &str) -> Result<PathBuf> {
        validate_identifier(code)?;
        Ok(self.algorithms_dir().join(code))
    }

    pub fn arguments_path(&self, algorithm: &str, arguments: &str) -> Result<PathBuf> {
        validate_identifier(algorithm)?;
        validate_identifier(arguments)?;
        Ok(self
            .arguments_dir()
            .join(format!("{algorithm}.{arguments}.json")))
    }

    pub fn view_path(&self, view: &str) -> Result<PathBuf> {
        validate_identifier(view)?;
        Ok(self.views_dir().join(format!("{view}.json")))
    }

    /// Rendering unit inside the views namespace
    pub fn view_code_path(&self, spec_file: &str) -> Result<PathBuf> {
        validate_identifier(spec_file)?;
        Ok(self.views_dir().join(spec_file))
    }

    /// Directory a view's exports land in: `views/`, or `views/<run>/`
    pub fn view_exports_dir(&self, run: Option<&RunId>) -> Result<PathBuf> {
        match run {
            Some(run) => {
                validate_identifier(&run.algorithm)?;
                validate_identifier(&run.arguments)?;
                Ok(self.views_dir().join(run.to_string()))
            }
            None => Ok(self.views_dir()),
        }
    }

    /// Rasterised image export for a view
    pub fn view_image_path(&self, view: &str, run: Option<&RunId>) -> Result<PathBuf> {
        validate_identifier(view)?;
        Ok(self.view_exports_dir(run)?.join(format!("{view}.png")))
    }

    /// Serialised artifact object export for a view
    pub fn view_object_path(&self, view: &str, run: Option<&RunId>) -> Result<PathBuf> {
        validate_identifier(view)?;
        Ok(self.view_exports_dir(run)?.join(format!("{view}.object.json")))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_root(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_record_paths() {
        let config = Config::new("/dp");
        assert_eq!(
            config.resource_path("points").unwrap(),
            PathBuf::from("/dp/resources/points.json")
        );
        assert_eq!(
            config.arguments_path("fit", "default").unwrap(),
            PathBuf::from("/dp/arguments/fit.default.json")
        );
        assert_eq!(
            config.view_object_path("plot", None).unwrap(),
            PathBuf::from("/dp/views/plot.object.json")
        );
    }

    #[test]
    fn run_scopes_view_exports() {
        let config = Config::new("/dp");
        let run = RunId::parse("fit.default").unwrap();
        assert_eq!(
            config.view_image_path("plot", Some(&run)).unwrap(),
            PathBuf::from("/dp/views/fit.default/plot.png")
        );
        assert_eq!(
            config.view_object_path("plot", Some(&run)).unwrap(),
            PathBuf::from("/dp/views/fit.default/plot.object.json")
        );
    }

    #[test]
    fn run_id_splits_on_first_dot() {
        let run = RunId::parse("fit.v2.final").unwrap();
        assert_eq!(run, RunId::new("fit", "v2.final"));
        assert_eq!(run.to_string(), "fit.v2.final");
    }

    #[test]
    fn run_id_needs_both_parts() {
        for run in ["fit", "fit.", ".default", "../x.default"] {
            let err = RunId::parse(run).unwrap_err();
            assert!(err.to_string().contains("DPK-004"), "{run}");
        }
    }

    #[test]
    fn default_root_is_relative() {
        assert_eq!(Config::default().root(), Path::new("datapackage"));
    }

    #[test]
    fn valid_identifiers() {
        for id in ["points", "fit_v2", "bind-fit", "a.b", "0"] {
            assert!(validate_identifier(id).is_ok(), "{id}");
        }
    }

    #[test]
    fn rejects_path_like_identifiers() {
        for id in ["", "../etc", "a/b", ".hidden", "a..b", "a b"] {
            let err = validate_identifier(id).unwrap_err();
            assert!(err.to_string().contains("DPK-004"), "{id}");
        }
    }
}
