//! Datapackage validation (parse only)
//!
//! Walks `arguments/` and `resources/` and parses every record with the
//! rules the pipeline applies at run time. Nothing is executed or written.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Config;
use crate::descriptor::ArgumentSet;
use crate::error::{DatapackError, Result};
use crate::resource::Resource;

/// Outcome of a validation pass
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub arguments: usize,
    pub resources: usize,
    pub problems: Vec<(PathBuf, DatapackError)>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Validate every argument and resource record in the datapackage
pub fn validate_datapackage(config: &Config) -> ValidationReport {
    let mut report = ValidationReport::default();

    for path in json_files(&config.arguments_dir()) {
        report.arguments += 1;
        if let Err(e) = check_arguments(&path) {
            report.problems.push((path, e));
        }
    }

    for path in json_files(&config.resources_dir()) {
        report.resources += 1;
        if let Err(e) = check_resource(&path) {
            report.problems.push((path, e));
        }
    }

    report
}

fn json_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}

fn read(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| DatapackError::InvalidRecord {
        path: path.display().to_string(),
        details: e.to_string(),
    })
}

fn check_arguments(path: &Path) -> Result<()> {
    ArgumentSet::from_record(read(path)?, &path.display().to_string()).map(|_| ())
}

fn check_resource(path: &Path) -> Result<()> {
    let value = read(path)?;
    if value.is_null() {
        return Err(DatapackError::EmptyResource {
            resource: path.display().to_string(),
        });
    }
    Resource::from_value(value, &path.display().to_string()).map(|_| ())
}
