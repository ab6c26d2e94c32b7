//! Per-container execution lock
//!
//! One execution per descriptor container at a time. The lock is a sibling
//! file `<container>.json.lock` created with create-new semantics and
//! removed when the guard drops. The record's directory must already exist.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{DatapackError, Result};

#[derive(Debug)]
pub struct ContainerLock {
    path: PathBuf,
}

impl ContainerLock {
    /// Take the lock for the container record at `record_path`
    pub fn acquire(record_path: &Path) -> Result<Self> {
        let path = lock_path(record_path);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(DatapackError::ContainerLocked {
                    container: record_path.display().to_string(),
                    lock: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        debug!(lock = %path.display(), "container lock acquired");

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ContainerLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %e, "failed to release container lock");
        }
    }
}

fn lock_path(record_path: &Path) -> PathBuf {
    let mut name = record_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    record_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("arguments")).unwrap();
        let record = dir.path().join("arguments/fit.default.json");

        let lock = ContainerLock::acquire(&record).unwrap();
        assert!(lock.path().ends_with("fit.default.json.lock"));

        let err = ContainerLock::acquire(&record).unwrap_err();
        assert!(matches!(err, DatapackError::ContainerLocked { .. }));

        drop(lock);
        assert!(ContainerLock::acquire(&record).is_ok());
    }

    #[test]
    fn acquire_does_not_create_directories() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("arguments/fit.default.json");

        assert!(ContainerLock::acquire(&record).is_err());
        assert!(!dir.path().join("arguments").exists());
    }
}
