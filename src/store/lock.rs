//! Directory-level lock for a pipeline invocation

use super::traits::{StoreError, StoreResult};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const LOCK_FILE_NAME: &str = ".sce.lock";

/// Exclusive ownership of a store directory for one invocation.
///
/// Created with create-new semantics; removed when dropped. A second
/// invocation against the same directory fails with `StoreError::Locked`.
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
}

impl DirLock {
    pub fn acquire(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let path = dir.as_ref().join(LOCK_FILE_NAME);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => StoreError::Locked(path.display().to_string()),
                _ => StoreError::Write {
                    name: LOCK_FILE_NAME.to_string(),
                    source: e,
                },
            })?;
        // pid is informational only
        let _ = writeln!(file, "{}", std::process::id());
        Ok(Self { path })
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
