//! In-memory artifact store (tests and embedding callers)

use super::traits::{ArtifactEntry, ArtifactStore, StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

#[derive(Debug, Default)]
struct Inner {
    artifacts: BTreeMap<String, (Vec<u8>, u64)>,
    clock: u64,
}

/// Artifact store kept in a map.
///
/// Modification times are a logical clock so "freshest" lookups are
/// deterministic. `read_only()` makes every write fail, which is how
/// tests exercise the fatal write path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_only() -> Self {
        Self {
            inner: Mutex::default(),
            read_only: true,
        }
    }

    /// Seed an artifact, bypassing the read-only flag.
    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let mut inner = self.lock();
        inner.clock += 1;
        let stamp = inner.clock;
        inner.artifacts.insert(name.into(), (bytes.into(), stamp));
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().artifacts.keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned map is still consistent: every mutation is a single insert
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn read(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.lock().artifacts.get(name).map(|(bytes, _)| bytes.clone()))
    }

    async fn write_atomic(&self, name: &str, bytes: &[u8]) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::Write {
                name: name.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only store",
                ),
            });
        }
        self.insert(name, bytes.to_vec());
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<ArtifactEntry>> {
        Ok(self
            .lock()
            .artifacts
            .iter()
            .map(|(name, (_, stamp))| ArtifactEntry {
                name: name.clone(),
                modified: SystemTime::UNIX_EPOCH + Duration::from_secs(*stamp),
            })
            .collect())
    }
}
