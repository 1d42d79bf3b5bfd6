//! Directory-backed artifact store

use super::traits::{ArtifactEntry, ArtifactStore, StoreError, StoreResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// One JSON file per artifact inside a single directory.
///
/// Writes go to a hidden temporary file in the same directory and are
/// renamed over the target on success, so a failed or cancelled write
/// never leaves a partial artifact behind.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// Open (creating if needed) a store directory.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|source| StoreError::Write {
            name: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.root.join(format!(".{}.tmp-{}", name, std::process::id()))
    }

    async fn write_temp(&self, temp: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::File::create(temp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for JsonDirStore {
    async fn read(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.root.join(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read {
                name: name.to_string(),
                source,
            }),
        }
    }

    async fn write_atomic(&self, name: &str, bytes: &[u8]) -> StoreResult<()> {
        let temp = self.temp_path(name);
        let target = self.root.join(name);

        let result = match self.write_temp(&temp, bytes).await {
            Ok(()) => tokio::fs::rename(&temp, &target).await,
            Err(e) => Err(e),
        };

        if let Err(source) = result {
            // Best effort: the temp file may not exist
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StoreError::Write {
                name: name.to_string(),
                source,
            });
        }
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<ArtifactEntry>> {
        let read_err = |source| StoreError::Read {
            name: self.root.display().to_string(),
            source,
        };
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await.map_err(read_err)?;
        while let Some(entry) = dir.next_entry().await.map_err(read_err)? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let meta = entry.metadata().await.map_err(read_err)?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().map_err(read_err)?;
            entries.push(ArtifactEntry { name, modified });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
