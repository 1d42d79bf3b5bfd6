//! Artifact store trait definitions

use async_trait::async_trait;
use std::time::SystemTime;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {name}: {source}")]
    Write {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed store {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store directory is locked by another invocation: {0}")]
    Locked(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A named artifact and its last modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub name: String,
    pub modified: SystemTime,
}

/// Trait for artifact storage backends
///
/// Artifacts are whole files addressed by name. Writes are atomic: a reader
/// sees either the previous content or the new content, never a prefix.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Read an artifact. `Ok(None)` when it does not exist.
    async fn read(&self, name: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replace an artifact atomically.
    async fn write_atomic(&self, name: &str, bytes: &[u8]) -> StoreResult<()>;

    /// List all artifacts.
    async fn list(&self) -> StoreResult<Vec<ArtifactEntry>>;
}
