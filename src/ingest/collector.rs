//! Collector trait: the producer seam for raw atoms
//!
//! A collector declares which agent it speaks for and which source type
//! it covers, then yields raw records. Scraping and extraction live
//! outside the crate; these implementations replay already-collected data.

use super::raw::RawAtom;
use crate::atom::{Agent, SourceType};
use crate::pipeline::CancellationToken;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("cannot read collector output {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed collector output {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("collection cancelled")]
    Cancelled,
}

/// The contract collectors implement.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Agent recorded as the store's `collector_agent`
    fn agent(&self) -> &Agent;

    fn source_type(&self) -> SourceType;

    /// Produce raw records. Implementations should check the token
    /// between records and stop early once it is cancelled.
    async fn collect(&self, cancel: &CancellationToken) -> Result<Vec<RawAtom>, CollectorError>;
}

#[derive(Debug, Deserialize)]
struct RawCollectionMetadata {
    collector_agent: Agent,
}

/// Collector output on disk: the store layout with unvalidated atoms.
#[derive(Debug, Deserialize)]
struct RawCollection {
    collection_metadata: RawCollectionMetadata,
    #[serde(default)]
    semantic_atoms: Vec<Value>,
}

/// Replays a collector's JSON output file.
#[derive(Debug, Clone)]
pub struct JsonFileCollector {
    path: PathBuf,
    source_type: SourceType,
    agent: Agent,
    records: Vec<Value>,
}

impl JsonFileCollector {
    pub async fn load(
        path: impl AsRef<Path>,
        source_type: SourceType,
    ) -> Result<Self, CollectorError> {
        let path = path.as_ref().to_path_buf();
        let bytes = tokio::fs::read(&path).await.map_err(|source| CollectorError::Io {
            path: path.clone(),
            source,
        })?;
        let raw: RawCollection =
            serde_json::from_slice(&bytes).map_err(|source| CollectorError::Parse {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            source_type,
            agent: raw.collection_metadata.collector_agent,
            records: raw.semantic_atoms,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Collector for JsonFileCollector {
    fn agent(&self) -> &Agent {
        &self.agent
    }

    fn source_type(&self) -> SourceType {
        self.source_type
    }

    async fn collect(&self, cancel: &CancellationToken) -> Result<Vec<RawAtom>, CollectorError> {
        if cancel.is_cancelled() {
            return Err(CollectorError::Cancelled);
        }
        Ok(self.records.iter().cloned().map(RawAtom).collect())
    }
}

/// Serves records held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryCollector {
    agent: Agent,
    source_type: SourceType,
    records: Vec<RawAtom>,
}

impl InMemoryCollector {
    pub fn new(agent: Agent, source_type: SourceType, records: Vec<RawAtom>) -> Self {
        Self {
            agent,
            source_type,
            records,
        }
    }
}

#[async_trait]
impl Collector for InMemoryCollector {
    fn agent(&self) -> &Agent {
        &self.agent
    }

    fn source_type(&self) -> SourceType {
        self.source_type
    }

    async fn collect(&self, cancel: &CancellationToken) -> Result<Vec<RawAtom>, CollectorError> {
        if cancel.is_cancelled() {
            return Err(CollectorError::Cancelled);
        }
        Ok(self.records.clone())
    }
}
