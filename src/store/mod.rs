//! Store files for the pipeline
//!
//! Every stage reads and writes whole JSON artifacts through the
//! `ArtifactStore` trait. `JsonDirStore` is the on-disk backend;
//! `MemoryStore` backs tests. File names are fixed by convention.

mod json_dir;
mod lock;
mod memory;
mod traits;

pub use json_dir::JsonDirStore;
pub use lock::{DirLock, LOCK_FILE_NAME};
pub use memory::MemoryStore;
pub use traits::{ArtifactEntry, ArtifactStore, StoreError, StoreResult};

use crate::atom::{Agent, SemanticAtom, SourceType};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Consensus resolver output.
pub const CONSENSUS_FILE: &str = "multi_source_consensus_analysis.json";
/// Temporal emergence output.
pub const TEMPORAL_FILE: &str = "temporal_emergence_analysis.json";
/// Convergence output. Name kept for compatibility; content is generic.
pub const CONVERGENCE_FILE: &str = "mathematics_physics_convergence_analysis.json";
/// Prefix of timestamped unified architecture stores.
pub const ARCHITECTURE_PREFIX: &str = "panini_unified_architecture_";

const SOURCE_STORE_SUFFIX: &str = "_semantic_store.json";

/// Version string written into every source store.
pub const STORE_VERSION: &str = "1.0.0";

/// `<source_type>_semantic_store.json`
pub fn source_store_file(source_type: SourceType) -> String {
    format!("{}{}", source_type, SOURCE_STORE_SUFFIX)
}

/// Inverse of [`source_store_file`]; `None` for any other file name.
pub fn source_type_of_file(name: &str) -> Option<SourceType> {
    name.strip_suffix(SOURCE_STORE_SUFFIX)?.parse().ok()
}

/// `panini_unified_architecture_<YYYYMMDD_HHMMSS>.json`
pub fn architecture_file(at: &DateTime<Utc>) -> String {
    format!("{}{}.json", ARCHITECTURE_PREFIX, at.format("%Y%m%d_%H%M%S"))
}

/// Header of a per-source atom store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub collector_agent: Agent,
    pub collection_date: DateTime<Utc>,
    pub total_atoms: usize,
    pub version: String,
}

/// A `<source_type>_semantic_store.json` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStore {
    pub collection_metadata: CollectionMetadata,
    pub semantic_atoms: Vec<SemanticAtom>,
}

impl SourceStore {
    pub fn new(agent: Agent, collection_date: DateTime<Utc>, atoms: Vec<SemanticAtom>) -> Self {
        Self {
            collection_metadata: CollectionMetadata {
                collector_agent: agent,
                collection_date,
                total_atoms: atoms.len(),
                version: STORE_VERSION.to_string(),
            },
            semantic_atoms: atoms,
        }
    }
}

/// Read and decode a JSON artifact. `Ok(None)` when it does not exist.
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn ArtifactStore,
    name: &str,
) -> StoreResult<Option<T>> {
    let Some(bytes) = store.read(name).await? else {
        return Ok(None);
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Parse {
            name: name.to_string(),
            source,
        })
}

/// Encode and atomically write a JSON artifact.
pub async fn save_json<T: Serialize + Sync>(
    store: &dyn ArtifactStore,
    name: &str,
    value: &T,
) -> StoreResult<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    store.write_atomic(name, &bytes).await
}

/// The freshest unified architecture artifact, by modification time.
///
/// Ties are broken by name, so same-second writes still resolve to the
/// lexicographically latest timestamp.
pub async fn latest_architecture(store: &dyn ArtifactStore) -> StoreResult<Option<String>> {
    let latest = store
        .list()
        .await?
        .into_iter()
        .filter(|e| e.name.starts_with(ARCHITECTURE_PREFIX) && e.name.ends_with(".json"))
        .max_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));
    Ok(latest.map(|e| e.name))
}
