//! Semantic atoms and their provenance
//!
//! An atom is a concept paired with a definition and a complete
//! [`ProvenanceRecord`]. Atoms are written once by collectors and are
//! immutable afterwards; every derived store is rebuilt from them.

mod types;

pub use types::{Agent, AgentType, ProvenanceRecord, SemanticAtom, SourceType};

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Length of the hex atom id.
const ATOM_ID_LEN: usize = 16;

/// Index key for a concept label: `lower(trim(concept))`.
pub fn concept_key(concept: &str) -> String {
    concept.trim().to_lowercase()
}

/// Stable atom id derived from (concept, source_url, extraction timestamp).
///
/// UUIDv5 over the three fields joined with a unit separator, truncated to
/// 16 hex chars. Identical input always yields the identical id.
pub fn atom_id(concept: &str, source_url: &str, timestamp: &DateTime<Utc>) -> String {
    let name = format!(
        "{}\u{1f}{}\u{1f}{}",
        concept,
        source_url,
        timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    );
    let uuid = Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes());
    uuid.simple().to_string()[..ATOM_ID_LEN].to_string()
}
