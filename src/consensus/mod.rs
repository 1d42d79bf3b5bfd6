//! Consensus resolution
//!
//! For every concept key in the index the resolver computes a weighted
//! confidence, a temporal stability, an authority backing and a
//! cross-validation score. When the [`ConflictDetector`] flags the
//! definitions as divergent, authority-weighted voting picks a canonical
//! definition and records dissenters.

mod conflict;
mod embedding;
mod report;
pub mod scores;

pub use conflict::{
    resolve_by_voting, ConflictDetector, ConflictResolution, ConflictingDefinition, ConsensusError,
    LengthRatioDetector, ResolutionMethod,
};
pub use embedding::{cosine_similarity, Embedder, EmbeddingConflictDetector, EmbeddingError};
#[cfg(feature = "embeddings")]
pub use embedding::FastEmbedEmbedder;
pub use report::{
    AdvancedConsensus, ConceptCluster, ConsensusMetadata, ConsensusMetrics, ConsensusReport,
    ConsensusResolver, Recommendations, SkippedConcept, TemporalRange,
};
pub use scores::EvolutionPoint;

use crate::config::ConsensusConfig;

/// The length-ratio detector configured from `consensus.conflict_length_ratio`.
pub fn default_detector(config: &ConsensusConfig) -> Box<dyn ConflictDetector> {
    Box::new(LengthRatioDetector::new(config.conflict_length_ratio))
}
