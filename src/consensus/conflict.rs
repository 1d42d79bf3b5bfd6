//! Conflict detection and resolution
//!
//! Detection sits behind [`ConflictDetector`] so the cheap length-ratio
//! heuristic can be swapped for an embedding-based check without touching
//! the resolver.

use super::embedding::EmbeddingError;
use crate::atom::SourceType;
use crate::index::IndexedAtom;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

/// A per-concept computation failed; the concept is skipped.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("{0}")]
    Computation(String),
}

/// Decides whether a concept's definitions diverge.
pub trait ConflictDetector: Send + Sync {
    /// Short tag recorded in report metadata
    fn name(&self) -> &str;

    fn are_definitions_conflicting(&self, atoms: &[&IndexedAtom]) -> Result<bool, ConsensusError>;
}

/// v1: conflict when `max(len) / min(len)` exceeds a ratio.
///
/// Lengths are counted in characters.
#[derive(Debug, Clone)]
pub struct LengthRatioDetector {
    ratio: f64,
}

impl LengthRatioDetector {
    pub fn new(ratio: f64) -> Self {
        Self { ratio }
    }
}

impl ConflictDetector for LengthRatioDetector {
    fn name(&self) -> &str {
        "length_ratio_v1"
    }

    fn are_definitions_conflicting(&self, atoms: &[&IndexedAtom]) -> Result<bool, ConsensusError> {
        if atoms.len() < 2 {
            return Ok(false);
        }
        let lengths = atoms.iter().map(|a| a.atom.definition.chars().count());
        let (min, max) = lengths.fold((usize::MAX, 0), |(lo, hi), n| (lo.min(n), hi.max(n)));
        Ok(max as f64 > self.ratio * min as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    AuthorityWeightedVoting,
    /// Every candidate scored zero; the most recent definition is kept
    TemporalPreference,
    /// Set by hand in an edited report; never produced by the resolver
    Manual,
}

/// `(definition, source_type, confidence)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictingDefinition(pub String, pub SourceType, pub f64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub concept: String,
    pub conflicting_definitions: Vec<ConflictingDefinition>,
    pub resolution_method: ResolutionMethod,
    pub resolved_definition: String,
    pub resolution_confidence: f64,
    pub dissent_sources: Vec<SourceType>,
    /// Id of the atom whose definition won
    pub resolved_atom: String,
}

/// Pick a canonical definition by `confidence · prior`.
///
/// Ties go to the later timestamp, then the higher prior, then the
/// lexicographically smaller agent id, then the smaller atom id. Sources
/// scoring below `dissent_cutoff · winning score` are dissenters.
pub fn resolve_by_voting(
    concept: &str,
    atoms: &[&IndexedAtom],
    dissent_cutoff: f64,
) -> Result<ConflictResolution, ConsensusError> {
    let score = |a: &IndexedAtom| a.confidence() * a.authority_weight;
    let winner = atoms
        .iter()
        .copied()
        .min_by(|a, b| {
            score(b)
                .partial_cmp(&score(a))
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.atom.provenance.timestamp.cmp(&a.atom.provenance.timestamp))
                .then_with(|| {
                    b.authority_weight
                        .partial_cmp(&a.authority_weight)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.atom.agent_id().cmp(b.atom.agent_id()))
                .then_with(|| a.atom.id.cmp(&b.atom.id))
        })
        .ok_or_else(|| ConsensusError::Computation(format!("no candidates for {}", concept)))?;

    let best = score(winner);
    let resolution_method = if best > 0.0 {
        ResolutionMethod::AuthorityWeightedVoting
    } else {
        ResolutionMethod::TemporalPreference
    };

    // A source is judged by its best candidate, so the winner's source never dissents.
    let mut source_best: BTreeMap<SourceType, f64> = BTreeMap::new();
    for a in atoms {
        let entry = source_best.entry(a.source_type()).or_insert(f64::MIN);
        *entry = entry.max(score(a));
    }
    let dissent_sources: Vec<SourceType> = source_best
        .into_iter()
        .filter(|&(_, s)| s < dissent_cutoff * best)
        .map(|(t, _)| t)
        .collect();

    Ok(ConflictResolution {
        concept: concept.to_string(),
        conflicting_definitions: atoms
            .iter()
            .map(|a| {
                ConflictingDefinition(a.atom.definition.clone(), a.source_type(), a.confidence())
            })
            .collect(),
        resolution_method,
        resolved_definition: winner.atom.definition.clone(),
        resolution_confidence: best.clamp(0.0, 1.0),
        dissent_sources,
        resolved_atom: winner.atom.id.clone(),
    })
}
