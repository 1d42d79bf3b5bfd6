//! Consensus records and the multi-source report

use super::conflict::{resolve_by_voting, ConflictDetector, ConflictResolution, ConsensusError};
use super::scores::{
    authority_backing, consensus_evolution, cross_validation_score, round3, temporal_stability,
    weighted_confidence, EvolutionPoint,
};
use crate::analysis::word_set;
use crate::atom::SourceType;
use crate::authority::AuthorityProfiles;
use crate::config::ConsensusConfig;
use crate::index::{ConceptIndex, IndexedAtom};
use crate::pipeline::{CancellationToken, Cancelled};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Words shorter than this are ignored when clustering concepts.
const CLUSTER_WORD_LEN: usize = 4;
const CLUSTER_SHARED_KEYWORDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalRange {
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

/// The resolver's verdict for one concept key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedConsensus {
    /// Display label of the first atom in processing order
    pub concept: String,
    pub concept_key: String,
    /// Distinct source types, in processing order
    pub sources: Vec<SourceType>,
    pub definitions: Vec<String>,
    pub agents: BTreeSet<String>,
    pub confidence_scores: Vec<f64>,
    pub temporal_range: TemporalRange,
    pub weighted_confidence: f64,
    pub temporal_stability: f64,
    pub authority_backing: f64,
    pub cross_validation_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_resolution: Option<ConflictResolution>,
    pub consensus_evolution: Vec<EvolutionPoint>,
    #[serde(default)]
    pub divergence_factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedConcept {
    pub concept: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusMetadata {
    pub generated_at: DateTime<Utc>,
    pub engine_version: String,
    pub conflict_detector: String,
    pub total_atoms: usize,
    pub total_concepts: usize,
    pub analyzed_concepts: usize,
    pub authority_profiles: usize,
    pub conflicts_detected: usize,
    pub duplicate_atoms: usize,
    #[serde(default)]
    pub unreadable_stores: Vec<String>,
    pub skipped_concepts: usize,
    #[serde(default)]
    pub skipped: Vec<SkippedConcept>,
}

/// Concepts whose definitions share vocabulary with a core concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptCluster {
    pub core_concept: String,
    pub related: Vec<String>,
    pub similarity_scores: Vec<f64>,
    pub shared_keywords: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusMetrics {
    pub avg_weighted_confidence: f64,
    /// Weighted confidences rounded to one decimal, with counts
    pub consensus_distribution: BTreeMap<String, usize>,
    pub conflict_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub high_confidence_concepts: Vec<String>,
    pub needs_validation: Vec<String>,
    pub temporal_unstable: Vec<String>,
}

/// Content of `multi_source_consensus_analysis.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusReport {
    pub metadata: ConsensusMetadata,
    pub authority_profiles: AuthorityProfiles,
    pub source_coverage: BTreeMap<SourceType, usize>,
    pub advanced_consensuses: Vec<AdvancedConsensus>,
    pub conflict_resolutions: Vec<ConflictResolution>,
    pub cross_source_concepts: Vec<String>,
    pub emergent_concepts: Vec<String>,
    pub concept_clusters: Vec<ConceptCluster>,
    pub consensus_metrics: ConsensusMetrics,
    pub recommendations: Recommendations,
}

/// Computes consensus per concept with a pluggable conflict detector.
pub struct ConsensusResolver<'a> {
    config: &'a ConsensusConfig,
    detector: &'a dyn ConflictDetector,
}

impl<'a> ConsensusResolver<'a> {
    pub fn new(config: &'a ConsensusConfig, detector: &'a dyn ConflictDetector) -> Self {
        Self { config, detector }
    }

    /// Consensus for one concept. `Ok(None)` when it has no atoms.
    pub fn resolve_concept(
        &self,
        key: &str,
        atoms: &[&IndexedAtom],
    ) -> Result<Option<AdvancedConsensus>, ConsensusError> {
        let Some(first) = atoms.first() else {
            return Ok(None);
        };
        let concept = first.atom.concept.clone();

        let weighted = weighted_confidence(atoms);
        let stability = temporal_stability(atoms);
        let backing = authority_backing(atoms);
        let cross = cross_validation_score(atoms, self.config);
        for (name, value) in [
            ("weighted_confidence", weighted),
            ("temporal_stability", stability),
            ("authority_backing", backing),
            ("cross_validation_score", cross),
        ] {
            if !value.is_finite() {
                return Err(ConsensusError::Computation(format!("{} is not finite", name)));
            }
        }

        let conflict_resolution = if self.detector.are_definitions_conflicting(atoms)? {
            Some(resolve_by_voting(&concept, atoms, self.config.dissent_cutoff)?)
        } else {
            None
        };

        let mut sources = Vec::new();
        for a in atoms {
            if !sources.contains(&a.source_type()) {
                sources.push(a.source_type());
            }
        }
        let timestamps = atoms.iter().map(|a| a.atom.provenance.timestamp);
        let temporal_range = TemporalRange {
            earliest: timestamps.clone().min().unwrap_or(first.atom.provenance.timestamp),
            latest: timestamps.max().unwrap_or(first.atom.provenance.timestamp),
        };

        Ok(Some(AdvancedConsensus {
            concept,
            concept_key: key.to_string(),
            divergence_factors: self.divergence_factors(atoms),
            sources,
            definitions: atoms.iter().map(|a| a.atom.definition.clone()).collect(),
            agents: atoms.iter().map(|a| a.atom.agent_id().to_string()).collect(),
            confidence_scores: atoms.iter().map(|a| a.confidence()).collect(),
            temporal_range,
            weighted_confidence: weighted,
            temporal_stability: stability,
            authority_backing: backing,
            cross_validation_score: cross,
            conflict_resolution,
            consensus_evolution: consensus_evolution(atoms),
        }))
    }

    fn divergence_factors(&self, atoms: &[&IndexedAtom]) -> Vec<String> {
        let mut factors = Vec::new();
        let sources: BTreeSet<_> = atoms.iter().map(|a| a.source_type()).collect();
        if sources.len() > 1 {
            factors.push(format!("multi_source_{}", sources.len()));
        }
        let agents: BTreeSet<_> = atoms.iter().map(|a| a.atom.agent_id()).collect();
        if agents.len() > 1 {
            factors.push(format!("multi_agent_{}", agents.len()));
        }
        let (lo, hi) = atoms
            .iter()
            .map(|a| a.confidence())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| (lo.min(c), hi.max(c)));
        if hi - lo > self.config.confidence_spread {
            factors.push("confidence_variance".to_string());
        }
        let lengths: Vec<usize> = atoms.iter().map(|a| a.atom.definition.chars().count()).collect();
        let min_len = lengths.iter().copied().min().unwrap_or(0);
        let max_len = lengths.iter().copied().max().unwrap_or(0);
        if max_len as f64 > self.config.length_variance_ratio * min_len as f64 && atoms.len() > 1 {
            factors.push("definition_length_variance".to_string());
        }
        factors
    }

    /// Resolve every concept and assemble the report.
    ///
    /// A concept whose computation fails is logged and listed under
    /// `metadata.skipped`; the batch continues.
    pub fn build_report(
        &self,
        index: &ConceptIndex,
        authority_profiles: AuthorityProfiles,
        generated_at: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ConsensusReport, Cancelled> {
        let mut consensuses = Vec::new();
        let mut skipped = Vec::new();
        let mut cross_source_concepts = Vec::new();
        let mut emergent_concepts = Vec::new();

        for (key, atoms) in index.concepts() {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
            let distinct: BTreeSet<_> = atoms.iter().map(|a| a.source_type()).collect();
            if distinct.len() >= self.config.min_cross_sources {
                cross_source_concepts.push(key.to_string());
            }
            if atoms.len() == 1 && atoms[0].confidence() >= self.config.emergent_threshold {
                emergent_concepts.push(key.to_string());
            }

            match self.resolve_concept(key, &atoms) {
                Ok(Some(consensus)) => consensuses.push(consensus),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(concept = %key, error = %e, "skipping concept");
                    skipped.push(SkippedConcept {
                        concept: key.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let conflict_resolutions: Vec<ConflictResolution> = consensuses
            .iter()
            .filter_map(|c| c.conflict_resolution.clone())
            .collect();
        let concept_clusters = cluster_concepts(index, self.config.cluster_similarity, cancel)?;

        let metadata = ConsensusMetadata {
            generated_at,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            conflict_detector: self.detector.name().to_string(),
            total_atoms: index.len(),
            total_concepts: index.summary().concepts,
            analyzed_concepts: consensuses.len(),
            authority_profiles: authority_profiles.len(),
            conflicts_detected: conflict_resolutions.len(),
            duplicate_atoms: index.duplicates().len(),
            unreadable_stores: Vec::new(),
            skipped_concepts: skipped.len(),
            skipped,
        };

        tracing::info!(
            concepts = metadata.analyzed_concepts,
            conflicts = metadata.conflicts_detected,
            skipped = metadata.skipped_concepts,
            "consensus resolved"
        );

        Ok(ConsensusReport {
            metadata,
            authority_profiles,
            source_coverage: index.source_counts(),
            consensus_metrics: metrics(&consensuses, conflict_resolutions.len()),
            recommendations: self.recommendations(&consensuses),
            advanced_consensuses: consensuses,
            conflict_resolutions,
            cross_source_concepts,
            emergent_concepts,
            concept_clusters,
        })
    }

    fn recommendations(&self, consensuses: &[AdvancedConsensus]) -> Recommendations {
        let c = self.config;
        Recommendations {
            high_confidence_concepts: concepts_where(consensuses, |x| {
                x.weighted_confidence > c.high_confidence_threshold
            }),
            needs_validation: concepts_where(consensuses, |x| {
                x.cross_validation_score < c.needs_validation_threshold
            }),
            temporal_unstable: concepts_where(consensuses, |x| {
                x.temporal_stability < c.temporal_unstable_threshold
            }),
        }
    }
}

fn concepts_where(
    consensuses: &[AdvancedConsensus],
    keep: impl Fn(&AdvancedConsensus) -> bool,
) -> Vec<String> {
    consensuses.iter().filter(|c| keep(c)).map(|c| c.concept.clone()).collect()
}

fn metrics(consensuses: &[AdvancedConsensus], conflicts: usize) -> ConsensusMetrics {
    let mut consensus_distribution = BTreeMap::new();
    for c in consensuses {
        *consensus_distribution
            .entry(format!("{:.1}", c.weighted_confidence))
            .or_default() += 1;
    }
    let n = consensuses.len();
    ConsensusMetrics {
        avg_weighted_confidence: if n == 0 {
            0.0
        } else {
            consensuses.iter().map(|c| c.weighted_confidence).sum::<f64>() / n as f64
        },
        consensus_distribution,
        conflict_rate: if n == 0 { 0.0 } else { conflicts as f64 / n as f64 },
    }
}

/// Greedy clustering by Jaccard similarity of definition and context words.
///
/// Keys are visited in sorted order; each unassigned key becomes a core
/// and absorbs every later unassigned key at or above `threshold`.
fn cluster_concepts(
    index: &ConceptIndex,
    threshold: f64,
    cancel: &CancellationToken,
) -> Result<Vec<ConceptCluster>, Cancelled> {
    let vocab: Vec<(&str, String, BTreeSet<String>)> = index
        .concepts()
        .map(|(key, atoms)| {
            let text: Vec<&str> = atoms
                .iter()
                .flat_map(|a| {
                    std::iter::once(a.atom.definition.as_str()).chain(a.atom.context.as_deref())
                })
                .collect();
            (key, atoms[0].atom.concept.clone(), word_set(&text.join(" "), CLUSTER_WORD_LEN))
        })
        .collect();

    let mut assigned = vec![false; vocab.len()];
    let mut clusters = Vec::new();
    for i in 0..vocab.len() {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        if assigned[i] {
            continue;
        }
        let (_, core_label, core_words) = &vocab[i];
        let mut cluster = ConceptCluster {
            core_concept: core_label.clone(),
            related: Vec::new(),
            similarity_scores: Vec::new(),
            shared_keywords: Vec::new(),
        };
        for j in (i + 1)..vocab.len() {
            if assigned[j] {
                continue;
            }
            let words = &vocab[j].2;
            let shared: Vec<String> = core_words.intersection(words).cloned().collect();
            let union = core_words.union(words).count();
            if union == 0 {
                continue;
            }
            let similarity = shared.len() as f64 / union as f64;
            if similarity >= threshold {
                assigned[j] = true;
                cluster.related.push(vocab[j].1.clone());
                cluster.similarity_scores.push(round3(similarity));
                cluster
                    .shared_keywords
                    .push(shared.into_iter().take(CLUSTER_SHARED_KEYWORDS).collect());
            }
        }
        if !cluster.related.is_empty() {
            assigned[i] = true;
            clusters.push(cluster);
        }
    }
    Ok(clusters)
}
