//! Temporal emergence analysis
//!
//! Each atom falls into a period bucket: its `publication_year` metadata
//! decides when present, otherwise historical books are historical and
//! everything else is modern. Concepts present in two or more buckets get
//! a [`ConceptEvolution`].

use crate::atom::{SemanticAtom, SourceType};
use crate::config::EmergenceConfig;
use crate::consensus::scores::{mean, population_variance};
use crate::index::{ConceptIndex, IndexedAtom};
use crate::pipeline::{CancellationToken, Cancelled};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Historical,
    Modern,
    Other,
}

impl Period {
    pub fn classify(atom: &SemanticAtom, config: &EmergenceConfig) -> Self {
        match atom.publication_year() {
            Some(y) if (config.historical_start..=config.historical_end).contains(&y) => {
                Period::Historical
            }
            Some(y) if y == config.modern_year => Period::Modern,
            Some(_) => Period::Other,
            None if atom.source_type == SourceType::HistoricalBook => Period::Historical,
            None => Period::Modern,
        }
    }

    /// Representative year used for ordering and span computation.
    pub fn anchor(self, config: &EmergenceConfig) -> i32 {
        match self {
            Period::Historical => config.historical_anchor,
            Period::Modern => config.modern_year,
            Period::Other => config.other_anchor,
        }
    }

    pub fn label(self, config: &EmergenceConfig) -> String {
        match self {
            Period::Historical => format!("{}-{}", config.historical_start, config.historical_end),
            Period::Modern => config.modern_year.to_string(),
            Period::Other => "other".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InnovationMarker {
    ConfidenceIncrease,
    MultiSourceValidation,
    LongTermPersistence,
    HistoricalModernBridge,
}

/// `(period, source)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry(pub String, pub SourceType);

/// `(period, definition excerpt, source)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionStep(pub String, pub String, pub SourceType);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptEvolution {
    pub concept: String,
    pub concept_key: String,
    pub timeline: Vec<TimelineEntry>,
    pub definitions_evolution: Vec<DefinitionStep>,
    pub emergence_confidence: f64,
    pub stability_score: f64,
    pub innovation_markers: Vec<InnovationMarker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalMetadata {
    pub generated_at: DateTime<Utc>,
    pub total_concepts: usize,
    pub multi_period_concepts: usize,
    pub total_temporal_atoms: usize,
    pub temporal_span: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalMetrics {
    pub multi_period_rate: f64,
    pub avg_emergence_confidence: f64,
    /// Distinct period buckets seen
    pub temporal_diversity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionAnalysis {
    pub period_distribution: BTreeMap<String, usize>,
    pub source_distribution: BTreeMap<SourceType, usize>,
}

/// Content of `temporal_emergence_analysis.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalReport {
    pub metadata: TemporalMetadata,
    /// Highest emergence confidence first
    pub concept_evolutions: Vec<ConceptEvolution>,
    pub innovation_hotspots: BTreeMap<String, Vec<String>>,
    pub temporal_metrics: TemporalMetrics,
    pub distribution_analysis: DistributionAnalysis,
}

struct Entry<'a> {
    atom: &'a IndexedAtom,
    period: Period,
}

pub fn analyze_emergence(
    index: &ConceptIndex,
    config: &EmergenceConfig,
    generated_at: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Result<TemporalReport, Cancelled> {
    let mut evolutions = Vec::new();
    let mut period_concepts: BTreeMap<Period, BTreeSet<String>> = BTreeMap::new();
    let mut source_concepts: BTreeMap<SourceType, BTreeSet<String>> = BTreeMap::new();
    let mut period_distribution: BTreeMap<String, usize> = BTreeMap::new();

    for (key, atoms) in index.concepts() {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        let entries: Vec<Entry> = atoms
            .iter()
            .map(|&a| Entry {
                atom: a,
                period: Period::classify(&a.atom, config),
            })
            .collect();
        for e in &entries {
            period_concepts.entry(e.period).or_default().insert(key.to_string());
            source_concepts.entry(e.atom.source_type()).or_default().insert(key.to_string());
            *period_distribution.entry(e.period.label(config)).or_default() += 1;
        }
        if let Some(evolution) = evolve(key, entries, config) {
            evolutions.push(evolution);
        }
    }

    evolutions.sort_by(|a, b| {
        b.emergence_confidence
            .partial_cmp(&a.emergence_confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.concept_key.cmp(&b.concept_key))
    });

    let total_concepts = index.summary().concepts;
    let multi_period = evolutions.len();
    let metrics = TemporalMetrics {
        multi_period_rate: if total_concepts == 0 {
            0.0
        } else {
            multi_period as f64 / total_concepts as f64
        },
        avg_emergence_confidence: mean(evolutions.iter().map(|e| e.emergence_confidence)),
        temporal_diversity: period_concepts.len(),
    };

    tracing::info!(
        concepts = total_concepts,
        multi_period,
        "temporal emergence analysis complete"
    );

    Ok(TemporalReport {
        metadata: TemporalMetadata {
            generated_at,
            total_concepts,
            multi_period_concepts: multi_period,
            total_temporal_atoms: index.len(),
            temporal_span: format!("{}-{}", config.historical_start, config.modern_year),
        },
        innovation_hotspots: hotspots(&period_concepts, &source_concepts, config),
        concept_evolutions: evolutions,
        temporal_metrics: metrics,
        distribution_analysis: DistributionAnalysis {
            period_distribution,
            source_distribution: index.source_counts(),
        },
    })
}

/// Build the evolution for one concept, or `None` if it sits in a single bucket.
fn evolve(
    key: &str,
    mut entries: Vec<Entry>,
    config: &EmergenceConfig,
) -> Option<ConceptEvolution> {
    let periods: BTreeSet<Period> = entries.iter().map(|e| e.period).collect();
    if periods.len() < 2 {
        return None;
    }
    entries.sort_by(|a, b| {
        a.period
            .anchor(config)
            .cmp(&b.period.anchor(config))
            .then_with(|| a.atom.atom.provenance.timestamp.cmp(&b.atom.atom.provenance.timestamp))
            .then_with(|| a.atom.atom.id.cmp(&b.atom.atom.id))
    });

    let confidences: Vec<f64> = entries.iter().map(|e| e.atom.confidence()).collect();
    let anchors: Vec<i32> = entries.iter().map(|e| e.period.anchor(config)).collect();
    let earliest = anchors.iter().min().copied().unwrap_or(0);
    let span = anchors.iter().max().copied().unwrap_or(0) - earliest;
    let sources: BTreeSet<SourceType> = entries.iter().map(|e| e.atom.source_type()).collect();
    let mean_confidence = mean(confidences.iter().copied());

    let mut emergence = config.base_confidence;
    if span >= config.span_threshold {
        emergence += config.span_bonus;
    }
    emergence += config.confidence_weight * (mean_confidence - 0.5);
    if sources.len() > 1 {
        emergence += config.multi_source_bonus;
    }

    let variance = population_variance(confidences.iter().copied());
    let stability = 1.0 - (2.0 * variance).min(config.stability_variance_cap);

    let mut markers = Vec::new();
    if confidences.windows(2).all(|w| w[1] > w[0]) {
        markers.push(InnovationMarker::ConfidenceIncrease);
    }
    if sources.len() > 1 {
        markers.push(InnovationMarker::MultiSourceValidation);
    }
    if span > config.long_term_span {
        markers.push(InnovationMarker::LongTermPersistence);
    }
    if periods.contains(&Period::Historical) && periods.contains(&Period::Modern) {
        markers.push(InnovationMarker::HistoricalModernBridge);
    }

    Some(ConceptEvolution {
        concept: entries[0].atom.atom.concept.clone(),
        concept_key: key.to_string(),
        timeline: entries
            .iter()
            .map(|e| TimelineEntry(e.period.label(config), e.atom.source_type()))
            .collect(),
        definitions_evolution: entries
            .iter()
            .map(|e| {
                DefinitionStep(
                    e.period.label(config),
                    excerpt(&e.atom.atom.definition, config.excerpt_chars),
                    e.atom.source_type(),
                )
            })
            .collect(),
        emergence_confidence: emergence.clamp(0.0, 1.0),
        stability_score: stability.clamp(0.0, 1.0),
        innovation_markers: markers,
    })
}

fn hotspots(
    period_concepts: &BTreeMap<Period, BTreeSet<String>>,
    source_concepts: &BTreeMap<SourceType, BTreeSet<String>>,
    config: &EmergenceConfig,
) -> BTreeMap<String, Vec<String>> {
    let mut spots = BTreeMap::new();
    for (period, concepts) in period_concepts {
        if concepts.len() > config.period_hotspot_min {
            let top = concepts.iter().take(config.period_hotspot_cap).cloned().collect();
            spots.insert(format!("period_{}", period.label(config)), top);
        }
    }
    for (source, concepts) in source_concepts {
        if concepts.len() > config.source_hotspot_min {
            let top = concepts.iter().take(config.source_hotspot_cap).cloned().collect();
            spots.insert(format!("source_{}", source), top);
        }
    }
    spots
}

fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
