//! Cross-domain convergence detection

use super::word_set;
use crate::atom::SourceType;
use crate::authority::capped_ratio;
use crate::config::{ConvergenceConfig, ConvergencePattern};
use crate::index::{ConceptIndex, IndexedAtom};
use crate::pipeline::{CancellationToken, Cancelled};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

const UNKNOWN_CATEGORY: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathematicalConnection {
    pub concept: String,
    pub mathematical_form: Value,
    pub category: String,
}

/// Two atoms of one convergence whose definitions share long words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossReference {
    pub concept1: String,
    pub concept2: String,
    pub common_terms: Vec<String>,
    pub connection_strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Convergence {
    pub pattern_name: String,
    pub unifying_principle: String,
    pub expected_domains: Vec<String>,
    pub matching_concepts: Vec<String>,
    pub atom_ids: Vec<String>,
    /// Number of distinct source types among matched atoms
    pub source_diversity: usize,
    pub sources_involved: BTreeMap<SourceType, usize>,
    pub category_diversity: usize,
    pub categories_involved: BTreeMap<String, usize>,
    pub convergence_strength: f64,
    pub mathematical_connections: Vec<MathematicalConnection>,
    pub cross_references: Vec<CrossReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceMetadata {
    pub generated_at: DateTime<Utc>,
    pub total_atoms_analyzed: usize,
    pub patterns_checked: usize,
    pub convergence_patterns_detected: usize,
    pub strong_convergences: usize,
    pub sources_integrated: usize,
}

/// Content of `mathematics_physics_convergence_analysis.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    pub metadata: ConvergenceMetadata,
    pub convergence_analysis: Vec<Convergence>,
    /// Pattern names whose strength exceeds the strong threshold
    pub strong_convergences: Vec<String>,
    pub unifying_principles: Vec<String>,
}

/// Match every catalog pattern against the index.
pub fn analyze_convergences(
    index: &ConceptIndex,
    config: &ConvergenceConfig,
    generated_at: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Result<ConvergenceReport, Cancelled> {
    let mut convergences = Vec::new();
    for pattern in &config.patterns {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        match detect(index.atoms(), pattern, config) {
            Some(c) => {
                tracing::debug!(
                    pattern = %c.pattern_name,
                    strength = c.convergence_strength,
                    "convergence"
                );
                convergences.push(c);
            }
            None => tracing::debug!(pattern = %pattern.name, "no cross-domain match"),
        }
    }

    let strong_convergences: Vec<String> = convergences
        .iter()
        .filter(|c| c.convergence_strength > config.strong_threshold)
        .map(|c| c.pattern_name.clone())
        .collect();

    tracing::info!(
        detected = convergences.len(),
        strong = strong_convergences.len(),
        "convergence analysis complete"
    );

    Ok(ConvergenceReport {
        metadata: ConvergenceMetadata {
            generated_at,
            total_atoms_analyzed: index.len(),
            patterns_checked: config.patterns.len(),
            convergence_patterns_detected: convergences.len(),
            strong_convergences: strong_convergences.len(),
            sources_integrated: index.source_counts().len(),
        },
        unifying_principles: convergences.iter().map(|c| c.unifying_principle.clone()).collect(),
        strong_convergences,
        convergence_analysis: convergences,
    })
}

/// A convergence for `pattern`, or `None` if matches span fewer than two source types.
pub fn detect(
    atoms: &[IndexedAtom],
    pattern: &ConvergencePattern,
    config: &ConvergenceConfig,
) -> Option<Convergence> {
    let keywords: Vec<String> = pattern.keywords.iter().map(|k| k.to_lowercase()).collect();
    let matched: Vec<&IndexedAtom> = atoms
        .iter()
        .filter(|a| {
            let text = format!("{} {}", a.atom.concept_key(), a.atom.definition.to_lowercase());
            keywords.iter().any(|k| text.contains(k.as_str()))
        })
        .collect();

    let mut sources_involved: BTreeMap<SourceType, usize> = BTreeMap::new();
    let mut categories_involved: BTreeMap<String, usize> = BTreeMap::new();
    for a in &matched {
        *sources_involved.entry(a.source_type()).or_default() += 1;
        let category = a.atom.category.clone().unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
        *categories_involved.entry(category).or_default() += 1;
    }
    if sources_involved.len() < 2 {
        return None;
    }

    let n = matched.len() as f64;
    let mean_confidence = matched.iter().map(|a| a.confidence()).sum::<f64>() / n;
    let mathematical_connections: Vec<MathematicalConnection> = matched
        .iter()
        .filter_map(|a| {
            a.atom.mathematical_form().map(|form| MathematicalConnection {
                concept: a.atom.concept.clone(),
                mathematical_form: form.clone(),
                category: a.atom.category.clone().unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
            })
        })
        .collect();
    let math_richness = mathematical_connections.len() as f64 / n;
    let source_diversity = capped_ratio(sources_involved.len(), config.source_cap);
    let convergence_strength =
        ((source_diversity + mean_confidence + math_richness) / 3.0).clamp(0.0, 1.0);

    Some(Convergence {
        pattern_name: pattern.name.clone(),
        unifying_principle: pattern.unifying_principle.clone(),
        expected_domains: pattern.domains.clone(),
        matching_concepts: matched.iter().map(|a| a.atom.concept.clone()).collect(),
        atom_ids: matched.iter().map(|a| a.atom.id.clone()).collect(),
        source_diversity: sources_involved.len(),
        sources_involved,
        category_diversity: categories_involved.len(),
        categories_involved,
        convergence_strength,
        mathematical_connections,
        cross_references: cross_references(&matched, config),
    })
}

/// Pairs of atoms sharing at least `min_shared_words` long definition words.
///
/// Strength is `|shared| / max(|words_a|, |words_b|)` over the long-word sets.
pub fn cross_references(atoms: &[&IndexedAtom], config: &ConvergenceConfig) -> Vec<CrossReference> {
    let words: Vec<BTreeSet<String>> = atoms
        .iter()
        .map(|a| word_set(&a.atom.definition, config.min_word_len))
        .collect();

    let mut refs = Vec::new();
    for i in 0..atoms.len() {
        for j in (i + 1)..atoms.len() {
            let common_terms: Vec<String> = words[i].intersection(&words[j]).cloned().collect();
            if common_terms.len() < config.min_shared_words {
                continue;
            }
            let denominator = words[i].len().max(words[j].len());
            refs.push(CrossReference {
                concept1: atoms[i].atom.concept.clone(),
                concept2: atoms[j].atom.concept.clone(),
                connection_strength: common_terms.len() as f64 / denominator as f64,
                common_terms,
            });
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::tests::sample_atom;
    use crate::atom::SemanticAtom;
    use crate::config::PriorConfig;
    use chrono::TimeZone;

    fn atom(
        concept: &str,
        definition: &str,
        source: SourceType,
        form: Option<&str>,
    ) -> SemanticAtom {
        let mut a = sample_atom(concept, 0.9);
        a.definition = definition.into();
        a.source_type = source;
        a.id = format!("{}-{}", concept, source);
        if let Some(f) = form {
            a.metadata.insert("mathematical_form".into(), Value::String(f.into()));
        }
        a
    }

    fn index(atoms: Vec<SemanticAtom>) -> ConceptIndex {
        let mut by_source: BTreeMap<SourceType, Vec<SemanticAtom>> = BTreeMap::new();
        for a in atoms {
            by_source.entry(a.source_type).or_default().push(a);
        }
        ConceptIndex::build(by_source, &PriorConfig::default())
    }

    fn entropy_only() -> ConvergenceConfig {
        ConvergenceConfig {
            patterns: vec![ConvergencePattern::new(
                "entropy_universality",
                &["entropy"],
                &["shannon_theory", "statistical_mechanics"],
                "entropy as universal information measure",
            )],
            ..ConvergenceConfig::default()
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn analyze_entropy(idx: &ConceptIndex) -> ConvergenceReport {
        analyze_convergences(idx, &entropy_only(), at(), &CancellationToken::new()).unwrap()
    }

    // === Scenario: Cross-domain convergence ===

    #[test]
    fn entropy_pattern_spans_two_sources() {
        let idx = index(vec![
            atom(
                "Shannon entropy",
                "average information content measured across message symbols",
                SourceType::InformationTheory,
                Some("H = -Σ p log p"),
            ),
            atom(
                "Thermodynamic entropy",
                "statistical measure of microscopic configurations across message ensembles",
                SourceType::PhysicsMath,
                None,
            ),
            atom("Sonnet", "fourteen line poem", SourceType::Encyclopedia, None),
        ]);
        let report = analyze_entropy(&idx);

        assert_eq!(report.convergence_analysis.len(), 1);
        let c = &report.convergence_analysis[0];
        assert_eq!(c.source_diversity, 2);
        assert!((0.0..=1.0).contains(&c.convergence_strength));
        // (2/5 + 0.9 + 1/2) / 3
        assert!((c.convergence_strength - 0.6).abs() < 1e-9);
        assert_eq!(c.mathematical_connections.len(), 1);
        assert_eq!(c.cross_references.len(), 1);
        assert_eq!(c.cross_references[0].common_terms, vec!["across", "message"]);
        assert_eq!(report.unifying_principles, vec!["entropy as universal information measure"]);
        assert!(report.strong_convergences.is_empty());
    }

    #[test]
    fn single_source_match_is_not_a_convergence() {
        let idx = index(vec![
            atom("entropy", "disorder", SourceType::PhysicsMath, None),
            atom("negentropy", "order", SourceType::PhysicsMath, None),
        ]);
        let report = analyze_entropy(&idx);
        assert!(report.convergence_analysis.is_empty());
    }

    #[test]
    fn keyword_can_match_definition_only() {
        let idx = index(vec![
            atom(
                "information",
                "reduction of entropy in a receiver",
                SourceType::InformationTheory,
                None,
            ),
            atom("heat death", "state of maximum entropy", SourceType::PhysicsMath, None),
        ]);
        let report = analyze_entropy(&idx);
        assert_eq!(report.convergence_analysis[0].matching_concepts.len(), 2);
    }

    #[test]
    fn cross_reference_needs_two_shared_long_words() {
        let a = IndexedAtom {
            atom: atom("a", "fractal geometry describes coastline", SourceType::PhysicsMath, None),
            authority_weight: 0.5,
        };
        let b = IndexedAtom {
            atom: atom("b", "fractal compression of images", SourceType::InformationTheory, None),
            authority_weight: 0.5,
        };
        assert!(cross_references(&[&a, &b], &ConvergenceConfig::default()).is_empty());
    }
}
