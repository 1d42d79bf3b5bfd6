//! Unified integrator
//!
//! Merges the consensus, temporal and convergence reports into a single
//! store. Every record becomes a unified atom keyed `<component>:<key>`
//! and tagged with the architectural layer of its component.

mod health;

pub use health::{HealthStatus, HealthTerms};

use crate::analysis::{Convergence, ConvergenceReport, TemporalReport};
use crate::atom::{concept_key, SourceType};
use crate::config::{ArchitecturalPrinciple, IntegrationConfig};
use crate::consensus::ConsensusReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// The six parts of the pipeline that contribute unified atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    SourceCoverage,
    Consensus,
    Authority,
    ConflictResolution,
    TemporalEmergence,
    Convergence,
}

impl Component {
    pub const ALL: [Component; 6] = [
        Component::SourceCoverage,
        Component::Consensus,
        Component::Authority,
        Component::ConflictResolution,
        Component::TemporalEmergence,
        Component::Convergence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceCoverage => "source_coverage",
            Self::Consensus => "consensus",
            Self::Authority => "authority",
            Self::ConflictResolution => "conflict_resolution",
            Self::TemporalEmergence => "temporal_emergence",
            Self::Convergence => "convergence",
        }
    }

    pub fn default_layer(&self) -> ArchitecturalLayer {
        match self {
            Self::SourceCoverage => ArchitecturalLayer::Data,
            Self::Consensus => ArchitecturalLayer::Reasoning,
            Self::Authority => ArchitecturalLayer::Orchestration,
            Self::ConflictResolution => ArchitecturalLayer::Safety,
            Self::TemporalEmergence => ArchitecturalLayer::Presentation,
            Self::Convergence => ArchitecturalLayer::Theory,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchitecturalLayer {
    Data,
    Reasoning,
    Presentation,
    Orchestration,
    Safety,
    Theory,
}

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("no consensus, temporal or convergence output to integrate")]
    NoInputs,

    #[error("cannot encode {component} payload: {source}")]
    Payload {
        component: Component,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedAtom {
    pub component_source: Component,
    pub architectural_layer: ArchitecturalLayer,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationMetadata {
    pub integration_timestamp: DateTime<Utc>,
    pub total_atoms: usize,
    pub total_convergences: usize,
    pub component_counts: BTreeMap<Component, usize>,
    pub active_components: usize,
    pub health_terms: HealthTerms,
    pub health_score: f64,
    pub health_status: HealthStatus,
}

/// Content of `panini_unified_architecture_<timestamp>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedStore {
    pub integration_metadata: IntegrationMetadata,
    pub unified_semantic_atoms: BTreeMap<String, UnifiedAtom>,
    pub cross_domain_relations: Vec<Convergence>,
    pub architectural_principles: Vec<ArchitecturalPrinciple>,
    pub layer_distribution: BTreeMap<ArchitecturalLayer, usize>,
    pub recommendations: Vec<String>,
}

/// Latest stage outputs found in the store directory.
#[derive(Debug, Clone, Default)]
pub struct IntegrationInputs {
    pub consensus: Option<ConsensusReport>,
    pub temporal: Option<TemporalReport>,
    pub convergence: Option<ConvergenceReport>,
}

impl IntegrationInputs {
    pub fn is_empty(&self) -> bool {
        self.consensus.is_none() && self.temporal.is_none() && self.convergence.is_none()
    }
}

struct Builder<'a> {
    config: &'a IntegrationConfig,
    atoms: BTreeMap<String, UnifiedAtom>,
    counts: BTreeMap<Component, usize>,
}

impl<'a> Builder<'a> {
    fn add<T: Serialize>(
        &mut self,
        component: Component,
        key: &str,
        record: &T,
    ) -> Result<(), IntegrationError> {
        let payload = serde_json::to_value(record)
            .map_err(|source| IntegrationError::Payload { component, source })?;
        let unified_key = format!("{}:{}", component, key);
        if self
            .atoms
            .insert(
                unified_key,
                UnifiedAtom {
                    component_source: component,
                    architectural_layer: self.config.layer_for(component),
                    payload,
                },
            )
            .is_none()
        {
            *self.counts.entry(component).or_default() += 1;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct CoverageRecord {
    source_type: SourceType,
    atom_count: usize,
}

/// Build the unified store from whatever stage outputs exist.
pub fn integrate(
    inputs: &IntegrationInputs,
    config: &IntegrationConfig,
    integrated_at: DateTime<Utc>,
) -> Result<UnifiedStore, IntegrationError> {
    if inputs.is_empty() {
        return Err(IntegrationError::NoInputs);
    }
    let mut b = Builder {
        config,
        atoms: BTreeMap::new(),
        counts: Component::ALL.iter().map(|c| (*c, 0)).collect(),
    };

    if let Some(report) = &inputs.consensus {
        for (source_type, atom_count) in &report.source_coverage {
            let record = CoverageRecord {
                source_type: *source_type,
                atom_count: *atom_count,
            };
            b.add(Component::SourceCoverage, source_type.as_str(), &record)?;
        }
        for c in &report.advanced_consensuses {
            b.add(Component::Consensus, &c.concept_key, c)?;
        }
        for (agent_id, profile) in &report.authority_profiles {
            b.add(Component::Authority, agent_id, profile)?;
        }
        for r in &report.conflict_resolutions {
            b.add(Component::ConflictResolution, &concept_key(&r.concept), r)?;
        }
    }
    if let Some(report) = &inputs.temporal {
        for e in &report.concept_evolutions {
            b.add(Component::TemporalEmergence, &e.concept_key, e)?;
        }
    }
    let cross_domain_relations = inputs
        .convergence
        .as_ref()
        .map(|r| r.convergence_analysis.clone())
        .unwrap_or_default();
    for c in &cross_domain_relations {
        b.add(Component::Convergence, &c.pattern_name, c)?;
    }

    let mut layer_distribution: BTreeMap<ArchitecturalLayer, usize> = BTreeMap::new();
    for atom in b.atoms.values() {
        *layer_distribution.entry(atom.architectural_layer).or_default() += 1;
    }

    let terms = HealthTerms::compute(&b.counts, cross_domain_relations.len(), config);
    let health_score = terms.score(config);
    let health_status = HealthStatus::from_score(health_score);
    let active_components = b.counts.values().filter(|&&n| n > 0).count();
    let total_atoms = b.atoms.len();

    let recommendations = recommendations(
        health_score,
        &b.counts,
        cross_domain_relations.len(),
        total_atoms,
        config,
    );

    tracing::info!(
        atoms = total_atoms,
        convergences = cross_domain_relations.len(),
        health_score,
        "unified store built"
    );

    Ok(UnifiedStore {
        integration_metadata: IntegrationMetadata {
            integration_timestamp: integrated_at,
            total_atoms,
            total_convergences: cross_domain_relations.len(),
            component_counts: b.counts,
            active_components,
            health_terms: terms,
            health_score,
            health_status,
        },
        unified_semantic_atoms: b.atoms,
        cross_domain_relations,
        architectural_principles: config.principles.clone(),
        layer_distribution,
        recommendations,
    })
}

fn recommendations(
    health_score: f64,
    counts: &BTreeMap<Component, usize>,
    convergences: usize,
    total_atoms: usize,
    config: &IntegrationConfig,
) -> Vec<String> {
    let mut out = Vec::new();
    if HealthStatus::from_score(health_score) == HealthStatus::Excellent {
        out.push("Architecture is healthy; keep collecting from the current sources".to_string());
    } else {
        out.push(format!("Health score {:.1} is below 80; address the items below", health_score));
    }
    for component in Component::ALL {
        if counts.get(&component).copied().unwrap_or(0) == 0 {
            out.push(format!("Activate the {} component", component));
        }
    }
    if convergences == 0 {
        out.push("Enrich cross-domain relations: no convergence pattern matched".to_string());
    } else if (convergences as f64) < config.convergences_target {
        out.push(format!(
            "Extend the convergence catalog: {} of {} target convergences found",
            convergences, config.convergences_target
        ));
    }
    if (total_atoms as f64) < config.atoms_target {
        out.push(format!(
            "Expand the corpus: {} unified atoms against a target of {}",
            total_atoms, config.atoms_target
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::emergence::{TemporalMetadata, TemporalMetrics, DistributionAnalysis};
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 9, 7, 5, 1).unwrap()
    }

    fn empty_temporal() -> TemporalReport {
        TemporalReport {
            metadata: TemporalMetadata {
                generated_at: at(),
                total_concepts: 0,
                multi_period_concepts: 0,
                total_temporal_atoms: 0,
                temporal_span: "1700-2024".into(),
            },
            concept_evolutions: vec![],
            innovation_hotspots: BTreeMap::new(),
            temporal_metrics: TemporalMetrics {
                multi_period_rate: 0.0,
                avg_emergence_confidence: 0.0,
                temporal_diversity: 0,
            },
            distribution_analysis: DistributionAnalysis {
                period_distribution: BTreeMap::new(),
                source_distribution: BTreeMap::new(),
            },
        }
    }

    #[test]
    fn default_layers_cover_all_six() {
        let layers: std::collections::BTreeSet<_> =
            Component::ALL.iter().map(|c| c.default_layer()).collect();
        assert_eq!(layers.len(), 6);
    }

    #[test]
    fn no_inputs_is_an_integration_failure() {
        let config = IntegrationConfig::default();
        let err = integrate(&IntegrationInputs::default(), &config, at()).unwrap_err();
        assert!(matches!(err, IntegrationError::NoInputs));
    }

    #[test]
    fn empty_report_still_integrates_with_recommendations() {
        let inputs = IntegrationInputs {
            temporal: Some(empty_temporal()),
            ..IntegrationInputs::default()
        };
        let store = integrate(&inputs, &IntegrationConfig::default(), at()).unwrap();
        assert_eq!(store.integration_metadata.total_atoms, 0);
        assert_eq!(store.integration_metadata.health_status, HealthStatus::Critical);
        assert_eq!(store.architectural_principles.len(), 5);
        assert!(store
            .recommendations
            .iter()
            .any(|r| r == "Activate the convergence component"));
    }

    #[test]
    fn configured_layer_overrides_default() {
        let mut config = IntegrationConfig::default();
        config
            .component_layers
            .insert(Component::TemporalEmergence, ArchitecturalLayer::Theory);
        assert_eq!(config.layer_for(Component::TemporalEmergence), ArchitecturalLayer::Theory);
        assert_eq!(config.layer_for(Component::Consensus), ArchitecturalLayer::Reasoning);
    }
}
