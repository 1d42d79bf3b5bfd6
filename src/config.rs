//! Pipeline configuration
//!
//! Every tunable constant of the engine lives here: source priors, the
//! authority threshold, the dissent cutoff, convergence patterns, health
//! weights. Loaded once from YAML at pipeline start; every section falls
//! back to the built-in defaults when omitted.

use crate::atom::SourceType;
use crate::integrate::{ArchitecturalLayer, Component};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// File name looked up inside a store directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "sce.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Typed configuration for every stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ingest: IngestConfig,
    pub priors: PriorConfig,
    pub authority: AuthorityConfig,
    pub consensus: ConsensusConfig,
    pub convergence: ConvergenceConfig,
    pub emergence: EmergenceConfig,
    pub integration: IntegrationConfig,
}

impl Config {
    /// Load and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// `--config` if given, else `<dir>/sce.yaml` if present, else defaults.
    pub fn resolve(explicit: Option<&Path>, store_dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = store_dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(candidate)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{} must be in [0, 1], got {}", name, v)))
            }
        };
        let positive = |name: &str, v: f64| {
            if v > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{} must be positive, got {}", name, v)))
            }
        };

        for (source, prior) in &self.priors.weights {
            unit(&format!("priors.weights.{}", source), *prior)?;
        }
        unit("priors.fallback", self.priors.fallback)?;
        unit("authority.peer_validation_default", self.authority.peer_validation_default)?;
        unit("consensus.dissent_cutoff", self.consensus.dissent_cutoff)?;
        positive("consensus.conflict_length_ratio", self.consensus.conflict_length_ratio)?;
        positive("consensus.source_cap", self.consensus.source_cap as f64)?;
        positive("consensus.agent_cap", self.consensus.agent_cap as f64)?;
        positive("authority.source_cap", self.authority.source_cap as f64)?;
        positive("authority.activity_cap", self.authority.activity_cap as f64)?;
        positive("convergence.source_cap", self.convergence.source_cap as f64)?;
        positive("convergence.min_word_len", self.convergence.min_word_len as f64)?;
        // zero shared words would let empty word sets pair up with strength 0/0
        positive("convergence.min_shared_words", self.convergence.min_shared_words as f64)?;
        positive("integration.atoms_target", self.integration.atoms_target)?;
        positive("integration.convergences_target", self.integration.convergences_target)?;
        if self.ingest.definition_byte_cap == 0 {
            return Err(ConfigError::Invalid("ingest.definition_byte_cap must be > 0".into()));
        }
        if self.emergence.historical_start > self.emergence.historical_end {
            return Err(ConfigError::Invalid(
                "emergence.historical_start is after emergence.historical_end".into(),
            ));
        }
        let weights = &self.integration.health_weights;
        let total =
            weights.atoms + weights.convergences + weights.active_components + weights.balance;
        if (total - 100.0).abs() > 1e-9 {
            return Err(ConfigError::Invalid(format!(
                "integration.health_weights must sum to 100, got {}",
                total
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Longer definitions are truncated (with a warning), not rejected.
    pub definition_byte_cap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { definition_byte_cap: 2000 }
    }
}

/// Static per-source authority priors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorConfig {
    pub weights: BTreeMap<SourceType, f64>,
    /// Prior for source types absent from `weights`
    pub fallback: f64,
}

impl PriorConfig {
    pub fn prior(&self, source: SourceType) -> f64 {
        self.weights.get(&source).copied().unwrap_or(self.fallback)
    }
}

impl Default for PriorConfig {
    fn default() -> Self {
        let weights = BTreeMap::from([
            (SourceType::AcademicPaper, 0.9),
            (SourceType::HistoricalBook, 0.85),
            (SourceType::Encyclopedia, 0.7),
            (SourceType::TemporalAnalysis, 0.6),
            (SourceType::News, 0.5),
        ]);
        Self { weights, fallback: 0.5 }
    }
}

/// Keyword bucket used to classify an agent's atoms into subdomains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubdomainBucket {
    pub name: String,
    pub keywords: Vec<String>,
}

impl SubdomainBucket {
    fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Agents with fewer atoms are not profiled
    pub min_atoms: usize,
    pub source_cap: usize,
    pub activity_cap: usize,
    /// Placeholder until cross-agent validation exists
    pub peer_validation_default: f64,
    /// Checked in order; first match wins
    pub subdomains: Vec<SubdomainBucket>,
    pub fallback_subdomain: String,
    pub max_expertise_domains: usize,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            min_atoms: 5,
            source_cap: 3,
            activity_cap: 100,
            peer_validation_default: 0.7,
            subdomains: vec![
                SubdomainBucket::new("ai_ml", &["learning", "neural", "algorithm"]),
                SubdomainBucket::new("philosophy", &["philosophy", "reason", "knowledge"]),
                SubdomainBucket::new("economics", &["economics", "wealth", "market"]),
            ],
            fallback_subdomain: "general".to_string(),
            max_expertise_domains: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Definitions conflict when max(len) > ratio · min(len)
    pub conflict_length_ratio: f64,
    /// Candidates scoring below cutoff · winner are dissenters
    pub dissent_cutoff: f64,
    pub source_cap: usize,
    pub agent_cap: usize,
    pub high_confidence_threshold: f64,
    pub needs_validation_threshold: f64,
    pub temporal_unstable_threshold: f64,
    /// Single-atom concepts at or above this confidence are emergent
    pub emergent_threshold: f64,
    pub cluster_similarity: f64,
    pub confidence_spread: f64,
    pub length_variance_ratio: f64,
    pub min_cross_sources: usize,
    /// Used by the embedding conflict detector
    pub embedding_similarity_threshold: f32,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            conflict_length_ratio: 3.0,
            dissent_cutoff: 0.8,
            source_cap: 3,
            agent_cap: 5,
            high_confidence_threshold: 0.8,
            needs_validation_threshold: 0.5,
            temporal_unstable_threshold: 0.6,
            emergent_threshold: 0.8,
            cluster_similarity: 0.3,
            confidence_spread: 0.2,
            length_variance_ratio: 2.0,
            min_cross_sources: 2,
            embedding_similarity_threshold: 0.5,
        }
    }
}

/// A named cross-domain pattern searched for by the convergence analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergencePattern {
    pub name: String,
    pub keywords: Vec<String>,
    pub domains: Vec<String>,
    pub unifying_principle: String,
}

impl ConvergencePattern {
    pub fn new(name: &str, keywords: &[&str], domains: &[&str], unifying_principle: &str) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            unifying_principle: unifying_principle.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    pub patterns: Vec<ConvergencePattern>,
    /// Source diversity is normalized against this many source types
    pub source_cap: usize,
    /// Cross-reference words must be at least this long
    pub min_word_len: usize,
    pub min_shared_words: usize,
    pub strong_threshold: f64,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            patterns: vec![
                ConvergencePattern::new(
                    "information_entropy_convergence",
                    &["entropy", "entropie", "information"],
                    &["shannon_theory", "statistical_mechanics", "thermodynamics"],
                    "entropy as universal information measure",
                ),
                ConvergencePattern::new(
                    "compression_fractal_convergence",
                    &["compression", "fractal", "self-similarity", "auto-similaire"],
                    &["compression_algorithms", "fractal_geometry"],
                    "exploitation of self-similarity for compression",
                ),
                ConvergencePattern::new(
                    "quantum_classical_emergence",
                    &["quantum", "classical", "emergence", "décohérence"],
                    &["quantum_information", "emergence_theory"],
                    "quantum-to-classical transition as emergence",
                ),
                ConvergencePattern::new(
                    "phase_transitions_universality",
                    &["transition", "critical", "universality", "critique"],
                    &["phase_transitions", "percolation_theory", "statistical_mechanics"],
                    "universal behavior at critical points",
                ),
                ConvergencePattern::new(
                    "holographic_information_principle",
                    &["holographic", "boundary", "dimension", "information"],
                    &["holographic_principle", "compression_algorithms"],
                    "dimensional reduction preserves information",
                ),
            ],
            source_cap: 5,
            min_word_len: 6,
            min_shared_words: 2,
            strong_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergenceConfig {
    /// Inclusive publication-year range of the historical bucket
    pub historical_start: i32,
    pub historical_end: i32,
    pub modern_year: i32,
    /// Representative years used for span arithmetic
    pub historical_anchor: i32,
    pub other_anchor: i32,
    pub base_confidence: f64,
    pub span_threshold: i32,
    pub span_bonus: f64,
    pub confidence_weight: f64,
    pub multi_source_bonus: f64,
    pub long_term_span: i32,
    pub stability_variance_cap: f64,
    pub period_hotspot_min: usize,
    pub source_hotspot_min: usize,
    pub period_hotspot_cap: usize,
    pub source_hotspot_cap: usize,
    pub excerpt_chars: usize,
}

impl Default for EmergenceConfig {
    fn default() -> Self {
        Self {
            historical_start: 1700,
            historical_end: 1900,
            modern_year: 2024,
            historical_anchor: 1800,
            other_anchor: 2000,
            base_confidence: 0.5,
            span_threshold: 100,
            span_bonus: 0.3,
            confidence_weight: 0.4,
            multi_source_bonus: 0.2,
            long_term_span: 200,
            stability_variance_cap: 0.5,
            period_hotspot_min: 5,
            source_hotspot_min: 10,
            period_hotspot_cap: 10,
            source_hotspot_cap: 15,
            excerpt_chars: 100,
        }
    }
}

/// Weights of the four health-score terms; they sum to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthWeights {
    pub atoms: f64,
    pub convergences: f64,
    pub active_components: f64,
    pub balance: f64,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            atoms: 30.0,
            convergences: 25.0,
            active_components: 20.0,
            balance: 25.0,
        }
    }
}

/// A principle carried verbatim into the unified store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitecturalPrinciple {
    pub principle: String,
    pub description: String,
}

impl ArchitecturalPrinciple {
    fn new(principle: &str, description: &str) -> Self {
        Self {
            principle: principle.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    pub atoms_target: f64,
    pub convergences_target: f64,
    pub health_weights: HealthWeights,
    pub component_layers: BTreeMap<Component, ArchitecturalLayer>,
    pub principles: Vec<ArchitecturalPrinciple>,
}

impl IntegrationConfig {
    pub fn layer_for(&self, component: Component) -> ArchitecturalLayer {
        self.component_layers
            .get(&component)
            .copied()
            .unwrap_or_else(|| component.default_layer())
    }
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            atoms_target: 50.0,
            convergences_target: 10.0,
            health_weights: HealthWeights::default(),
            component_layers: Component::ALL
                .iter()
                .map(|c| (*c, c.default_layer()))
                .collect(),
            principles: vec![
                ArchitecturalPrinciple::new(
                    "Attribution Preservation",
                    "Every atom keeps its complete provenance from collection to the unified store",
                ),
                ArchitecturalPrinciple::new(
                    "Authority-Weighted Consensus",
                    "Definitions are fused by source priors and extraction confidence",
                ),
                ArchitecturalPrinciple::new(
                    "Explicit Dissent",
                    "Conflicts record the resolved definition and every dissenting source",
                ),
                ArchitecturalPrinciple::new(
                    "Semantic Unification",
                    "A single store carries consensus, emergence and convergence views",
                ),
                ArchitecturalPrinciple::new(
                    "Deterministic Rebuilds",
                    "Derived stores are rebuilt from atoms, never mutated in place",
                ),
            ],
        }
    }
}
