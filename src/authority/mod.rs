//! Per-agent authority profiles
//!
//! Agents below the configured atom threshold are not profiled.

use crate::config::AuthorityConfig;
use crate::index::{ConceptIndex, IndexedAtom};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorityProfile {
    pub agent_id: String,
    /// Most frequent subdomains, highest count first
    pub expertise_domains: Vec<String>,
    /// Mean extraction confidence
    pub historical_accuracy: f64,
    /// Distinct source types against the source cap
    pub source_reliability: f64,
    /// Atom count against the activity cap
    pub temporal_consistency: f64,
    /// Placeholder until cross-agent definition overlap is scored
    pub peer_validation_score: f64,
    pub atom_count: usize,
}

/// Profiles keyed by agent id.
pub type AuthorityProfiles = BTreeMap<String, AuthorityProfile>;

pub fn profile_agents(index: &ConceptIndex, config: &AuthorityConfig) -> AuthorityProfiles {
    let profiles: AuthorityProfiles = index
        .agents()
        .filter(|(_, atoms)| atoms.len() >= config.min_atoms)
        .map(|(agent_id, atoms)| (agent_id.to_string(), profile(agent_id, &atoms, config)))
        .collect();
    tracing::info!(
        profiled = profiles.len(),
        min_atoms = config.min_atoms,
        "authority profiles built"
    );
    profiles
}

fn profile(agent_id: &str, atoms: &[&IndexedAtom], config: &AuthorityConfig) -> AuthorityProfile {
    let n = atoms.len();
    let historical_accuracy = atoms.iter().map(|a| a.confidence()).sum::<f64>() / n as f64;
    let sources: BTreeSet<_> = atoms.iter().map(|a| a.source_type()).collect();

    let mut domain_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for a in atoms {
        *domain_counts.entry(subdomain(&a.atom.concept_key(), config)).or_default() += 1;
    }
    let mut ranked: Vec<(&str, usize)> = domain_counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    AuthorityProfile {
        agent_id: agent_id.to_string(),
        expertise_domains: ranked
            .into_iter()
            .take(config.max_expertise_domains)
            .map(|(name, _)| name.to_string())
            .collect(),
        historical_accuracy: historical_accuracy.clamp(0.0, 1.0),
        source_reliability: capped_ratio(sources.len(), config.source_cap),
        temporal_consistency: capped_ratio(n, config.activity_cap),
        peer_validation_score: config.peer_validation_default,
        atom_count: n,
    }
}

/// First bucket with a keyword contained in the concept key.
fn subdomain<'a>(concept_key: &str, config: &'a AuthorityConfig) -> &'a str {
    config
        .subdomains
        .iter()
        .find(|b| b.keywords.iter().any(|k| concept_key.contains(k.as_str())))
        .map(|b| b.name.as_str())
        .unwrap_or(config.fallback_subdomain.as_str())
}

/// `min(count / cap, 1.0)`
pub(crate) fn capped_ratio(count: usize, cap: usize) -> f64 {
    if cap == 0 {
        return 1.0;
    }
    (count as f64 / cap as f64).min(1.0)
}
