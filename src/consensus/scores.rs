//! Per-concept consensus scores
//!
//! Every function here takes atoms in processing order and is a pure
//! function of them. All scores land in [0, 1].

use crate::authority::capped_ratio;
use crate::config::ConsensusConfig;
use crate::index::IndexedAtom;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// `Σ c·w / Σ w` over confidences and source priors.
pub fn weighted_confidence(atoms: &[&IndexedAtom]) -> f64 {
    let total_weight: f64 = atoms.iter().map(|a| a.authority_weight).sum();
    if total_weight <= 0.0 {
        return mean(atoms.iter().map(|a| a.confidence()));
    }
    let weighted: f64 = atoms.iter().map(|a| a.confidence() * a.authority_weight).sum();
    (weighted / total_weight).clamp(0.0, 1.0)
}

/// `max(0, 1 - 2σ²)` of confidences; 1.0 for a single atom.
pub fn temporal_stability(atoms: &[&IndexedAtom]) -> f64 {
    if atoms.len() <= 1 {
        return 1.0;
    }
    let variance = population_variance(atoms.iter().map(|a| a.confidence()));
    (1.0 - 2.0 * variance).clamp(0.0, 1.0)
}

/// Mean source prior.
pub fn authority_backing(atoms: &[&IndexedAtom]) -> f64 {
    mean(atoms.iter().map(|a| a.authority_weight)).clamp(0.0, 1.0)
}

/// Half source breadth, half agent breadth, each against its cap.
pub fn cross_validation_score(atoms: &[&IndexedAtom], config: &ConsensusConfig) -> f64 {
    let sources: BTreeSet<_> = atoms.iter().map(|a| a.source_type()).collect();
    let agents: BTreeSet<_> = atoms.iter().map(|a| a.atom.agent_id()).collect();
    0.5 * capped_ratio(sources.len(), config.source_cap)
        + 0.5 * capped_ratio(agents.len(), config.agent_cap)
}

/// One step of the running mean confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionPoint {
    pub date: NaiveDate,
    pub cumulative_confidence: f64,
}

/// Running mean confidence in timestamp order (ties broken by atom id).
pub fn consensus_evolution(atoms: &[&IndexedAtom]) -> Vec<EvolutionPoint> {
    let mut ordered: Vec<&IndexedAtom> = atoms.to_vec();
    ordered.sort_by(|a, b| {
        a.atom
            .provenance
            .timestamp
            .cmp(&b.atom.provenance.timestamp)
            .then_with(|| a.atom.id.cmp(&b.atom.id))
    });
    let mut running = 0.0;
    ordered
        .iter()
        .enumerate()
        .map(|(i, a)| {
            running += a.confidence();
            EvolutionPoint {
                date: a.atom.provenance.timestamp.date_naive(),
                cumulative_confidence: round3(running / (i + 1) as f64),
            }
        })
        .collect()
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

pub(crate) fn population_variance(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let mu = mean(values.clone());
    mean(values.map(|v| (v - mu) * (v - mu)))
}

pub(crate) fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
