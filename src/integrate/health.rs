//! Composite health score of a unified store

use super::Component;
use crate::config::IntegrationConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Excellent,
    Good,
    NeedsImprovement,
    Critical,
}

impl HealthStatus {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 80.0 => Self::Excellent,
            s if s >= 60.0 => Self::Good,
            s if s >= 40.0 => Self::NeedsImprovement,
            _ => Self::Critical,
        }
    }
}

/// The four normalized terms behind the score, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthTerms {
    pub atoms: f64,
    pub convergences: f64,
    pub active_components: f64,
    pub balance: f64,
}

impl HealthTerms {
    pub fn compute(
        component_counts: &BTreeMap<Component, usize>,
        total_convergences: usize,
        config: &IntegrationConfig,
    ) -> Self {
        let counts: Vec<f64> = Component::ALL
            .iter()
            .map(|c| component_counts.get(c).copied().unwrap_or(0) as f64)
            .collect();
        let total: f64 = counts.iter().sum();
        let active = counts.iter().filter(|&&n| n > 0.0).count();
        Self {
            atoms: normalized(total, config.atoms_target),
            convergences: normalized(total_convergences as f64, config.convergences_target),
            active_components: active as f64 / Component::ALL.len() as f64,
            balance: balance(&counts),
        }
    }

    /// Weighted sum, rounded to one decimal and clamped to [0, 100].
    pub fn score(&self, config: &IntegrationConfig) -> f64 {
        let w = &config.health_weights;
        let raw = self.atoms * w.atoms
            + self.convergences * w.convergences
            + self.active_components * w.active_components
            + self.balance * w.balance;
        ((raw * 10.0).round() / 10.0).clamp(0.0, 100.0)
    }
}

fn normalized(value: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 1.0;
    }
    (value / target).min(1.0)
}

/// `max(0, 1 - variance / mean²)`; 0 when every count is zero.
fn balance(counts: &[f64]) -> f64 {
    if counts.is_empty() {
        return 0.0;
    }
    let n = counts.len() as f64;
    let mean = counts.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
    (1.0 - variance / (mean * mean)).max(0.0)
}
