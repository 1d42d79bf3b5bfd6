//! Semantic atom data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of upstream source an atom was collected from.
///
/// Closed set: unknown tags are rejected at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Encyclopedia,
    AcademicPaper,
    HistoricalBook,
    News,
    InformationTheory,
    PhysicsMath,
    TemporalAnalysis,
}

impl SourceType {
    pub const ALL: [SourceType; 7] = [
        SourceType::Encyclopedia,
        SourceType::AcademicPaper,
        SourceType::HistoricalBook,
        SourceType::News,
        SourceType::InformationTheory,
        SourceType::PhysicsMath,
        SourceType::TemporalAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Encyclopedia => "encyclopedia",
            Self::AcademicPaper => "academic_paper",
            Self::HistoricalBook => "historical_book",
            Self::News => "news",
            Self::InformationTheory => "information_theory",
            Self::PhysicsMath => "physics_math",
            Self::TemporalAnalysis => "temporal_analysis",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown source type: {}", s))
    }
}

/// Whether a collector is a person, a program, or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Human,
    Machine,
    Collective,
}

/// A collector agent, declared in `collection_metadata.collector_agent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Known biases: language, cultural_context, extraction_method, domain_focus ...
    #[serde(default)]
    pub bias_profile: BTreeMap<String, String>,
}

impl Agent {
    pub fn machine(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent_type: AgentType::Machine,
            name: name.into(),
            version: None,
            bias_profile: BTreeMap::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_bias(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.bias_profile.insert(key.into(), value.into());
        self
    }
}

/// Complete attribution record. Never partial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Collector agent that produced the atom
    pub source_agent: String,
    /// Extraction time
    pub timestamp: DateTime<Utc>,
    /// Extraction algorithm/version tag
    pub method: String,
    /// Canonical origin URL or synthetic URN
    pub source_url: String,
    /// Collector's self-reported confidence, clamped into [0, 1]
    pub extraction_confidence: f64,
    /// Upstream URLs/URNs, in order
    pub parent_sources: Vec<String>,
}

/// The smallest unit of ingested knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticAtom {
    pub id: String,
    /// Verbatim label; index with [`SemanticAtom::concept_key`]
    pub concept: String,
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    pub provenance: ProvenanceRecord,
}

impl SemanticAtom {
    /// Normalized key used by every index.
    pub fn concept_key(&self) -> String {
        super::concept_key(&self.concept)
    }

    pub fn confidence(&self) -> f64 {
        self.provenance.extraction_confidence
    }

    pub fn agent_id(&self) -> &str {
        &self.provenance.source_agent
    }

    pub fn mathematical_form(&self) -> Option<&Value> {
        self.metadata.get("mathematical_form")
    }

    /// `metadata.publication_year`, accepted as number or numeric string.
    pub fn publication_year(&self) -> Option<i32> {
        match self.metadata.get("publication_year")? {
            Value::Number(n) => n.as_i64().map(|y| y as i32),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
