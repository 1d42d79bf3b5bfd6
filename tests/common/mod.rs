//! Shared fixtures for the integration tests
//!
//! Synthetic collector tables (the concept lists the original collectors
//! enumerated in-process) plus helpers to turn them into raw records,
//! collectors and on-disk collector output.

#![allow(dead_code)]

pub mod tables;

pub use tables::{table, FixtureConcept};

use chrono::{DateTime, TimeZone, Utc};
use semantic_consensus::atom::{Agent, SourceType};
use semantic_consensus::config::Config;
use semantic_consensus::ingest::{InMemoryCollector, RawAtom};
use semantic_consensus::pipeline::PipelineContext;
use semantic_consensus::store::ArtifactStore;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Timestamp stamped on every artifact in these tests.
pub fn run_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 9, 7, 5, 1).unwrap()
}

pub fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

/// Builder for one raw collector record.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub concept: String,
    pub definition: String,
    pub source_type: SourceType,
    pub agent: String,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub category: Option<String>,
    pub metadata: serde_json::Map<String, Value>,
}

impl RawRecord {
    pub fn new(concept: &str, definition: &str, source_type: SourceType) -> Self {
        Self {
            concept: concept.to_string(),
            definition: definition.to_string(),
            source_type,
            agent: agent_for(source_type).to_string(),
            timestamp: day(2024, 1, 1),
            confidence: 0.8,
            category: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn agent(mut self, agent: &str) -> Self {
        self.agent = agent.to_string();
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn source_url(&self) -> String {
        format!(
            "https://{}.example.org/{}",
            self.source_type,
            self.concept.to_lowercase().replace(' ', "_")
        )
    }

    pub fn to_value(&self) -> Value {
        let mut record = json!({
            "concept": self.concept,
            "definition": self.definition,
            "source_type": self.source_type.as_str(),
            "metadata": Value::Object(self.metadata.clone()),
            "provenance": {
                "source_agent": self.agent,
                "timestamp": self.timestamp.to_rfc3339(),
                "method": "fixture_table",
                "source_url": self.source_url(),
                "extraction_confidence": self.confidence,
                "parent_sources": [format!("{}_fixture", self.source_type)]
            }
        });
        if let Some(category) = &self.category {
            record["category"] = Value::String(category.clone());
        }
        record
    }

    pub fn raw(&self) -> RawAtom {
        RawAtom(self.to_value())
    }
}

pub fn agent_for(source_type: SourceType) -> &'static str {
    match source_type {
        SourceType::Encyclopedia => "wikipedia_collector",
        SourceType::AcademicPaper => "arxiv_collector",
        SourceType::HistoricalBook => "gutenberg_collector",
        SourceType::News => "news_collector",
        SourceType::InformationTheory => "information_theory_collector",
        SourceType::PhysicsMath => "physics_math_collector",
        SourceType::TemporalAnalysis => "temporal_collector",
    }
}

fn fixture_agent(source_type: SourceType) -> Agent {
    Agent::machine(agent_for(source_type), format!("{} fixture", source_type))
}

/// Records of one fixture table as raw records.
pub fn table_records(source_type: SourceType) -> Vec<RawRecord> {
    table(source_type).iter().map(|c| c.record(source_type)).collect()
}

pub fn collector(source_type: SourceType, records: &[RawRecord]) -> InMemoryCollector {
    let raw = records.iter().map(RawRecord::raw).collect();
    InMemoryCollector::new(fixture_agent(source_type), source_type, raw)
}

/// A context with one collector per fixture table.
pub fn fixture_context(store: Arc<dyn ArtifactStore>) -> PipelineContext {
    let mut ctx = PipelineContext::new(store, Config::default()).with_run_at(run_at());
    for source_type in tables::TABLE_SOURCES {
        ctx = ctx.with_collector(Box::new(collector(source_type, &table_records(source_type))));
    }
    ctx
}

/// Write collector output in the on-disk layout and return its path.
pub fn write_collector_file(dir: &Path, source_type: SourceType, records: &[RawRecord]) -> PathBuf {
    let body = json!({
        "collection_metadata": {
            "collector_agent": fixture_agent(source_type),
            "collection_date": run_at().to_rfc3339(),
        },
        "semantic_atoms": records.iter().map(RawRecord::to_value).collect::<Vec<_>>(),
    });
    let path = dir.join(format!("{}_raw.json", source_type));
    std::fs::write(&path, serde_json::to_vec_pretty(&body).unwrap()).unwrap();
    path
}
