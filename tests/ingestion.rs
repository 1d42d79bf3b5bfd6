//! Ingestion contract: provenance totality, id stability, confidence clamping
//!
//! Run with: `cargo test --test ingestion`

mod common;

use common::{collector, day, run_at, table_records, write_collector_file, RawRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use semantic_consensus::atom::SourceType;
use semantic_consensus::config::Config;
use semantic_consensus::ingest::{AtomIngestor, IngestError, JsonFileCollector};
use semantic_consensus::pipeline::{IngestStage, PipelineContext, Stage};
use semantic_consensus::store::{self, JsonDirStore, SourceStore};
use std::sync::Arc;

const PROVENANCE_FIELDS: [&str; 6] = [
    "source_agent",
    "timestamp",
    "method",
    "source_url",
    "extraction_confidence",
    "parent_sources",
];

fn ingestor(source_type: SourceType) -> AtomIngestor {
    AtomIngestor::new(source_type, Config::default().ingest.definition_byte_cap)
}

// ============================================================================
// Provenance totality
// ============================================================================

#[test]
fn valid_records_carry_complete_provenance() {
    for record in table_records(SourceType::AcademicPaper) {
        let atom = ingestor(SourceType::AcademicPaper).ingest(&record.raw()).unwrap().atom;
        let p = &atom.provenance;
        assert!(!p.source_agent.is_empty());
        assert!(!p.method.is_empty());
        assert!(!p.source_url.is_empty());
        assert!(!p.parent_sources.is_empty());
        assert_eq!(p.timestamp, record.timestamp);
    }
}

#[test]
fn each_missing_provenance_field_is_rejected() {
    let record = RawRecord::new("entropy", "measure of disorder", SourceType::Encyclopedia);
    for field in PROVENANCE_FIELDS {
        let mut value = record.to_value();
        if let Some(provenance) = value["provenance"].as_object_mut() {
            provenance.remove(field);
        }
        let err = ingestor(SourceType::Encyclopedia)
            .ingest(&value.into())
            .unwrap_err();
        assert!(
            matches!(err, IngestError::InvalidProvenance { field: f, .. } if f == field),
            "{} -> {:?}",
            field,
            err
        );
    }
}

#[tokio::test]
async fn rejected_records_produce_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonDirStore::open(dir.path()).unwrap());
    let mut value = RawRecord::new("entropy", "measure of disorder", SourceType::News).to_value();
    value["provenance"]["source_agent"] = "".into();
    let records_dir = tempfile::tempdir().unwrap();
    let path = records_dir.path().join("news.json");
    std::fs::write(
        &path,
        serde_json::to_vec(&serde_json::json!({
            "collection_metadata": {
                "collector_agent": {"id": "news_collector", "type": "machine", "name": "news"}
            },
            "semantic_atoms": [value],
        }))
        .unwrap(),
    )
    .unwrap();

    let ctx = PipelineContext::new(store, Config::default())
        .with_run_at(run_at())
        .with_collector(Box::new(JsonFileCollector::load(&path, SourceType::News).await.unwrap()));
    let report = IngestStage.run(&ctx).await.unwrap();

    assert_eq!(report.rejected, 1);
    assert!(report.written.is_empty());
    assert!(!dir.path().join(store::source_store_file(SourceType::News)).exists());
}

// ============================================================================
// Id stability
// ============================================================================

#[test]
fn ingesting_twice_yields_identical_ids() {
    for source_type in [SourceType::InformationTheory, SourceType::HistoricalBook] {
        for record in table_records(source_type) {
            let first = ingestor(source_type).ingest(&record.raw()).unwrap().atom;
            let second = ingestor(source_type).ingest(&record.raw()).unwrap().atom;
            assert_eq!(first.id, second.id);
            assert_eq!(first, second);
        }
    }
}

#[test]
fn id_depends_on_timestamp() {
    let a = RawRecord::new("entropy", "measure of disorder", SourceType::Encyclopedia);
    let b = a.clone().at(day(2024, 6, 1));
    let ia = ingestor(SourceType::Encyclopedia).ingest(&a.raw()).unwrap().atom;
    let ib = ingestor(SourceType::Encyclopedia).ingest(&b.raw()).unwrap().atom;
    assert_ne!(ia.id, ib.id);
}

#[tokio::test]
async fn re_ingesting_a_file_does_not_duplicate_atoms() {
    let dir = tempfile::tempdir().unwrap();
    let input = tempfile::tempdir().unwrap();
    let records = table_records(SourceType::PhysicsMath);
    let path = write_collector_file(input.path(), SourceType::PhysicsMath, &records);

    for _ in 0..2 {
        let store = Arc::new(JsonDirStore::open(dir.path()).unwrap());
        let ctx = PipelineContext::new(store, Config::default())
            .with_run_at(run_at())
            .with_collector(Box::new(
                JsonFileCollector::load(&path, SourceType::PhysicsMath)
                    .await
                    .unwrap(),
            ));
        IngestStage.run(&ctx).await.unwrap();
    }

    let bytes = std::fs::read(dir.path().join("physics_math_semantic_store.json")).unwrap();
    let stored: SourceStore = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(stored.semantic_atoms.len(), records.len());
    assert_eq!(stored.collection_metadata.total_atoms, records.len());
    assert_eq!(stored.collection_metadata.collector_agent.id, "physics_math_collector");
}

// ============================================================================
// Confidence clamping
// ============================================================================

#[test]
fn confidence_is_clamped_for_arbitrary_inputs() {
    let mut rng = StdRng::seed_from_u64(0x5ce);
    for i in 0..500 {
        let raw_confidence: f64 = rng.gen_range(-5.0..5.0);
        let record = RawRecord::new(&format!("concept {}", i), "some definition", SourceType::News)
            .confidence(raw_confidence);
        let ingested = ingestor(SourceType::News).ingest(&record.raw()).unwrap();
        let c = ingested.atom.provenance.extraction_confidence;
        assert!((0.0..=1.0).contains(&c), "{} -> {}", raw_confidence, c);
        assert_eq!(ingested.warnings.is_empty(), (0.0..=1.0).contains(&raw_confidence));
    }
}

#[tokio::test]
async fn over_long_definition_is_truncated_with_warning() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonDirStore::open(dir.path()).unwrap());
    let long = "é".repeat(1500);
    let records = vec![RawRecord::new("entropy", &long, SourceType::Encyclopedia)];
    let ctx = PipelineContext::new(store, Config::default())
        .with_run_at(run_at())
        .with_collector(Box::new(collector(SourceType::Encyclopedia, &records)));

    let report = IngestStage.run(&ctx).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.warnings, 1);

    let bytes = std::fs::read(dir.path().join("encyclopedia_semantic_store.json")).unwrap();
    let stored: SourceStore = serde_json::from_slice(&bytes).unwrap();
    assert!(stored.semantic_atoms[0].definition.len() <= 2000);
}
