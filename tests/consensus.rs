//! Index and consensus properties, plus the single-concept scenarios
//!
//! Run with: `cargo test --test consensus`

mod common;

use common::{collector, day, fixture_context, run_at, table_records, RawRecord};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use semantic_consensus::atom::{concept_key, SourceType};
use semantic_consensus::config::Config;
use semantic_consensus::consensus::{AdvancedConsensus, ConsensusReport, ResolutionMethod};
use semantic_consensus::index::{load_sources, ConceptIndex};
use semantic_consensus::pipeline::{
    CancellationToken, ConsensusStage, IngestStage, PipelineContext, Stage,
};
use semantic_consensus::store::{self, ArtifactStore, MemoryStore};
use std::sync::Arc;

/// Ingest `records` (grouped by source type) into a fresh memory store.
async fn ingested(records: &[RawRecord]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let mut ctx = PipelineContext::new(store.clone(), Config::default()).with_run_at(run_at());
    for source_type in SourceType::ALL {
        let group: Vec<RawRecord> = records
            .iter()
            .filter(|r| r.source_type == source_type)
            .cloned()
            .collect();
        if !group.is_empty() {
            ctx = ctx.with_collector(Box::new(collector(source_type, &group)));
        }
    }
    let report = IngestStage.run(&ctx).await.unwrap();
    assert_eq!(report.rejected, 0);
    store
}

async fn consensus_report(store: Arc<MemoryStore>) -> ConsensusReport {
    let ctx = PipelineContext::new(store.clone(), Config::default()).with_run_at(run_at());
    ConsensusStage.run(&ctx).await.unwrap();
    store::load_json(store.as_ref(), store::CONSENSUS_FILE).await.unwrap().unwrap()
}

fn find<'a>(report: &'a ConsensusReport, concept: &str) -> &'a AdvancedConsensus {
    let key = concept_key(concept);
    report
        .advanced_consensuses
        .iter()
        .find(|c| c.concept_key == key)
        .unwrap_or_else(|| panic!("no consensus for {}", concept))
}

async fn read_bytes(store: &MemoryStore, name: &str) -> Vec<u8> {
    store.read(name).await.unwrap().unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-3
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn s1_single_source_single_atom() {
    let record = RawRecord::new("entropy", "measure of disorder", SourceType::Encyclopedia);
    let store = ingested(&[record.confidence(0.8)]).await;
    let report = consensus_report(store).await;

    assert_eq!(report.advanced_consensuses.len(), 1);
    let c = find(&report, "entropy");
    assert!(close(c.weighted_confidence, 0.8));
    assert_eq!(c.temporal_stability, 1.0);
    assert!(close(c.authority_backing, 0.7));
    assert!(close(c.cross_validation_score, 0.267));
    assert!(c.conflict_resolution.is_none());
    assert_eq!(report.emergent_concepts, vec!["entropy".to_string()]);
}

#[tokio::test]
async fn s2_two_source_agreement() {
    let store = ingested(&[
        RawRecord::new("entropy", "measure of disorder in a system", SourceType::Encyclopedia)
            .confidence(0.8)
            .at(day(2024, 1, 1)),
        RawRecord::new("entropy", "expected information of a variable", SourceType::AcademicPaper)
            .confidence(0.95)
            .at(day(2024, 1, 2)),
    ])
    .await;
    let report = consensus_report(store).await;

    let c = find(&report, "entropy");
    assert!(close(c.weighted_confidence, 0.884), "{}", c.weighted_confidence);
    assert!(c.conflict_resolution.is_none());
    assert!(c.cross_validation_score > 0.3);
    assert_eq!(c.sources.len(), 2);
    assert_eq!(report.cross_source_concepts, vec!["entropy".to_string()]);
}

#[tokio::test]
async fn s3_length_conflict_resolved_by_voting() {
    let short = "Finite sequence of steps for a problem."; // 39 chars
    let long = "A finite sequence of rigorous, well-defined instructions, typically used to solve \
                a class of specific problems or to perform a computation, that terminates after a \
                bounded number of operations on every admissible input.";
    assert!(long.chars().count() > 3 * short.chars().count());

    let store = ingested(&[
        RawRecord::new("algorithm", short, SourceType::Encyclopedia).confidence(0.7),
        RawRecord::new("algorithm", long, SourceType::AcademicPaper).confidence(0.9),
    ])
    .await;
    let report = consensus_report(store).await;

    let resolution = find(&report, "algorithm").conflict_resolution.as_ref().unwrap();
    assert_eq!(resolution.resolution_method, ResolutionMethod::AuthorityWeightedVoting);
    assert_eq!(resolution.resolved_definition, long);
    assert!(close(resolution.resolution_confidence, 0.81));
    // 0.7 · 0.7 = 0.49 < 0.8 · 0.81
    assert_eq!(resolution.dissent_sources, vec![SourceType::Encyclopedia]);
    assert_eq!(report.conflict_resolutions.len(), 1);
}

#[tokio::test]
async fn s3_close_runner_up_is_not_a_dissenter() {
    let short = "Finite sequence of steps for a problem.";
    let long = "A finite sequence of rigorous, well-defined instructions, typically used to solve \
                a class of specific problems or to perform a computation, that terminates after a \
                bounded number of operations on every admissible input.";
    let store = ingested(&[
        RawRecord::new("algorithm", short, SourceType::HistoricalBook).confidence(0.9),
        RawRecord::new("algorithm", long, SourceType::AcademicPaper).confidence(0.9),
    ])
    .await;
    let report = consensus_report(store).await;

    let resolution = find(&report, "algorithm").conflict_resolution.as_ref().unwrap();
    assert_eq!(resolution.resolved_definition, long);
    // 0.9 · 0.85 = 0.765 ≥ 0.8 · 0.81
    assert!(resolution.dissent_sources.is_empty());
}

// ============================================================================
// Properties over the fixture corpus
// ============================================================================

async fn fixture_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let ctx = fixture_context(store.clone());
    IngestStage.run(&ctx).await.unwrap();
    store
}

#[tokio::test]
async fn every_atom_appears_in_all_four_indices() {
    let store = fixture_store().await;
    let loaded = load_sources(store.as_ref(), &CancellationToken::new()).await.unwrap();
    assert!(loaded.failures.is_empty());
    let index = ConceptIndex::build(loaded.into_atoms(), &Config::default().priors);

    let total: usize = common::tables::TABLE_SOURCES.iter().map(|t| common::table(*t).len()).sum();
    assert_eq!(index.len(), total);
    assert_eq!(index.by_time().len(), total);
    for indexed in index.atoms() {
        let id = &indexed.atom.id;
        let has = |atoms: Vec<&semantic_consensus::index::IndexedAtom>| {
            atoms.iter().any(|a| &a.atom.id == id)
        };
        assert!(has(index.concept(&indexed.atom.concept_key())));
        assert!(has(index.agent(indexed.atom.agent_id())));
        assert!(has(index.source(indexed.source_type())));
        assert!(index.by_time().iter().any(|(_, t)| t == id));
    }
    assert!(index.by_time().windows(2).all(|w| w[0].0 <= w[1].0));
}

#[tokio::test]
async fn consensus_is_bit_identical_across_runs() {
    let first = {
        let store = fixture_store().await;
        let ctx = PipelineContext::new(store.clone(), Config::default()).with_run_at(run_at());
        ConsensusStage.run(&ctx).await.unwrap();
        read_bytes(&store, store::CONSENSUS_FILE).await
    };
    let second = {
        let store = fixture_store().await;
        let ctx = PipelineContext::new(store.clone(), Config::default()).with_run_at(run_at());
        ConsensusStage.run(&ctx).await.unwrap();
        read_bytes(&store, store::CONSENSUS_FILE).await
    };
    assert_eq!(first, second);
}

#[tokio::test]
async fn consensus_bytes_do_not_depend_on_the_wall_clock() {
    let store = fixture_store().await;
    let mut outputs = Vec::new();
    for _ in 0..2 {
        // no pinned run time, as the binary builds it
        let ctx = PipelineContext::new(store.clone(), Config::default());
        ConsensusStage.run(&ctx).await.unwrap();
        outputs.push(read_bytes(&store, store::CONSENSUS_FILE).await);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(outputs[0], outputs[1]);

    let report: ConsensusReport = serde_json::from_slice(&outputs[0]).unwrap();
    // stamped with the latest collection date of the source stores
    assert_eq!(report.metadata.generated_at, run_at());
}

#[tokio::test]
async fn consensus_is_independent_of_collector_order() {
    let mut records: Vec<RawRecord> = common::tables::TABLE_SOURCES
        .iter()
        .flat_map(|t| table_records(*t))
        .collect();
    let baseline = consensus_report(ingested(&records).await).await;

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..3 {
        records.shuffle(&mut rng);
        let shuffled = consensus_report(ingested(&records).await).await;
        assert_eq!(shuffled.advanced_consensuses, baseline.advanced_consensuses);
        assert_eq!(shuffled.conflict_resolutions, baseline.conflict_resolutions);
    }
}

#[tokio::test]
async fn resolved_definitions_come_from_the_inputs() {
    let store = fixture_store().await;
    let report = consensus_report(store).await;
    assert!(!report.conflict_resolutions.is_empty());
    for resolution in &report.conflict_resolutions {
        let c = find(&report, &resolution.concept);
        assert!(c.definitions.contains(&resolution.resolved_definition));
    }
}

#[tokio::test]
async fn scores_stay_in_unit_range_for_random_corpora() {
    let mut rng = StdRng::seed_from_u64(42);
    let concepts = ["entropy", "energy", "evolution", "market", "grammar"];
    let mut records = Vec::new();
    for i in 0..60 {
        let source_type = *SourceType::ALL.choose(&mut rng).unwrap();
        let concept = concepts.choose(&mut rng).unwrap();
        let definition = "x".repeat(rng.gen_range(5..400));
        records.push(
            RawRecord::new(concept, &definition, source_type)
                .confidence(rng.gen_range(-0.5..1.5))
                .agent(&format!("agent_{}", rng.gen_range(0..7)))
                .at(day(2024, rng.gen_range(1..=12), rng.gen_range(1..=28)))
                .meta("seq", i),
        );
    }
    let report = consensus_report(ingested(&records).await).await;

    for c in &report.advanced_consensuses {
        for score in [
            c.weighted_confidence,
            c.temporal_stability,
            c.authority_backing,
            c.cross_validation_score,
        ] {
            assert!((0.0..=1.0).contains(&score), "{}: {}", c.concept_key, score);
        }
        assert!(c.consensus_evolution.windows(2).all(|w| w[0].date <= w[1].date));
        assert_eq!(c.consensus_evolution.len(), c.definitions.len());
    }
}
