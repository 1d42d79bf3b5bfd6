//! The six pipeline stages
//!
//! Each stage reads what earlier stages left in the store, computes
//! synchronously, and writes its own artifact atomically at the end.
//! Index and authority results are in-memory only; later stages rebuild
//! them from the source stores.

use super::{PipelineContext, PipelineError, Stage, StageReport};
use crate::analysis::{analyze_convergences, analyze_emergence, ConvergenceReport, TemporalReport};
use crate::authority::{profile_agents, AuthorityProfiles};
use crate::consensus::{ConsensusReport, ConsensusResolver};
use crate::index::{load_sources, ConceptIndex, LoadFailure};
use crate::ingest::{merge_atoms, AtomIngestor, Collector, IngestBatch};
use crate::integrate::{integrate, IntegrationInputs};
use crate::store::{self, SourceStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

/// Every readable source store, indexed.
struct LoadedIndex {
    index: ConceptIndex,
    failures: Vec<LoadFailure>,
    /// Latest `collection_date` among the loaded stores; the epoch when none loaded.
    ///
    /// Derived artifacts are stamped with this rather than the wall clock,
    /// so the same stores always produce the same bytes.
    collected_at: DateTime<Utc>,
}

/// Load every source store and index it.
async fn load_index(
    ctx: &PipelineContext,
    report: &mut StageReport,
) -> Result<LoadedIndex, PipelineError> {
    let loaded = load_sources(ctx.store.as_ref(), &ctx.cancel).await?;
    ctx.cancel.check()?;
    let failures = loaded.failures;
    for failure in &failures {
        report.issue(&PipelineError::StoreReadFailure {
            name: failure.name.clone(),
            reason: failure.error.to_string(),
        });
    }
    let collected_at = loaded
        .stores
        .iter()
        .map(|(_, s)| s.collection_metadata.collection_date)
        .max()
        .unwrap_or_default();
    let index = ConceptIndex::build(
        loaded.stores.into_iter().map(|(t, s)| (t, s.semantic_atoms)),
        &ctx.config.priors,
    );
    Ok(LoadedIndex {
        index,
        failures,
        collected_at,
    })
}

async fn load_profiles(
    ctx: &PipelineContext,
    report: &mut StageReport,
) -> Result<(LoadedIndex, AuthorityProfiles), PipelineError> {
    let loaded = load_index(ctx, report).await?;
    let profiles = profile_agents(&loaded.index, &ctx.config.authority);
    Ok((loaded, profiles))
}

/// Atom Ingestion Adapter: validate collector output into source stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestStage;

impl IngestStage {
    async fn ingest_one(
        &self,
        ctx: &PipelineContext,
        collector: &dyn Collector,
        report: &mut StageReport,
    ) -> Result<(), PipelineError> {
        let source_type = collector.source_type();
        let raws = match collector.collect(&ctx.cancel).await {
            Ok(raws) => raws,
            Err(err) => {
                let err = PipelineError::from(err);
                if matches!(err, PipelineError::Cancelled) {
                    return Err(err);
                }
                tracing::warn!(%source_type, error = %err, "collector failed");
                report.issue(&err);
                return Ok(());
            }
        };

        let ingestor = AtomIngestor::new(source_type, ctx.config.ingest.definition_byte_cap);
        let mut batch = IngestBatch::default();
        for (i, raw) in raws.iter().enumerate() {
            ctx.cancel.check()?;
            batch.push(i, ingestor.ingest(raw));
        }
        report.rejected += batch.rejected.len();
        report.warnings += batch.warnings.len();
        for rejection in &batch.rejected {
            let err = PipelineError::from(rejection.error.clone());
            report.issues.push(format!("{} record {}: {}", source_type, rejection.index, err));
        }
        if batch.accepted.is_empty() {
            return Ok(());
        }

        let name = store::source_store_file(source_type);
        let existing = match store::load_json::<SourceStore>(ctx.store.as_ref(), &name).await {
            Ok(found) => found.map(|s| s.semantic_atoms).unwrap_or_default(),
            Err(err) => {
                // Never overwrite a store we could not read.
                let err = PipelineError::from(err);
                tracing::warn!(%name, error = %err, "leaving unreadable store untouched");
                report.issue(&err);
                return Ok(());
            }
        };
        let accepted = batch.accepted.len();
        let source = SourceStore::new(
            collector.agent().clone(),
            ctx.run_at,
            merge_atoms(existing, batch.accepted),
        );
        ctx.cancel.check()?;
        store::save_json(ctx.store.as_ref(), &name, &source).await?;
        tracing::info!(
            %name,
            accepted,
            total = source.semantic_atoms.len(),
            "source store written"
        );
        report.processed += accepted;
        report.written.push(name);
        Ok(())
    }
}

#[async_trait]
impl Stage for IngestStage {
    fn name(&self) -> &str {
        "ingest"
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageReport, PipelineError> {
        let mut report = StageReport::new(self.name());
        for collector in &ctx.collectors {
            ctx.cancel.check()?;
            self.ingest_one(ctx, collector.as_ref(), &mut report).await?;
        }
        report.summary = format!(
            "{} atoms accepted, {} rejected, {} warnings across {} collectors",
            report.processed,
            report.rejected,
            report.warnings,
            ctx.collectors.len()
        );
        Ok(report)
    }
}

/// Concept Index: load all source stores and report index statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexStage;

#[async_trait]
impl Stage for IndexStage {
    fn name(&self) -> &str {
        "index"
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageReport, PipelineError> {
        let mut report = StageReport::new(self.name());
        let index = load_index(ctx, &mut report).await?.index;
        let summary = index.summary();
        report.processed = summary.atoms;
        report.skipped = summary.duplicates;
        report.summary = format!(
            "{} atoms, {} concepts, {} agents, {} sources, {} duplicate ids",
            summary.atoms, summary.concepts, summary.agents, summary.sources, summary.duplicates
        );
        tracing::info!(atoms = summary.atoms, concepts = summary.concepts, "index built");
        Ok(report)
    }
}

/// Authority Profiler: profile every sufficiently active agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorityStage;

#[async_trait]
impl Stage for AuthorityStage {
    fn name(&self) -> &str {
        "authority"
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageReport, PipelineError> {
        let mut report = StageReport::new(self.name());
        let (loaded, profiles) = load_profiles(ctx, &mut report).await?;
        let agents = loaded.index.agents().count();
        report.processed = profiles.len();
        report.skipped = agents - profiles.len();
        report.summary = format!(
            "{} of {} agents profiled (minimum {} atoms)",
            profiles.len(),
            agents,
            ctx.config.authority.min_atoms
        );
        for profile in profiles.values() {
            tracing::debug!(
                agent = %profile.agent_id,
                accuracy = profile.historical_accuracy,
                reliability = profile.source_reliability,
                "authority profile"
            );
        }
        Ok(report)
    }
}

/// Consensus Resolver: writes the multi-source consensus report.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsensusStage;

impl ConsensusStage {
    pub async fn compute(
        &self,
        ctx: &PipelineContext,
        report: &mut StageReport,
    ) -> Result<ConsensusReport, PipelineError> {
        let (loaded, profiles) = load_profiles(ctx, report).await?;
        let resolver = ConsensusResolver::new(&ctx.config.consensus, ctx.detector.as_ref());
        let mut consensus =
            resolver.build_report(&loaded.index, profiles, loaded.collected_at, &ctx.cancel)?;
        consensus.metadata.unreadable_stores =
            loaded.failures.into_iter().map(|f| f.name).collect();
        Ok(consensus)
    }
}

#[async_trait]
impl Stage for ConsensusStage {
    fn name(&self) -> &str {
        "consensus"
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageReport, PipelineError> {
        let mut report = StageReport::new(self.name());
        let consensus = self.compute(ctx, &mut report).await?;
        for skipped in &consensus.metadata.skipped {
            report.issue(&PipelineError::ComputationFailure {
                concept: skipped.concept.clone(),
                reason: skipped.reason.clone(),
            });
        }
        ctx.cancel.check()?;
        store::save_json(ctx.store.as_ref(), store::CONSENSUS_FILE, &consensus).await?;

        let meta = &consensus.metadata;
        report.processed = meta.analyzed_concepts;
        report.skipped = meta.skipped_concepts;
        report.written.push(store::CONSENSUS_FILE.to_string());
        report.summary = format!(
            "{} concepts resolved, {} conflicts, {} skipped, {} authority profiles",
            meta.analyzed_concepts,
            meta.conflicts_detected,
            meta.skipped_concepts,
            meta.authority_profiles
        );
        Ok(report)
    }
}

/// Convergence and Emergence Analyzer: writes the temporal and convergence reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisStage;

#[async_trait]
impl Stage for AnalysisStage {
    fn name(&self) -> &str {
        "analyze"
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageReport, PipelineError> {
        let mut report = StageReport::new(self.name());
        let LoadedIndex {
            index,
            collected_at,
            ..
        } = load_index(ctx, &mut report).await?;
        let config = &ctx.config;
        let convergence =
            analyze_convergences(&index, &config.convergence, collected_at, &ctx.cancel)?;
        let temporal = analyze_emergence(&index, &config.emergence, collected_at, &ctx.cancel)?;

        ctx.cancel.check()?;
        store::save_json(ctx.store.as_ref(), store::TEMPORAL_FILE, &temporal).await?;
        store::save_json(ctx.store.as_ref(), store::CONVERGENCE_FILE, &convergence).await?;

        report.processed = index.len();
        report.written.push(store::TEMPORAL_FILE.to_string());
        report.written.push(store::CONVERGENCE_FILE.to_string());
        report.summary = format!(
            "{} convergences ({} strong), {} concept evolutions",
            convergence.convergence_analysis.len(),
            convergence.strong_convergences.len(),
            temporal.concept_evolutions.len()
        );
        Ok(report)
    }
}

/// Unified Integrator: writes a timestamped unified architecture store.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrateStage;

impl IntegrateStage {
    /// A missing or unreadable input counts as absent.
    async fn load_input<T: DeserializeOwned>(
        ctx: &PipelineContext,
        name: &str,
        report: &mut StageReport,
    ) -> Option<T> {
        match store::load_json::<T>(ctx.store.as_ref(), name).await {
            Ok(found) => found,
            Err(err) => {
                let err = PipelineError::from(err);
                tracing::warn!(%name, error = %err, "ignoring unreadable integration input");
                report.issue(&err);
                None
            }
        }
    }
}

#[async_trait]
impl Stage for IntegrateStage {
    fn name(&self) -> &str {
        "integrate"
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageReport, PipelineError> {
        let mut report = StageReport::new(self.name());
        let consensus: Option<ConsensusReport> =
            Self::load_input(ctx, store::CONSENSUS_FILE, &mut report).await;
        let temporal: Option<TemporalReport> =
            Self::load_input(ctx, store::TEMPORAL_FILE, &mut report).await;
        let convergence: Option<ConvergenceReport> =
            Self::load_input(ctx, store::CONVERGENCE_FILE, &mut report).await;
        let inputs = IntegrationInputs {
            consensus,
            temporal,
            convergence,
        };
        let unified = integrate(&inputs, &ctx.config.integration, ctx.run_at)?;

        ctx.cancel.check()?;
        let name = store::architecture_file(&ctx.run_at);
        store::save_json(ctx.store.as_ref(), &name, &unified).await?;

        let meta = &unified.integration_metadata;
        report.processed = meta.total_atoms;
        report.written.push(name);
        report.summary = format!(
            "{} unified atoms, {} convergences, health {:.1} ({:?})",
            meta.total_atoms, meta.total_convergences, meta.health_score, meta.health_status
        );
        Ok(report)
    }
}
