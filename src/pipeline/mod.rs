//! Pipeline driver
//!
//! A run chains six stages in a fixed order:
//!
//! 1. **ingest**: collector output validated into `<source_type>_semantic_store.json`
//! 2. **index**: source stores loaded into the in-memory concept index
//! 3. **authority**: per-agent authority profiles
//! 4. **consensus**: `multi_source_consensus_analysis.json`
//! 5. **analyze**: temporal emergence and convergence reports
//! 6. **integrate**: `panini_unified_architecture_<timestamp>.json`
//!
//! Stages share nothing but the [`PipelineContext`] and the artifact store.
//! Per-atom and per-concept failures are recovered inside a stage and show
//! up in its [`StageReport`]; the first fatal error stops the run.

mod cancel;
mod error;
mod stages;

pub use cancel::{CancellationToken, Cancelled};
pub use error::PipelineError;
pub use stages::{
    AnalysisStage, AuthorityStage, ConsensusStage, IndexStage, IngestStage, IntegrateStage,
};

use crate::config::Config;
use crate::consensus::{default_detector, ConflictDetector};
use crate::ingest::Collector;
use crate::store::ArtifactStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Everything a stage may read: the store, configuration, collectors and
/// the conflict detector. Stages never hold state of their own.
pub struct PipelineContext {
    pub store: Arc<dyn ArtifactStore>,
    pub config: Config,
    pub cancel: CancellationToken,
    /// Timestamp stamped on every artifact written by this run
    pub run_at: DateTime<Utc>,
    pub collectors: Vec<Box<dyn Collector>>,
    pub detector: Box<dyn ConflictDetector>,
}

impl PipelineContext {
    pub fn new(store: Arc<dyn ArtifactStore>, config: Config) -> Self {
        let detector = default_detector(&config.consensus);
        Self {
            store,
            config,
            cancel: CancellationToken::new(),
            run_at: Utc::now(),
            collectors: Vec::new(),
            detector,
        }
    }

    pub fn with_collector(mut self, collector: Box<dyn Collector>) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn with_detector(mut self, detector: Box<dyn ConflictDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_run_at(mut self, run_at: DateTime<Utc>) -> Self {
        self.run_at = run_at;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// What a stage did, for the human summary on stdout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub processed: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub warnings: usize,
    /// Artifacts written, in write order
    pub written: Vec<String>,
    /// Recovered failures, one line each
    pub issues: Vec<String>,
    pub summary: String,
}

impl StageReport {
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            ..Self::default()
        }
    }

    pub fn issue(&mut self, err: &PipelineError) {
        self.issues.push(err.to_string());
    }
}

/// A pipeline stage.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    /// Run to completion. `Err` only for failures the stage cannot recover from.
    async fn run(&self, ctx: &PipelineContext) -> Result<StageReport, PipelineError>;
}

/// Result of a full run.
#[derive(Debug, Default)]
pub struct PipelineRun {
    pub reports: Vec<StageReport>,
    /// Non-fatal stage errors, keyed by stage name
    pub recovered: Vec<(String, PipelineError)>,
}

impl PipelineRun {
    pub fn rejected(&self) -> usize {
        self.reports.iter().map(|r| r.rejected).sum()
    }
}

/// An ordered list of stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn empty() -> Self {
        Self { stages: Vec::new() }
    }

    /// AIA → CI → AP → CR → CEA → UI
    pub fn standard() -> Self {
        Self::empty()
            .with_stage(Box::new(IngestStage))
            .with_stage(Box::new(IndexStage))
            .with_stage(Box::new(AuthorityStage))
            .with_stage(Box::new(ConsensusStage))
            .with_stage(Box::new(AnalysisStage))
            .with_stage(Box::new(IntegrateStage))
    }

    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order, stopping at the first fatal error or cancellation.
    pub async fn run(&self, ctx: &PipelineContext) -> Result<PipelineRun, PipelineError> {
        let mut run = PipelineRun::default();
        for stage in &self.stages {
            ctx.cancel.check()?;
            tracing::info!(stage = stage.name(), "stage started");
            match stage.run(ctx).await {
                Ok(report) => {
                    tracing::info!(
                        stage = stage.name(),
                        summary = %report.summary,
                        "stage finished"
                    );
                    run.reports.push(report);
                }
                Err(err) if err.is_fatal() || matches!(err, PipelineError::Cancelled) => {
                    tracing::error!(stage = stage.name(), error = %err, "stage failed");
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(stage = stage.name(), error = %err, "stage recovered");
                    run.recovered.push((stage.name().to_string(), err));
                }
            }
        }
        Ok(run)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}
