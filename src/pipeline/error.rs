//! Pipeline error taxonomy

use super::cancel::Cancelled;
use crate::config::ConfigError;
use crate::ingest::{CollectorError, IngestError};
use crate::integrate::IntegrationError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid provenance: {0}")]
    InvalidProvenance(String),

    #[error("malformed atom: {0}")]
    MalformedAtom(String),

    #[error("store read failure on {name}: {reason}")]
    StoreReadFailure { name: String, reason: String },

    #[error("store write failure: {0}")]
    StoreWriteFailure(#[source] StoreError),

    #[error("computation failure for '{concept}': {reason}")]
    ComputationFailure { concept: String, reason: String },

    #[error("integration failure: {0}")]
    IntegrationFailure(#[from] IntegrationError),

    #[error("run cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Fatal errors stop the run; the rest are recovered within a stage.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StoreWriteFailure(_) | Self::IntegrationFailure(_) | Self::Config(_)
        )
    }
}

impl From<Cancelled> for PipelineError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl From<IngestError> for PipelineError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::InvalidProvenance { field, reason } => {
                Self::InvalidProvenance(format!("{}: {}", field, reason))
            }
            IngestError::MalformedAtom(reason) => Self::MalformedAtom(reason),
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Read { name, source } => Self::StoreReadFailure {
                name,
                reason: source.to_string(),
            },
            StoreError::Parse { name, source } => Self::StoreReadFailure {
                name,
                reason: source.to_string(),
            },
            // Lock contention counts as a write failure: the run cannot own the directory.
            other => Self::StoreWriteFailure(other),
        }
    }
}

impl From<CollectorError> for PipelineError {
    fn from(err: CollectorError) -> Self {
        match err {
            CollectorError::Io { path, source } => Self::StoreReadFailure {
                name: path.display().to_string(),
                reason: source.to_string(),
            },
            CollectorError::Parse { path, source } => Self::StoreReadFailure {
                name: path.display().to_string(),
                reason: source.to_string(),
            },
            CollectorError::Cancelled => Self::Cancelled,
        }
    }
}
