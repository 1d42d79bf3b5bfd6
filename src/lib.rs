//! Semantic Consensus Engine
//!
//! An attribution-preserving pipeline that fuses "semantic atoms" (a
//! concept, a definition and full provenance) from heterogeneous sources
//! into an authority-weighted consensus view.
//!
//! # Core Concepts
//!
//! - **Atoms**: one definition of one concept from one source, with provenance
//! - **Consensus**: per-concept weighted confidence, stability, authority
//!   backing and cross-validation, with conflict resolution by voting
//! - **Convergence**: catalog patterns recurring across source domains
//! - **Emergence**: concept timelines across historical and modern periods
//! - **Unified store**: every component's output merged under architectural
//!   layers, with a composite health score
//!
//! # Example
//!
//! ```no_run
//! use semantic_consensus::config::Config;
//! use semantic_consensus::pipeline::{Pipeline, PipelineContext};
//! use semantic_consensus::store::JsonDirStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = JsonDirStore::open("stores")?;
//! let ctx = PipelineContext::new(Arc::new(store), Config::default());
//! let run = Pipeline::standard().run(&ctx).await?;
//! println!("{} stages", run.reports.len());
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod atom;
pub mod authority;
pub mod config;
pub mod consensus;
pub mod index;
pub mod ingest;
pub mod integrate;
pub mod pipeline;
pub mod store;

pub use atom::{Agent, AgentType, ProvenanceRecord, SemanticAtom, SourceType};
pub use config::{Config, ConfigError};
pub use pipeline::{Pipeline, PipelineContext, PipelineError, StageReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
