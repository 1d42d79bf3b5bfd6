//! Embedding-backed conflict detection (v2)
//!
//! Definitions are embedded with an [`Embedder`] and compared pairwise;
//! any pair below the similarity threshold is a conflict. Production code
//! can use fastembed (feature `embeddings`); tests use mock embedders.

use super::conflict::{ConflictDetector, ConsensusError};
use crate::index::IndexedAtom;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmbeddingError {
    #[error("embedding returned no results")]
    EmptyResult,

    #[error("embedding model error: {0}")]
    ModelError(String),

    #[error("embedding returned {got} vectors for {expected} texts")]
    CountMismatch { expected: usize, got: usize },
}

/// Embeds text into vectors.
pub trait Embedder: Send + Sync {
    /// One vector per text, in order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

#[cfg(feature = "embeddings")]
mod fastembed_impl {
    use super::{Embedder, EmbeddingError};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// Embedder backed by fastembed (ONNX Runtime).
    ///
    /// `TextEmbedding::embed` needs `&mut self`, hence the mutex.
    pub struct FastEmbedEmbedder {
        model: Mutex<TextEmbedding>,
    }

    impl FastEmbedEmbedder {
        pub fn new(model: EmbeddingModel) -> Result<Self, EmbeddingError> {
            let options = InitOptions::new(model).with_show_download_progress(false);
            let embedding = TextEmbedding::try_new(options)
                .map_err(|e| EmbeddingError::ModelError(e.to_string()))?;
            Ok(Self {
                model: Mutex::new(embedding),
            })
        }

        pub fn default_model() -> Result<Self, EmbeddingError> {
            Self::new(EmbeddingModel::NomicEmbedTextV15)
        }
    }

    impl Embedder for FastEmbedEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let mut model = self
                .model
                .lock()
                .map_err(|_| EmbeddingError::ModelError("embedding model lock poisoned".into()))?;
            let embeddings = model
                .embed(texts.to_vec(), None)
                .map_err(|e| EmbeddingError::ModelError(e.to_string()))?;
            if embeddings.is_empty() {
                return Err(EmbeddingError::EmptyResult);
            }
            Ok(embeddings)
        }
    }
}

#[cfg(feature = "embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;

/// Cosine similarity; 0.0 when either vector is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// v2 detector: conflict when any pair of definitions is less similar
/// than `threshold`.
pub struct EmbeddingConflictDetector {
    embedder: Box<dyn Embedder>,
    threshold: f32,
}

impl EmbeddingConflictDetector {
    pub fn new(embedder: Box<dyn Embedder>, threshold: f32) -> Self {
        Self { embedder, threshold }
    }
}

impl ConflictDetector for EmbeddingConflictDetector {
    fn name(&self) -> &str {
        "embedding_cosine_v2"
    }

    fn are_definitions_conflicting(&self, atoms: &[&IndexedAtom]) -> Result<bool, ConsensusError> {
        if atoms.len() < 2 {
            return Ok(false);
        }
        let texts: Vec<&str> = atoms.iter().map(|a| a.atom.definition.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                got: vectors.len(),
            }
            .into());
        }
        for (i, a) in vectors.iter().enumerate() {
            for b in &vectors[i + 1..] {
                if cosine_similarity(a, b) < self.threshold {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
