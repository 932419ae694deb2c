//! Batched text embedding with unit-norm output.
//!
//! The embedder is a thin, order-preserving batching layer over the LLM
//! backend's embedding endpoint. Upstream calls carry at most `batch_size`
//! inputs (default 20) and run sequentially to respect rate limits. Any batch
//! failure fails the whole call; the ingest pipeline degrades by substituting
//! zero vectors, which the clusterer then excludes from similarity.

use crate::llm::{Llm, LlmError};
use crate::utils::l2_normalize;
use thiserror::Error;
use tracing::{debug, instrument};

/// Default number of texts per upstream embedding call.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Embedding failures.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// No embedding backend is configured; callers may degrade to
    /// keyword-only clustering.
    #[error("no embedding backend configured")]
    Unavailable,
    #[error("embedding backend error: {0}")]
    Backend(#[from] LlmError),
    /// The backend returned a vector of the wrong width.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Order-preserving batch embedder over an [`Llm`] backend.
#[derive(Debug)]
pub struct Embedder<'a, L> {
    llm: &'a L,
    batch_size: usize,
    dimension: usize,
}

impl<'a, L: Llm> Embedder<'a, L> {
    /// Create an embedder for a model with the given output dimension.
    pub fn new(llm: &'a L, dimension: usize) -> Self {
        Self {
            llm,
            batch_size: DEFAULT_BATCH_SIZE,
            dimension,
        }
    }

    /// Override the per-call batch size (must be at least 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// The fallback vector used for articles whose embedding failed.
    pub fn zero_vector(&self) -> Vec<f32> {
        vec![0.0; self.dimension]
    }

    /// Embed all texts, preserving input order across batch boundaries.
    ///
    /// Each returned vector is scaled to unit L2 norm. Fails on the first
    /// batch error; partial results are discarded.
    #[instrument(level = "info", skip_all, fields(texts = texts.len(), batch_size = self.batch_size))]
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if !self.llm.has_embeddings() {
            return Err(EmbedError::Unavailable);
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let batch = self.llm.embed(chunk).await?;
            for mut v in batch {
                if v.len() != self.dimension {
                    return Err(EmbedError::DimensionMismatch {
                        expected: self.dimension,
                        got: v.len(),
                    });
                }
                l2_normalize(&mut v);
                vectors.push(v);
            }
        }
        debug!(count = vectors.len(), "Embedded texts");
        Ok(vectors)
    }
}
