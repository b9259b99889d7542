// JURADOC Embedding Module - fixed-dimension text vectors for chunks/queries
// The model is process-global: one heavy initialization, shared read-only

use async_trait::async_trait;

pub mod e5;

pub use e5::{E5Config, E5Embedder};

/// Errors from embedding initialization and inference.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedder initialization failed: {0}")]
    Init(String),

    #[error("embedding inference failed: {0}")]
    Inference(String),
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Contract for text embedders. Vectors are L2-normalized so cosine
/// similarity equals the dot product; the query/document distinction
/// (model-specific prefixes) is handled behind this trait, not by callers.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Vector dimension, discovered at initialization and invariant for
    /// the lifetime of the index.
    fn dimension(&self) -> usize;

    /// Embed query-side text.
    async fn embed_query(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Embed document-side text.
    async fn embed_passage(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Batched document-side embedding, order-preserving.
    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_passage(text).await?);
        }
        Ok(out)
    }
}

/// Mean-pool token vectors and L2-normalize the result.
pub(crate) fn mean_pool_and_normalize(rows: &[Vec<f32>], dimension: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; dimension];
    if rows.is_empty() {
        return pooled;
    }

    for row in rows {
        for (target, value) in pooled.iter_mut().zip(row.iter()) {
            *target += value;
        }
    }
    let count = rows.len() as f32;
    for value in &mut pooled {
        *value /= count;
    }

    let norm: f32 = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut pooled {
            *value /= norm;
        }
    }
    pooled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_pool_and_normalize() {
        let rows = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]];
        let pooled = mean_pool_and_normalize(&rows, 3);

        // Mean is (0.5, 0.5, 0.0); normalized to unit length
        let norm: f32 = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
        assert!((pooled[0] - pooled[1]).abs() < 1e-6);
        assert_eq!(pooled[2], 0.0);
    }

    #[test]
    fn test_empty_rows_zero_vector() {
        let pooled = mean_pool_and_normalize(&[], 4);
        assert_eq!(pooled, vec![0.0; 4]);
    }
}
