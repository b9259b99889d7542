// JURADOC Index Module - vector store client and retrieval layer
// Upsert chunks, cosine top-k with document filter, hierarchical expansion

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod memory;
pub mod qdrant_rest;
pub mod retriever;

pub use memory::MemoryVectorIndex;
pub use qdrant_rest::{QdrantRestClient, QdrantRestConfig};
pub use retriever::{Retriever, RetrieverConfig};

use crate::embedding::EmbeddingError;
use crate::models::ChunkType;
use crate::store::StoreError;

/// Payload stored with each vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub document_id: Uuid,
    pub section_id: String,
    pub chunk_type: ChunkType,
    pub position: i64,
    pub parent_id: Option<Uuid>,
}

/// A point to upsert: chunk id, unit-norm vector, payload.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// A search hit with its similarity in [0, 1].
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: Uuid,
    pub score: f32,
    pub payload: ChunkPayload,
}

/// Errors from the retrieval path.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("vector store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid vector store response: {0}")]
    InvalidResponse(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type IndexResult<T> = Result<T, IndexError>;

/// Contract of the vector store.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the cosine collection if missing; existing collections with
    /// the same name are accepted.
    async fn ensure_collection(&self, dimension: usize) -> IndexResult<()>;

    /// Upsert points by id.
    async fn upsert(&self, points: Vec<VectorPoint>) -> IndexResult<()>;

    /// Top-k cosine search filtered to one document. Results come back in
    /// descending score order.
    async fn search(
        &self,
        vector: Vec<f32>,
        document_id: Uuid,
        top_k: usize,
    ) -> IndexResult<Vec<ScoredPoint>>;

    /// Remove every point of a document.
    async fn delete_document(&self, document_id: Uuid) -> IndexResult<()>;
}
