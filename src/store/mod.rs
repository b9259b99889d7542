// JURADOC Store Layer - interfaces the pipeline consumes
// KV with TTL and counters, document/chunk persistence, usage tracking

pub mod documents;
pub mod kv;
pub mod usage;

pub use documents::{ChunkContext, DocumentStore, MemoryDocumentStore};
pub use kv::{KvStore, MemoryKv};
pub use usage::{QuotaConfig, QuotaExceeded, UsageKind, UsageTracker};

/// Errors from the backing stores. The pipeline treats these as transient;
/// clients retry once internally before surfacing.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key-value store error: {0}")]
    Kv(String),

    #[error("document store error: {0}")]
    Documents(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("wrong value type for key: {0}")]
    WrongType(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
