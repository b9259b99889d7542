// JURADOC - Legal document analysis pipeline
// Hybrid embedded-text/OCR extraction, reversible PII anonymization,
// hierarchical vector retrieval and cited-answer verification

pub mod config;
pub mod document;
pub mod embedding;
pub mod index;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod pii;
pub mod pipeline;
pub mod processing;
pub mod store;
pub mod verification;

pub use config::Settings;
pub use document::{FileClassifier, FileKind, TextLayerQuality};
pub use embedding::{E5Config, E5Embedder, TextEmbedder};
pub use index::{
    MemoryVectorIndex, QdrantRestClient, QdrantRestConfig, Retriever, RetrieverConfig, VectorIndex,
};
pub use llm::{
    FactChecker, GenerationClient, GenerationConfig, Generator, LocalVerifier, LocalVerifierConfig,
};
pub use models::{Chunk, ChunkType, Citation, Document, DocumentStatus, RetrievalResult};
pub use ocr::{OcrWorker, OcrWorkerClient, OcrWorkerConfig, TextMerger};
pub use pii::PiiAnonymizer;
pub use pipeline::{IngestReport, Pipeline, PipelineDeps, PipelineError, QueryResponse};
pub use processing::DocumentParser;
pub use store::{
    DocumentStore, KvStore, MemoryDocumentStore, MemoryKv, QuotaConfig, UsageTracker,
};
pub use verification::Verifier;

/// Initialize tracing with an env-filter (`JURADOC_LOG`, falling back to
/// `info`). Call once at process startup.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("JURADOC_LOG")
        .unwrap_or_else(|_| EnvFilter::new("juradoc=info,warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
