// JURADOC Pipeline Module - error taxonomy and the two top-level flows
// Ingest: classify → extract → merge → parse → persist → index
// Query: anonymize → retrieve → generate → de-anonymize → verify

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod orchestrator;

pub use orchestrator::{Pipeline, PipelineDeps};

use crate::document::{ExtractError, FileKind};
use crate::index::IndexError;
use crate::llm::GenerationError;
use crate::models::Citation;
use crate::ocr::MergeReport;
use crate::pii::PiiError;
use crate::store::{QuotaExceeded, StoreError};

/// Pipeline-level error taxonomy. The comments note the HTTP class an
/// outer transport layer would map each kind to.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 400-class
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// 400-class
    #[error("corrupt input: {0}")]
    CorruptInput(String),

    /// 404-class
    #[error("document not found: {0}")]
    DocumentNotFound(Uuid),

    /// 429-class
    #[error(transparent)]
    Quota(#[from] QuotaExceeded),

    /// 502-class, surfaced with the request id after retries
    #[error("generation failed (request {request_id}): {source}")]
    Generation {
        request_id: String,
        source: GenerationError,
    },

    /// 503-class
    #[error("storage unavailable: {0}")]
    StoreUnavailable(String),

    /// 500-class
    #[error("internal pipeline error: {0}")]
    Internal(String),
}

impl From<ExtractError> for PipelineError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::UnknownFormat(name) => PipelineError::UnsupportedFormat(name),
            ExtractError::Corrupt { kind, detail } => {
                PipelineError::CorruptInput(format!("{kind}: {detail}"))
            }
            ExtractError::Rendering(detail) => PipelineError::Internal(detail),
            ExtractError::Io(e) => PipelineError::Internal(e.to_string()),
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        PipelineError::StoreUnavailable(e.to_string())
    }
}

impl From<IndexError> for PipelineError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::Embedding(e) => PipelineError::Internal(e.to_string()),
            other => PipelineError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<PiiError> for PipelineError {
    fn from(e: PiiError) -> Self {
        PipelineError::StoreUnavailable(e.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Outcome of a document ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: Uuid,
    pub chunks_created: usize,
    /// True when the upload matched an existing ACTIVE document.
    pub deduplicated: bool,
    pub file_kind: FileKind,
    pub language: Option<String>,
    pub page_count: usize,
    pub merge: Option<MergeReport>,
}

/// Assembled answer of a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub confidence: f32,
    pub unsupported_claims: Vec<String>,
    pub request_id: String,
    pub metadata: serde_json::Value,
}
