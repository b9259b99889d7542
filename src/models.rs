// JURADOC Core Models - documents, chunks, retrieval and usage records
// Shared data structures across the ingest and query pipelines

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Lifecycle state of an uploaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Active,
    Archived,
    Deleted,
}

/// Document metadata record. Identity is (user_id, doc_hash); `id` is the
/// stable handle handed back to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub doc_hash: String,
    pub file_size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
    pub version: u32,
    pub status: DocumentStatus,
}

/// Kinds of document chunks produced by the hierarchical parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Section,
    Subsection,
    Paragraph,
    Clause,
}

/// A section of a document. Chunks of one document form a forest via
/// `parent_id`; `section_id` is unique within the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub section_id: String,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub chunk_type: ChunkType,
    pub position: i64,
    pub metadata: serde_json::Value,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

/// Result from vector search with one-hop hierarchical context attached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: Uuid,
    pub section_id: String,
    pub content: String,
    pub similarity: f32,
    pub parent_content: Option<String>,
    pub sibling_contents: Vec<String>,
}

/// Single citation reference resolved from a generated answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub section_id: String,
    pub content: String,
    pub confidence: f32,
    pub chunk_id: Uuid,
}

/// Detected PII span before substitution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiEntity {
    pub entity_type: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
}

/// Per-user monthly usage bucket
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUsage {
    pub user_id: Uuid,
    pub month: String,
    pub tokens_used: i64,
    pub queries_count: i64,
    pub documents_indexed: i64,
}

/// Query audit log entry, written best-effort after each query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryLog {
    pub id: Uuid,
    pub document_id: Uuid,
    pub query_hash: String,
    pub response_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub latency_ms: Option<u64>,
    pub tokens_used: Option<u64>,
    pub model_version: Option<String>,
    pub citations_count: Option<usize>,
    pub confidence_score: Option<f32>,
}

impl Document {
    pub fn new(user_id: Uuid, filename: &str, doc_hash: &str, size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            filename: filename.to_string(),
            doc_hash: doc_hash.to_string(),
            file_size_bytes: size,
            uploaded_at: Utc::now(),
            metadata: serde_json::Value::Object(Default::default()),
            version: 1,
            status: DocumentStatus::Active,
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = serde_json::Value::Object(metadata.into_iter().collect());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_defaults() {
        let user = Uuid::new_v4();
        let doc = Document::new(user, "vertrag.pdf", "abc123", 1024);

        assert_eq!(doc.user_id, user);
        assert_eq!(doc.version, 1);
        assert_eq!(doc.status, DocumentStatus::Active);
        assert!(doc.metadata.is_object());
    }

    #[test]
    fn test_chunk_type_serialization() {
        let json = serde_json::to_string(&ChunkType::Subsection).unwrap();
        assert_eq!(json, "\"subsection\"");

        let back: ChunkType = serde_json::from_str("\"clause\"").unwrap();
        assert_eq!(back, ChunkType::Clause);
    }
}
