// JURADOC Document Store - documents, chunks and query logs
// Trait over the relational store; in-memory implementation for dev/tests

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use uuid::Uuid;

use super::{StoreError, StoreResult};
use crate::models::{Chunk, Document, DocumentStatus, QueryLog};

/// One chunk with its one-hop hierarchical context: parent (if any) and
/// immediate siblings ordered by position.
#[derive(Debug, Clone)]
pub struct ChunkContext {
    pub target: Chunk,
    pub parent: Option<Chunk>,
    pub siblings: Vec<Chunk>,
}

/// Persistence contract for documents and their chunks. A document
/// exclusively owns its chunks; deleting the document cascades.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(&self, doc: Document) -> StoreResult<()>;

    /// Dedup lookup: ACTIVE document of this user with this content hash.
    async fn find_active_by_hash(&self, user_id: Uuid, doc_hash: &str)
        -> StoreResult<Option<Document>>;

    async fn get_document(&self, id: Uuid) -> StoreResult<Option<Document>>;

    /// Soft-delete transition; `Deleted` cascades to the owned chunks.
    async fn set_status(&self, id: Uuid, status: DocumentStatus) -> StoreResult<()>;

    async fn insert_chunks(&self, chunks: Vec<Chunk>) -> StoreResult<()>;

    async fn chunks_by_document(&self, document_id: Uuid) -> StoreResult<Vec<Chunk>>;

    /// Batch context expansion: single round-trip returning target, parent
    /// and siblings per requested chunk. Avoids N+1 lookups at query time.
    async fn context_batch(&self, chunk_ids: &[Uuid])
        -> StoreResult<HashMap<Uuid, ChunkContext>>;

    async fn log_query(&self, log: QueryLog) -> StoreResult<()>;
}

/// In-memory document store backed by concurrent maps.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: DashMap<Uuid, Document>,
    chunks: DashMap<Uuid, Chunk>,
    query_logs: DashMap<Uuid, QueryLog>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn document_chunks(&self, document_id: Uuid) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = self
            .chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .map(|c| c.clone())
            .collect();
        chunks.sort_by_key(|c| c.position);
        chunks
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert_document(&self, doc: Document) -> StoreResult<()> {
        self.documents.insert(doc.id, doc);
        Ok(())
    }

    async fn find_active_by_hash(
        &self,
        user_id: Uuid,
        doc_hash: &str,
    ) -> StoreResult<Option<Document>> {
        Ok(self
            .documents
            .iter()
            .find(|d| {
                d.user_id == user_id && d.doc_hash == doc_hash && d.status == DocumentStatus::Active
            })
            .map(|d| d.clone()))
    }

    async fn get_document(&self, id: Uuid) -> StoreResult<Option<Document>> {
        Ok(self.documents.get(&id).map(|d| d.clone()))
    }

    async fn set_status(&self, id: Uuid, status: DocumentStatus) -> StoreResult<()> {
        let mut doc = self
            .documents
            .get_mut(&id)
            .ok_or_else(|| StoreError::Documents(format!("document not found: {id}")))?;
        doc.status = status;
        drop(doc);

        if status == DocumentStatus::Deleted {
            let owned: Vec<Uuid> = self
                .chunks
                .iter()
                .filter(|c| c.document_id == id)
                .map(|c| c.id)
                .collect();
            for chunk_id in owned {
                self.chunks.remove(&chunk_id);
            }
        }
        Ok(())
    }

    async fn insert_chunks(&self, chunks: Vec<Chunk>) -> StoreResult<()> {
        for chunk in chunks {
            self.chunks.insert(chunk.id, chunk);
        }
        Ok(())
    }

    async fn chunks_by_document(&self, document_id: Uuid) -> StoreResult<Vec<Chunk>> {
        Ok(self.document_chunks(document_id))
    }

    async fn context_batch(
        &self,
        chunk_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, ChunkContext>> {
        let mut out = HashMap::new();
        if chunk_ids.is_empty() {
            return Ok(out);
        }

        for &chunk_id in chunk_ids {
            let Some(target) = self.chunks.get(&chunk_id).map(|c| c.clone()) else {
                continue;
            };

            let parent = target
                .parent_id
                .and_then(|pid| self.chunks.get(&pid).map(|c| c.clone()));

            let mut siblings: Vec<Chunk> = self
                .chunks
                .iter()
                .filter(|c| {
                    c.document_id == target.document_id
                        && c.parent_id == target.parent_id
                        && c.id != target.id
                })
                .map(|c| c.clone())
                .collect();
            siblings.sort_by_key(|c| c.position);

            out.insert(chunk_id, ChunkContext { target, parent, siblings });
        }
        Ok(out)
    }

    async fn log_query(&self, log: QueryLog) -> StoreResult<()> {
        self.query_logs.insert(log.id, log);
        Ok(())
    }
}
