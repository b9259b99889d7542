// JURADOC Retriever - embed, search, expand hierarchical context, cache
// Context expansion goes through one batched store round-trip (no N+1)

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ChunkPayload, IndexResult, VectorIndex, VectorPoint};
use crate::embedding::TextEmbedder;
use crate::models::{Chunk, RetrievalResult};
use crate::store::kv::cache_key;
use crate::store::{DocumentStore, KvStore};

/// Retrieval tunables.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub similarity_threshold: f32,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.0,
            cache_enabled: true,
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

/// Embeds and indexes chunks, retrieves top-k with parent/sibling context.
pub struct Retriever {
    embedder: Arc<dyn TextEmbedder>,
    index: Arc<dyn VectorIndex>,
    store: Arc<dyn DocumentStore>,
    kv: Arc<dyn KvStore>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn DocumentStore>,
        kv: Arc<dyn KvStore>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            store,
            kv,
            config,
        }
    }

    /// Embed chunk contents (document side) and upsert into the vector
    /// store. Fills `embedding` on the passed chunks; returns the count.
    pub async fn index_chunks(
        &self,
        document_id: Uuid,
        chunks: &mut [Chunk],
    ) -> IndexResult<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        self.index.ensure_collection(self.embedder.dimension()).await?;

        let mut points = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter_mut().zip(vectors.into_iter()) {
            chunk.embedding = Some(vector.clone());
            points.push(VectorPoint {
                id: chunk.id,
                vector,
                payload: ChunkPayload {
                    document_id,
                    section_id: chunk.section_id.clone(),
                    chunk_type: chunk.chunk_type,
                    position: chunk.position,
                    parent_id: chunk.parent_id,
                },
            });
        }

        let count = points.len();
        self.index.upsert(points).await?;

        info!(document_id = %document_id, chunks = count, "Indexed chunks");
        Ok(count)
    }

    /// Top-k retrieval for one document with parent and sibling context
    /// attached. Results are ordered by descending similarity with ties
    /// broken by position ascending.
    pub async fn retrieve(
        &self,
        document_id: Uuid,
        query_text: &str,
        top_k: usize,
    ) -> IndexResult<Vec<RetrievalResult>> {
        let key = self.query_cache_key(document_id, query_text, top_k);

        if self.config.cache_enabled {
            if let Some(cached) = self.cache_get(&key).await {
                debug!(document_id = %document_id, "Retrieval cache hit");
                return Ok(cached);
            }
        }

        let query_vector = self.embedder.embed_query(query_text).await?;
        let hits = self.index.search(query_vector, document_id, top_k).await?;

        let relevant: Vec<_> = hits
            .into_iter()
            .filter(|h| h.score >= self.config.similarity_threshold)
            .collect();

        // One batched round-trip for target/parent/sibling content
        let chunk_ids: Vec<Uuid> = relevant.iter().map(|h| h.id).collect();
        let contexts = self.store.context_batch(&chunk_ids).await?;

        let mut results: Vec<(RetrievalResult, i64)> = Vec::with_capacity(relevant.len());
        for hit in relevant {
            let Some(context) = contexts.get(&hit.id) else {
                warn!(chunk_id = %hit.id, "Indexed chunk missing from store, skipping");
                continue;
            };

            results.push((
                RetrievalResult {
                    chunk_id: hit.id,
                    section_id: context.target.section_id.clone(),
                    content: context.target.content.clone(),
                    similarity: hit.score,
                    parent_content: context.parent.as_ref().map(|p| p.content.clone()),
                    sibling_contents: context
                        .siblings
                        .iter()
                        .map(|s| s.content.clone())
                        .collect(),
                },
                context.target.position,
            ));
        }

        results.sort_by(|(a, pos_a), (b, pos_b)| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(pos_a.cmp(pos_b))
        });
        let results: Vec<RetrievalResult> = results.into_iter().map(|(r, _)| r).collect();

        if self.config.cache_enabled {
            self.cache_put(&key, &results).await;
        }

        info!(
            document_id = %document_id,
            results = results.len(),
            "Retrieved chunks"
        );
        Ok(results)
    }

    /// Format retrieved chunks into the context block handed to generation.
    /// Each result is prefixed with its section id and relevance percent.
    pub fn format_context(&self, results: &[RetrievalResult]) -> String {
        let mut blocks = Vec::with_capacity(results.len());

        for result in results {
            let mut block = format!(
                "[{}] (Relevanz: {:.0}%)\n",
                result.section_id,
                result.similarity * 100.0
            );

            if let Some(parent) = &result.parent_content {
                block.push_str("Übergeordneter Abschnitt:\n");
                block.push_str(parent);
                block.push_str("\n\n");
            }

            block.push_str(&result.content);

            if !result.sibling_contents.is_empty() {
                block.push_str("\n\nVerwandte Abschnitte:\n");
                for sibling in &result.sibling_contents {
                    block.push_str("- ");
                    block.push_str(sibling);
                    block.push('\n');
                }
            }

            blocks.push(block);
        }

        blocks.join("\n---\n\n")
    }

    fn query_cache_key(&self, document_id: Uuid, query_text: &str, top_k: usize) -> String {
        let raw = format!(
            "{document_id}|{query_text}|{top_k}|{:.3}",
            self.config.similarity_threshold
        );
        cache_key(&format!("query:{}", blake3::hash(raw.as_bytes()).to_hex()))
    }

    async fn cache_get(&self, key: &str) -> Option<Vec<RetrievalResult>> {
        match self.kv.get(key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("Query cache read failed: {e}");
                None
            }
        }
    }

    async fn cache_put(&self, key: &str, results: &[RetrievalResult]) {
        let Ok(raw) = serde_json::to_string(results) else {
            return;
        };
        if let Err(e) = self.kv.set_ex(key, raw, self.config.cache_ttl).await {
            warn!("Query cache write failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingResult, TextEmbedder};
    use crate::index::MemoryVectorIndex;
    use crate::models::ChunkType;
    use crate::processing::DocumentParser;
    use crate::store::{MemoryDocumentStore, MemoryKv};
    use async_trait::async_trait;

    /// Deterministic embedder: vector derives from character histogram.
    /// Similar texts share tokens, so relative ordering is stable.
    struct HashEmbedder;

    #[async_trait]
    impl TextEmbedder for HashEmbedder {
        fn dimension(&self) -> usize {
            16
        }

        async fn embed_query(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            self.embed_passage(text).await
        }

        async fn embed_passage(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            let mut v = vec![0.0f32; 16];
            for token in text.to_lowercase().split_whitespace() {
                let h = blake3::hash(token.as_bytes()).as_bytes()[0] as usize % 16;
                v[h] += 1.0;
            }
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                v.iter_mut().for_each(|x| *x /= norm);
            }
            Ok(v)
        }
    }

    async fn retriever_with_document() -> (Retriever, Uuid) {
        let store = Arc::new(MemoryDocumentStore::new());
        let retriever = Retriever::new(
            Arc::new(HashEmbedder),
            Arc::new(MemoryVectorIndex::new()),
            store.clone(),
            Arc::new(MemoryKv::new()),
            RetrieverConfig::default(),
        );

        let document_id = Uuid::new_v4();
        let parser = DocumentParser::default();
        let mut chunks = parser.parse_into_chunks(
            "§ 5 Kündigung\nAllgemeine Regelungen zur Kündigung.\n\
             Absatz 1\nDie ordentliche Kündigung bedarf der Schriftform.\n\
             Absatz 2\nDie Kündigungsfrist beträgt drei Monate zum Quartalsende.\n\
             § 12 Haftung\nDie Haftung ist auf grobe Fahrlässigkeit beschränkt.",
            document_id,
        );

        store.insert_chunks(chunks.clone()).await.unwrap();
        retriever.index_chunks(document_id, &mut chunks).await.unwrap();

        (retriever, document_id)
    }

    #[tokio::test]
    async fn test_index_fills_embeddings() {
        let store = Arc::new(MemoryDocumentStore::new());
        let retriever = Retriever::new(
            Arc::new(HashEmbedder),
            Arc::new(MemoryVectorIndex::new()),
            store,
            Arc::new(MemoryKv::new()),
            RetrieverConfig::default(),
        );

        let document_id = Uuid::new_v4();
        let parser = DocumentParser::default();
        let mut chunks = parser.parse_into_chunks("§ 1 Test\nEin kurzer Inhalt.", document_id);

        let count = retriever.index_chunks(document_id, &mut chunks).await.unwrap();
        assert_eq!(count, 1);

        let embedding = chunks[0].embedding.as_ref().unwrap();
        assert_eq!(embedding.len(), 16);
        let norm: f32 = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_retrieve_attaches_context() {
        let (retriever, document_id) = retriever_with_document().await;

        let results = retriever
            .retrieve(document_id, "Kündigungsfrist drei Monate Quartalsende", 3)
            .await
            .unwrap();

        assert!(!results.is_empty());
        let top = &results[0];
        assert!(top.content.contains("Kündigungsfrist"));
        // Absatz 2 hangs below §5, with Absatz 1 as sibling
        assert!(top.parent_content.as_ref().unwrap().contains("Kündigung"));
        assert!(!top.sibling_contents.is_empty());

        // Ordering invariant
        for window in results.windows(2) {
            assert!(window[0].similarity >= window[1].similarity);
        }
    }

    #[tokio::test]
    async fn test_cache_roundtrip() {
        let (retriever, document_id) = retriever_with_document().await;

        let first = retriever
            .retrieve(document_id, "Haftung grobe Fahrlässigkeit", 2)
            .await
            .unwrap();
        let second = retriever
            .retrieve(document_id, "Haftung grobe Fahrlässigkeit", 2)
            .await
            .unwrap();

        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].chunk_id, second[0].chunk_id);
    }

    #[tokio::test]
    async fn test_retrieve_unknown_document_empty() {
        let (retriever, _) = retriever_with_document().await;
        let results = retriever
            .retrieve(Uuid::new_v4(), "irgendeine Frage", 5)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_format_context() {
        let store = Arc::new(MemoryDocumentStore::new());
        let retriever = Retriever::new(
            Arc::new(HashEmbedder),
            Arc::new(MemoryVectorIndex::new()),
            store,
            Arc::new(MemoryKv::new()),
            RetrieverConfig::default(),
        );

        let results = vec![RetrievalResult {
            chunk_id: Uuid::new_v4(),
            section_id: "§5.2".to_string(),
            content: "Die Kündigungsfrist beträgt 3 Monate.".to_string(),
            similarity: 0.92,
            parent_content: Some("§5 Kündigung".to_string()),
            sibling_contents: vec!["§5.1 Ordentliche Kündigung".to_string()],
        }];

        let formatted = retriever.format_context(&results);

        assert!(formatted.contains("[§5.2]"));
        assert!(formatted.contains("92%"));
        assert!(formatted.contains("Kündigungsfrist"));
        assert!(formatted.contains("Übergeordneter Abschnitt"));
        assert!(formatted.contains("§5.1 Ordentliche Kündigung"));
    }

    #[test]
    fn test_format_empty_context() {
        let retriever = Retriever::new(
            Arc::new(HashEmbedder),
            Arc::new(MemoryVectorIndex::new()),
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryKv::new()),
            RetrieverConfig::default(),
        );
        assert_eq!(retriever.format_context(&[]), "");
    }
}
