// JURADOC In-Memory Vector Index - brute-force cosine over a concurrent map
// Development and test double for the server-backed store

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{IndexResult, ScoredPoint, VectorIndex, VectorPoint};

/// Exhaustive-scan vector index. Vectors are expected unit-norm, so cosine
/// similarity is the plain dot product.
#[derive(Default)]
pub struct MemoryVectorIndex {
    points: DashMap<Uuid, VectorPoint>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure_collection(&self, _dimension: usize) -> IndexResult<()> {
        Ok(())
    }

    async fn upsert(&self, points: Vec<VectorPoint>) -> IndexResult<()> {
        for point in points {
            self.points.insert(point.id, point);
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        document_id: Uuid,
        top_k: usize,
    ) -> IndexResult<Vec<ScoredPoint>> {
        let mut hits: Vec<ScoredPoint> = self
            .points
            .iter()
            .filter(|p| p.payload.document_id == document_id)
            .map(|p| ScoredPoint {
                id: p.id,
                score: dot(&vector, &p.vector).clamp(0.0, 1.0),
                payload: p.payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_document(&self, document_id: Uuid) -> IndexResult<()> {
        let owned: Vec<Uuid> = self
            .points
            .iter()
            .filter(|p| p.payload.document_id == document_id)
            .map(|p| p.id)
            .collect();
        for id in owned {
            self.points.remove(&id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ChunkPayload;
    use crate::models::ChunkType;

    fn point(document_id: Uuid, section_id: &str, vector: Vec<f32>, position: i64) -> VectorPoint {
        VectorPoint {
            id: Uuid::new_v4(),
            vector,
            payload: ChunkPayload {
                document_id,
                section_id: section_id.to_string(),
                chunk_type: ChunkType::Section,
                position,
                parent_id: None,
            },
        }
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity_and_filters_document() {
        let index = MemoryVectorIndex::new();
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();

        index
            .upsert(vec![
                point(doc_a, "§1", vec![1.0, 0.0], 0),
                point(doc_a, "§2", vec![0.6, 0.8], 1),
                point(doc_b, "§9", vec![1.0, 0.0], 0),
            ])
            .await
            .unwrap();

        let hits = index.search(vec![1.0, 0.0], doc_a, 10).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].payload.section_id, "§1");
        assert!(hits[0].score > hits[1].score);
        assert!(hits.iter().all(|h| h.payload.document_id == doc_a));
    }

    #[tokio::test]
    async fn test_delete_document() {
        let index = MemoryVectorIndex::new();
        let doc = Uuid::new_v4();
        index
            .upsert(vec![point(doc, "§1", vec![1.0, 0.0], 0)])
            .await
            .unwrap();

        index.delete_document(doc).await.unwrap();
        assert!(index.is_empty());
    }
}
