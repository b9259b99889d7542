// JURADOC Qdrant REST Client - cosine collection, filtered search, upserts
// REST keeps the dependency surface small and sidesteps gRPC/HTTP2 issues

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ChunkPayload, IndexError, IndexResult, ScoredPoint, VectorIndex, VectorPoint};

/// Configuration for the Qdrant REST client.
#[derive(Debug, Clone)]
pub struct QdrantRestConfig {
    pub url: String,
    pub collection: String,
    pub timeout: Duration,
}

impl Default for QdrantRestConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "juradoc_chunks".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// REST client for Qdrant. Transient failures are retried once before
/// surfacing; persistent failure maps to `Unavailable`.
pub struct QdrantRestClient {
    client: reqwest::Client,
    base_url: String,
    collection: String,
}

impl QdrantRestClient {
    pub fn new(config: QdrantRestConfig) -> IndexResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| IndexError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection,
        })
    }

    async fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        body: &Value,
    ) -> IndexResult<reqwest::Response> {
        let mut last_error = String::new();

        // One internal retry for transient transport errors
        for attempt in 1..=2u32 {
            let result = self
                .client
                .request(method.clone(), url)
                .json(body)
                .send()
                .await;

            match result {
                Ok(response) => return Ok(response),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt == 1 {
                        debug!(url, "Vector store request failed, retrying once: {last_error}");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        }
        Err(IndexError::Unavailable(last_error))
    }
}

#[async_trait]
impl VectorIndex for QdrantRestClient {
    async fn ensure_collection(&self, dimension: usize) -> IndexResult<()> {
        let url = format!("{}/collections/{}", self.base_url, self.collection);
        let payload = json!({
            "vectors": {
                "size": dimension,
                "distance": "Cosine",
            }
        });

        let response = self.request(reqwest::Method::PUT, &url, &payload).await?;
        let status = response.status();

        // 409 means the collection already exists
        if status.is_success() || status == reqwest::StatusCode::CONFLICT {
            info!(collection = self.collection, dimension, "Vector collection ready");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(IndexError::InvalidResponse(format!(
                "create collection returned {status}: {body}"
            )))
        }
    }

    async fn upsert(&self, points: Vec<VectorPoint>) -> IndexResult<()> {
        if points.is_empty() {
            return Ok(());
        }

        let url = format!("{}/collections/{}/points", self.base_url, self.collection);
        let payload = json!({
            "points": points
                .iter()
                .map(|p| {
                    json!({
                        "id": p.id.to_string(),
                        "vector": p.vector,
                        "payload": p.payload,
                    })
                })
                .collect::<Vec<_>>(),
        });

        let response = self.request(reqwest::Method::PUT, &url, &payload).await?;
        if response.status().is_success() {
            debug!(points = points.len(), "Upserted vectors");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(IndexError::InvalidResponse(format!(
                "upsert returned {status}: {body}"
            )))
        }
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        document_id: Uuid,
        top_k: usize,
    ) -> IndexResult<Vec<ScoredPoint>> {
        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection
        );
        let payload = json!({
            "vector": vector,
            "limit": top_k,
            "with_payload": true,
            "with_vector": false,
            "filter": {
                "must": [
                    { "key": "document_id", "match": { "value": document_id.to_string() } }
                ]
            }
        });

        let response = self.request(reqwest::Method::POST, &url, &payload).await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::InvalidResponse(format!(
                "search returned {status}: {body}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| IndexError::InvalidResponse(e.to_string()))?;

        let hits = body
            .get("result")
            .and_then(|r| r.as_array())
            .ok_or_else(|| IndexError::InvalidResponse("missing result array".to_string()))?;

        let mut points = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(id) = hit
                .get("id")
                .and_then(|v| v.as_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            else {
                warn!("Search hit without parseable id, skipping");
                continue;
            };
            let score = hit.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0) as f32;
            let Some(payload) = hit
                .get("payload")
                .and_then(|p| serde_json::from_value::<ChunkPayload>(p.clone()).ok())
            else {
                warn!(%id, "Search hit without chunk payload, skipping");
                continue;
            };

            points.push(ScoredPoint {
                id,
                score: score.clamp(0.0, 1.0),
                payload,
            });
        }

        Ok(points)
    }

    async fn delete_document(&self, document_id: Uuid) -> IndexResult<()> {
        let url = format!(
            "{}/collections/{}/points/delete",
            self.base_url, self.collection
        );
        let payload = json!({
            "filter": {
                "must": [
                    { "key": "document_id", "match": { "value": document_id.to_string() } }
                ]
            }
        });

        let response = self.request(reqwest::Method::POST, &url, &payload).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            Err(IndexError::InvalidResponse(format!(
                "delete returned {status}"
            )))
        }
    }
}
