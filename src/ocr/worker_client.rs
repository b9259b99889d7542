// JURADOC OCR Worker Client - REST client to the remote GPU OCR service
// One wall-clock deadline covers queueing, GPU cold start and processing

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use super::{OcrDocumentResult, OcrError, OcrPageResult, OcrResult, OcrWorker};
use crate::document::PageImage;

/// Configuration of the OCR worker client.
#[derive(Debug, Clone)]
pub struct OcrWorkerConfig {
    pub base_url: String,
    /// Wall-clock deadline per submission; generous to cover GPU cold start.
    pub timeout: Duration,
}

impl Default for OcrWorkerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8100".to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

/// REST client for the GPU OCR worker.
pub struct OcrWorkerClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OcrWorkerClient {
    pub fn new(config: OcrWorkerConfig) -> OcrResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OcrError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        })
    }

    async fn submit_batch(
        &self,
        images: &[PageImage],
        enable_handwriting: bool,
    ) -> OcrResult<Vec<OcrPageResult>> {
        let url = format!("{}/ocr/batch", self.base_url);
        let payload = json!({
            "images": images.iter().map(|i| i.image_base64.as_str()).collect::<Vec<_>>(),
            "enable_handwriting": enable_handwriting,
        });

        let send = self.client.post(&url).json(&payload).send();
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| OcrError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| {
                if e.is_timeout() {
                    OcrError::Timeout(self.timeout.as_secs())
                } else {
                    OcrError::Unavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::Unavailable(format!(
                "worker returned {status}: {body}"
            )));
        }

        response
            .json::<Vec<OcrPageResult>>()
            .await
            .map_err(|e| OcrError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl OcrWorker for OcrWorkerClient {
    async fn process_document(
        &self,
        images: &[PageImage],
        enable_handwriting: bool,
    ) -> OcrResult<OcrDocumentResult> {
        if images.is_empty() {
            return Err(OcrError::InvalidResponse(
                "no page images to submit".to_string(),
            ));
        }

        info!(pages = images.len(), enable_handwriting, "Submitting OCR batch");

        let pages = self.submit_batch(images, enable_handwriting).await?;

        if pages.len() != images.len() {
            warn!(
                submitted = images.len(),
                returned = pages.len(),
                "OCR worker returned unexpected page count"
            );
        }

        let result = OcrDocumentResult::from_pages(pages);
        if result.has_partial_failure() {
            warn!(
                failed = result.pages_failed,
                processed = result.pages_processed,
                "OCR completed with partial failures"
            );
        } else {
            info!(
                pages = result.pages_processed,
                confidence = result.avg_confidence,
                "OCR batch complete"
            );
        }
        Ok(result)
    }

    async fn process_page(
        &self,
        image: &PageImage,
        enable_handwriting: bool,
    ) -> OcrResult<OcrPageResult> {
        let pages = self
            .submit_batch(std::slice::from_ref(image), enable_handwriting)
            .await?;
        pages
            .into_iter()
            .next()
            .ok_or_else(|| OcrError::InvalidResponse("empty page result".to_string()))
    }
}
