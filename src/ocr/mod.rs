// JURADOC OCR Module - remote GPU worker client and page-level text merging
// The worker is an external collaborator; only its wire contract lives here

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod merger;
pub mod worker_client;

pub use merger::{MergeReport, MergedDocument, MergedPage, SourceStats, TextMerger, TextSource};
pub use worker_client::{OcrWorkerClient, OcrWorkerConfig};

use crate::document::PageImage;

/// A recognized text region on a page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrRegion {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub is_handwritten: bool,
}

/// Per-page OCR result as reported by the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrPageResult {
    pub page_num: usize,
    pub full_text: String,
    pub avg_confidence: f32,
    pub typed_text_pct: f32,
    pub handwritten_text_pct: f32,
    pub processing_time_ms: u64,
    #[serde(default)]
    pub regions: Vec<OcrRegion>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Document-level OCR result with per-page detail and failure accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrDocumentResult {
    pub full_text: String,
    pub pages: Vec<OcrPageResult>,
    pub avg_confidence: f32,
    pub typed_text_pct: f32,
    pub handwritten_text_pct: f32,
    pub total_processing_time_ms: u64,
    pub pages_processed: usize,
    pub pages_failed: usize,
    pub errors: Vec<String>,
}

impl OcrDocumentResult {
    /// Aggregate per-page results. Failed pages are blanked and counted;
    /// averages cover the successful pages only.
    pub fn from_pages(mut pages: Vec<OcrPageResult>) -> Self {
        pages.sort_by_key(|p| p.page_num);

        let mut errors = Vec::new();
        for page in &mut pages {
            if let Some(error) = &page.error {
                errors.push(format!("page {}: {}", page.page_num, error));
                page.full_text.clear();
            }
        }

        let ok: Vec<&OcrPageResult> = pages.iter().filter(|p| p.error.is_none()).collect();
        let pages_processed = ok.len();
        let pages_failed = pages.len() - pages_processed;

        let mean = |f: fn(&OcrPageResult) -> f32| {
            if ok.is_empty() {
                0.0
            } else {
                ok.iter().map(|p| f(p)).sum::<f32>() / ok.len() as f32
            }
        };

        let full_text = ok
            .iter()
            .filter(|p| !p.full_text.is_empty())
            .map(|p| p.full_text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        Self {
            full_text,
            avg_confidence: mean(|p| p.avg_confidence),
            typed_text_pct: mean(|p| p.typed_text_pct),
            handwritten_text_pct: mean(|p| p.handwritten_text_pct),
            total_processing_time_ms: pages.iter().map(|p| p.processing_time_ms).sum(),
            pages_processed,
            pages_failed,
            errors,
            pages,
        }
    }

    pub fn has_partial_failure(&self) -> bool {
        self.pages_failed > 0 && self.pages_processed > 0
    }
}

/// Errors from the OCR worker path.
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR worker unreachable: {0}")]
    Unavailable(String),

    #[error("OCR deadline exceeded after {0}s")]
    Timeout(u64),

    #[error("invalid OCR response: {0}")]
    InvalidResponse(String),
}

pub type OcrResult<T> = Result<T, OcrError>;

/// Contract of the remote GPU OCR worker.
#[async_trait]
pub trait OcrWorker: Send + Sync {
    /// Submit an ordered batch of page images, collect per-page results.
    async fn process_document(
        &self,
        images: &[PageImage],
        enable_handwriting: bool,
    ) -> OcrResult<OcrDocumentResult>;

    /// Single-page variant.
    async fn process_page(
        &self,
        image: &PageImage,
        enable_handwriting: bool,
    ) -> OcrResult<OcrPageResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page_num: usize, text: &str, confidence: f32, error: Option<&str>) -> OcrPageResult {
        OcrPageResult {
            page_num,
            full_text: text.to_string(),
            avg_confidence: confidence,
            typed_text_pct: 100.0,
            handwritten_text_pct: 0.0,
            processing_time_ms: 1000,
            regions: vec![],
            error: error.map(|e| e.to_string()),
        }
    }

    #[test]
    fn test_partial_failure_accounting() {
        let result = OcrDocumentResult::from_pages(vec![
            page(1, "Seite eins", 0.95, None),
            page(2, "sollte verschwinden", 0.0, Some("engine crash")),
            page(3, "Seite drei", 0.85, None),
        ]);

        assert_eq!(result.pages_processed, 2);
        assert_eq!(result.pages_failed, 1);
        assert!(result.has_partial_failure());

        // Failed page is blanked out
        assert_eq!(result.pages[1].full_text, "");
        assert!(!result.full_text.contains("verschwinden"));
        assert_eq!(result.errors.len(), 1);

        // Averages cover successful pages only
        assert!((result.avg_confidence - 0.90).abs() < 1e-6);
    }

    #[test]
    fn test_all_pages_ok() {
        let result = OcrDocumentResult::from_pages(vec![
            page(2, "zwei", 0.8, None),
            page(1, "eins", 0.9, None),
        ]);

        // Pages are reordered by page number
        assert_eq!(result.pages[0].page_num, 1);
        assert_eq!(result.full_text, "eins\n\nzwei");
        assert!(!result.has_partial_failure());
    }

    #[test]
    fn test_page_result_deserialization() {
        let json = r#"{
            "page_num": 1,
            "full_text": "Erkannt",
            "avg_confidence": 0.92,
            "typed_text_pct": 80.0,
            "handwritten_text_pct": 20.0,
            "processing_time_ms": 1500,
            "regions": [{"text": "Erkannt", "confidence": 0.92}]
        }"#;

        let page: OcrPageResult = serde_json::from_str(json).unwrap();
        assert_eq!(page.page_num, 1);
        assert!(page.error.is_none());
        assert_eq!(page.regions.len(), 1);
    }

    #[test]
    fn test_missing_required_fields_rejected() {
        let json = r#"{"page_num": 1}"#;
        assert!(serde_json::from_str::<OcrPageResult>(json).is_err());
    }
}
