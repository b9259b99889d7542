// JURADOC Text Merger - page-level choice between embedded text and OCR
// Decisions follow the document-level text-layer quality plus OCR confidence

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use super::{OcrDocumentResult, OcrPageResult};
use crate::document::{PageText, TextLayerQuality};

/// Which source a merged page ended up using. `Hybrid` is reserved for
/// future per-region rules and is currently never emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSource {
    Embedded,
    Ocr,
    Hybrid,
    Fallback,
}

/// Final text for one page with the audit trail of the decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedPage {
    pub page_num: usize,
    pub text: String,
    pub source: TextSource,
    pub confidence: f32,
    pub reason: String,
}

/// Source-tag histogram; sums to the page count.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SourceStats {
    pub embedded: usize,
    pub ocr: usize,
    pub hybrid: usize,
    pub fallback: usize,
}

impl SourceStats {
    fn bump(&mut self, source: TextSource) {
        match source {
            TextSource::Embedded => self.embedded += 1,
            TextSource::Ocr => self.ocr += 1,
            TextSource::Hybrid => self.hybrid += 1,
            TextSource::Fallback => self.fallback += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.embedded + self.ocr + self.hybrid + self.fallback
    }
}

/// Merged document: joined text, per-page decisions, statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedDocument {
    pub full_text: String,
    pub pages: Vec<MergedPage>,
    pub stats: SourceStats,
    pub avg_confidence: f32,
}

/// Audit report of the merge decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReport {
    pub total_pages: usize,
    pub avg_confidence: f32,
    pub source_distribution: SourceStats,
    pub pages_detail: Vec<MergedPage>,
}

/// Merges embedded PDF text with OCR using page-level quality decisions.
#[derive(Debug, Clone)]
pub struct TextMerger {
    ocr_confidence_threshold: f32,
}

impl Default for TextMerger {
    fn default() -> Self {
        Self {
            ocr_confidence_threshold: 0.75,
        }
    }
}

impl TextMerger {
    pub fn new(ocr_confidence_threshold: f32) -> Self {
        Self {
            ocr_confidence_threshold,
        }
    }

    /// Merge embedded and OCR text page by page. The output always carries
    /// one page per embedded page; the histogram sums to that count.
    pub fn merge_document(
        &self,
        embedded_pages: &[PageText],
        ocr_result: Option<&OcrDocumentResult>,
        quality: TextLayerQuality,
        request_id: Option<&str>,
    ) -> MergedDocument {
        let ocr_pages = ocr_result.map(|r| r.pages.len()).unwrap_or(0);
        info!(
            embedded = embedded_pages.len(),
            ocr = ocr_pages,
            quality = quality.as_str(),
            request_id,
            "Merging embedded and OCR text"
        );

        // Errored OCR pages are treated as absent, so they fall back to
        // the embedded text of that page.
        let ocr_by_page: HashMap<usize, &OcrPageResult> = ocr_result
            .map(|r| {
                r.pages
                    .iter()
                    .filter(|p| p.error.is_none())
                    .map(|p| (p.page_num, p))
                    .collect()
            })
            .unwrap_or_default();

        let mut pages = Vec::with_capacity(embedded_pages.len());
        let mut stats = SourceStats::default();

        for embedded in embedded_pages {
            let merged = self.merge_page(embedded, ocr_by_page.get(&embedded.page_num).copied(), quality);
            stats.bump(merged.source);
            pages.push(merged);
        }

        let full_text = pages
            .iter()
            .filter(|p| !p.text.is_empty())
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let avg_confidence = if pages.is_empty() {
            0.0
        } else {
            pages.iter().map(|p| p.confidence).sum::<f32>() / pages.len() as f32
        };

        info!(
            embedded = stats.embedded,
            ocr = stats.ocr,
            fallback = stats.fallback,
            confidence = avg_confidence,
            request_id,
            "Merge complete"
        );

        MergedDocument {
            full_text,
            pages,
            stats,
            avg_confidence,
        }
    }

    /// Per-page decision table, evaluated in order.
    fn merge_page(
        &self,
        embedded: &PageText,
        ocr: Option<&OcrPageResult>,
        quality: TextLayerQuality,
    ) -> MergedPage {
        let page_num = embedded.page_num;

        let Some(ocr) = ocr else {
            return MergedPage {
                page_num,
                text: embedded.text.clone(),
                source: TextSource::Embedded,
                confidence: 0.90,
                reason: "no ocr".to_string(),
            };
        };

        match quality {
            TextLayerQuality::Excellent => MergedPage {
                page_num,
                text: embedded.text.clone(),
                source: TextSource::Embedded,
                confidence: 0.95,
                reason: "trust embedded (excellent)".to_string(),
            },
            TextLayerQuality::Good => MergedPage {
                page_num,
                text: embedded.text.clone(),
                source: TextSource::Embedded,
                confidence: 0.85,
                reason: "trust embedded (good)".to_string(),
            },
            TextLayerQuality::None => MergedPage {
                page_num,
                text: ocr.full_text.clone(),
                source: TextSource::Ocr,
                confidence: ocr.avg_confidence,
                reason: "no embedded".to_string(),
            },
            TextLayerQuality::Poor => {
                if ocr.avg_confidence >= self.ocr_confidence_threshold {
                    MergedPage {
                        page_num,
                        text: ocr.full_text.clone(),
                        source: TextSource::Ocr,
                        confidence: ocr.avg_confidence,
                        reason: format!("ocr wins ({:.2})", ocr.avg_confidence),
                    }
                } else {
                    MergedPage {
                        page_num,
                        text: embedded.text.clone(),
                        source: TextSource::Fallback,
                        confidence: 0.60,
                        reason: format!("low ocr ({:.2}), keep embedded", ocr.avg_confidence),
                    }
                }
            }
            TextLayerQuality::Unknown => MergedPage {
                page_num,
                text: embedded.text.clone(),
                source: TextSource::Embedded,
                confidence: 0.80,
                reason: "unknown quality".to_string(),
            },
        }
    }

    /// Audit report for merge decisions.
    pub fn merge_report(&self, merged: &MergedDocument) -> MergeReport {
        MergeReport {
            total_pages: merged.pages.len(),
            avg_confidence: merged.avg_confidence,
            source_distribution: merged.stats,
            pages_detail: merged.pages.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::OcrDocumentResult;

    fn embedded(page_num: usize, text: &str) -> PageText {
        PageText::new(page_num, text.to_string())
    }

    fn ocr_doc(pages: Vec<(usize, &str, f32)>) -> OcrDocumentResult {
        OcrDocumentResult::from_pages(
            pages
                .into_iter()
                .map(|(page_num, text, confidence)| super::super::OcrPageResult {
                    page_num,
                    full_text: text.to_string(),
                    avg_confidence: confidence,
                    typed_text_pct: 100.0,
                    handwritten_text_pct: 0.0,
                    processing_time_ms: 1000,
                    regions: vec![],
                    error: None,
                })
                .collect(),
        )
    }

    #[test]
    fn test_poor_quality_strong_ocr_uses_ocr() {
        let merger = TextMerger::default();
        let ocr = ocr_doc(vec![(1, "clean", 0.90)]);

        let merged = merger.merge_document(
            &[embedded(1, "low")],
            Some(&ocr),
            TextLayerQuality::Poor,
            None,
        );

        assert_eq!(merged.pages[0].source, TextSource::Ocr);
        assert_eq!(merged.pages[0].text, "clean");
        assert!((merged.pages[0].confidence - 0.90).abs() < 1e-6);
    }

    #[test]
    fn test_poor_quality_weak_ocr_falls_back() {
        let merger = TextMerger::default();
        let ocr = ocr_doc(vec![(1, "clean", 0.40)]);

        let merged = merger.merge_document(
            &[embedded(1, "low")],
            Some(&ocr),
            TextLayerQuality::Poor,
            None,
        );

        assert_eq!(merged.pages[0].source, TextSource::Fallback);
        assert_eq!(merged.pages[0].text, "low");
        assert!((merged.pages[0].confidence - 0.60).abs() < 1e-6);
    }

    #[test]
    fn test_excellent_quality_trusts_embedded() {
        let merger = TextMerger::default();
        let ocr = ocr_doc(vec![(1, "ocr text", 0.99)]);

        let merged = merger.merge_document(
            &[embedded(1, "Hochwertige Seite")],
            Some(&ocr),
            TextLayerQuality::Excellent,
            None,
        );

        assert_eq!(merged.pages[0].source, TextSource::Embedded);
        assert_eq!(merged.pages[0].text, "Hochwertige Seite");
        assert!((merged.pages[0].confidence - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_no_ocr_result_keeps_embedded() {
        let merger = TextMerger::default();
        let merged = merger.merge_document(
            &[embedded(1, "Nur eingebetteter Text")],
            None,
            TextLayerQuality::Poor,
            None,
        );

        assert_eq!(merged.pages[0].source, TextSource::Embedded);
        assert!((merged.pages[0].confidence - 0.90).abs() < 1e-6);
        assert_eq!(merged.pages[0].reason, "no ocr");
    }

    #[test]
    fn test_none_quality_all_ocr() {
        let merger = TextMerger::default();
        let ocr = ocr_doc(vec![(1, "Seite 1", 0.92), (2, "Seite 2", 0.88)]);

        let merged = merger.merge_document(
            &[embedded(1, ""), embedded(2, "")],
            Some(&ocr),
            TextLayerQuality::None,
            None,
        );

        assert!(merged.pages.iter().all(|p| p.source == TextSource::Ocr));
        assert_eq!(merged.full_text, "Seite 1\n\nSeite 2");
    }

    #[test]
    fn test_histogram_sums_to_page_count() {
        let merger = TextMerger::default();
        let ocr = ocr_doc(vec![(1, "a", 0.9), (3, "c", 0.9)]);

        let pages = vec![embedded(1, "x"), embedded(2, "y"), embedded(3, "z")];
        let merged = merger.merge_document(&pages, Some(&ocr), TextLayerQuality::Poor, None);

        assert_eq!(merged.pages.len(), pages.len());
        assert_eq!(merged.stats.total(), pages.len());
        // Page 2 has no OCR result and keeps the embedded source
        assert_eq!(merged.pages[1].source, TextSource::Embedded);
    }

    #[test]
    fn test_unknown_quality_keeps_embedded() {
        let merger = TextMerger::default();
        let ocr = ocr_doc(vec![(1, "ocr", 0.95)]);

        let merged = merger.merge_document(
            &[embedded(1, "embedded")],
            Some(&ocr),
            TextLayerQuality::Unknown,
            None,
        );

        assert_eq!(merged.pages[0].source, TextSource::Embedded);
        assert!((merged.pages[0].confidence - 0.80).abs() < 1e-6);
    }

    #[test]
    fn test_errored_ocr_page_treated_as_absent() {
        let merger = TextMerger::default();
        let mut pages = ocr_doc(vec![(1, "gut", 0.9)]);
        pages.pages.push(super::super::OcrPageResult {
            page_num: 2,
            full_text: String::new(),
            avg_confidence: 0.0,
            typed_text_pct: 0.0,
            handwritten_text_pct: 0.0,
            processing_time_ms: 50,
            regions: vec![],
            error: Some("engine crash".to_string()),
        });

        let merged = merger.merge_document(
            &[embedded(1, "eins"), embedded(2, "zwei")],
            Some(&pages),
            TextLayerQuality::Poor,
            None,
        );

        assert_eq!(merged.pages[0].source, TextSource::Ocr);
        assert_eq!(merged.pages[1].source, TextSource::Embedded);
        assert_eq!(merged.pages[1].reason, "no ocr");
    }

    #[test]
    fn test_merge_report() {
        let merger = TextMerger::default();
        let merged = merger.merge_document(
            &[embedded(1, "text")],
            None,
            TextLayerQuality::Excellent,
            None,
        );

        let report = merger.merge_report(&merged);
        assert_eq!(report.total_pages, 1);
        assert_eq!(report.source_distribution.embedded, 1);
        assert_eq!(report.pages_detail.len(), 1);
    }
}
