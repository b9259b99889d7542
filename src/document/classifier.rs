// JURADOC File Classifier - content sniffing, PDF text-layer analysis, hashing
// Decides the extraction strategy before anything touches the pipeline

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use tracing::{debug, info, warn};

use super::{pdf, ExtractError, ExtractResult, FileKind, TextLayerQuality};

/// PDF text-layer analysis results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfAnalysis {
    pub total_pages: usize,
    pub pages_with_text: usize,
    pub text_coverage_pct: f32,
    pub text_layer_quality: TextLayerQuality,
    pub total_chars: usize,
    pub has_images: bool,
    pub needs_ocr: bool,
}

/// Complete analysis of an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub filename: String,
    pub file_hash: String,
    pub file_kind: FileKind,
    pub file_size_bytes: usize,
    pub pdf: Option<PdfAnalysis>,
}

/// Detects file kind, text-layer presence and quality metrics.
#[derive(Debug, Default, Clone)]
pub struct FileClassifier;

/// A page counts as "has text" when it carries at least this many
/// non-whitespace characters.
const MIN_CHARS_PER_PAGE: usize = 10;

impl FileClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Detect file kind from content signatures, falling back to the
    /// filename extension.
    pub fn detect_kind(&self, content: &[u8], filename: &str) -> FileKind {
        let sniffed = self.sniff_kind(content);
        let detected = if sniffed == FileKind::Unknown {
            self.kind_from_extension(filename)
        } else {
            sniffed
        };

        info!(filename, kind = detected.as_str(), "Detected file type");
        detected
    }

    fn sniff_kind(&self, content: &[u8]) -> FileKind {
        if content.starts_with(b"%PDF-") {
            return FileKind::Pdf;
        }
        if content.starts_with(b"PK\x03\x04") {
            return self.discriminate_zip_container(content);
        }
        if looks_like_rfc822(content) {
            return FileKind::Eml;
        }
        FileKind::Unknown
    }

    /// DOCX and ODT are zip containers; tell them apart by their marker
    /// entries, otherwise report a plain archive.
    fn discriminate_zip_container(&self, content: &[u8]) -> FileKind {
        let Ok(mut archive) = zip::ZipArchive::new(Cursor::new(content)) else {
            return FileKind::Zip;
        };

        let names: Vec<String> = archive.file_names().map(|n| n.to_string()).collect();

        if names.iter().any(|n| n == "[Content_Types].xml")
            && names.iter().any(|n| n.starts_with("word/"))
        {
            return FileKind::Docx;
        }

        if names.iter().any(|n| n == "mimetype") {
            if let Ok(mut entry) = archive.by_name("mimetype") {
                let mut mime = String::new();
                use std::io::Read;
                if entry.read_to_string(&mut mime).is_ok()
                    && mime.trim() == "application/vnd.oasis.opendocument.text"
                {
                    return FileKind::Odt;
                }
            }
        }

        FileKind::Zip
    }

    fn kind_from_extension(&self, filename: &str) -> FileKind {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => FileKind::Pdf,
            "docx" => FileKind::Docx,
            "odt" => FileKind::Odt,
            "eml" | "msg" => FileKind::Eml,
            "zip" => FileKind::Zip,
            _ => FileKind::Unknown,
        }
    }

    /// SHA-256 of the full content, lowercase hex. Used for deduplication
    /// and versioning.
    pub fn compute_hash(&self, content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        format!("{:x}", hasher.finalize())
    }

    /// Analyze the PDF text layer. A corrupt document degrades to
    /// `Unknown` quality with OCR requested rather than failing the upload.
    pub async fn analyze_pdf(&self, content: &[u8]) -> PdfAnalysis {
        let owned = content.to_vec();

        let analyzed = tokio::task::spawn_blocking(move || analyze_pdf_blocking(&owned)).await;

        match analyzed {
            Ok(Ok(analysis)) => analysis,
            Ok(Err(e)) => {
                warn!("PDF analysis failed, degrading to OCR: {e}");
                PdfAnalysis {
                    total_pages: 0,
                    pages_with_text: 0,
                    text_coverage_pct: 0.0,
                    text_layer_quality: TextLayerQuality::Unknown,
                    total_chars: 0,
                    has_images: false,
                    needs_ocr: true,
                }
            }
            Err(e) => {
                warn!("PDF analysis task failed: {e}");
                PdfAnalysis {
                    total_pages: 0,
                    pages_with_text: 0,
                    text_coverage_pct: 0.0,
                    text_layer_quality: TextLayerQuality::Unknown,
                    total_chars: 0,
                    has_images: false,
                    needs_ocr: true,
                }
            }
        }
    }

    /// Detect the primary language of a text sample. Returns an ISO 639-1
    /// code; None for samples too short to judge.
    pub fn detect_language(&self, text: &str) -> Option<String> {
        if text.trim().chars().count() < 20 {
            return None;
        }

        // Stopword frequencies over the first 500 chars; the corpus is
        // German-first, English and French cover forwarded correspondence.
        let sample: String = text.chars().take(500).collect();
        let tokens: Vec<String> = sample
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphabetic())
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();

        if tokens.is_empty() {
            return None;
        }

        const GERMAN: &[&str] = &[
            "der", "die", "das", "und", "ist", "nicht", "ein", "eine", "von", "mit", "für", "auf",
            "dem", "den", "des", "im", "zu", "wird", "bei", "nach", "gemäß",
        ];
        const ENGLISH: &[&str] = &[
            "the", "and", "of", "is", "not", "to", "in", "that", "for", "with", "on", "by", "this",
            "are", "shall",
        ];
        const FRENCH: &[&str] = &[
            "le", "la", "les", "et", "est", "pas", "un", "une", "des", "dans", "pour", "sur", "que",
            "qui", "avec",
        ];

        let score = |words: &[&str]| tokens.iter().filter(|t| words.contains(&t.as_str())).count();

        let candidates = [("de", score(GERMAN)), ("en", score(ENGLISH)), ("fr", score(FRENCH))];
        let (lang, hits) = candidates.iter().max_by_key(|(_, hits)| *hits)?;

        if *hits == 0 {
            debug!("Language detection inconclusive");
            return None;
        }
        Some((*lang).to_string())
    }

    /// Complete analysis: kind, hash, size and (for PDFs) text-layer quality.
    /// Fails when neither signature nor extension is recognized.
    pub async fn classify(&self, content: &[u8], filename: &str) -> ExtractResult<FileAnalysis> {
        let file_hash = self.compute_hash(content);
        let file_kind = self.detect_kind(content, filename);

        if file_kind == FileKind::Unknown {
            return Err(ExtractError::UnknownFormat(filename.to_string()));
        }

        let pdf = if file_kind == FileKind::Pdf {
            Some(self.analyze_pdf(content).await)
        } else {
            None
        };

        Ok(FileAnalysis {
            filename: filename.to_string(),
            file_hash,
            file_kind,
            file_size_bytes: content.len(),
            pdf,
        })
    }
}

fn analyze_pdf_blocking(content: &[u8]) -> ExtractResult<PdfAnalysis> {
    let total_pages = pdf::page_count(content)?;
    let page_texts = pdf::raw_page_texts(content)?;

    let mut pages_with_text = 0usize;
    let mut total_chars = 0usize;

    for text in &page_texts {
        let visible = text.chars().filter(|c| !c.is_whitespace()).count();
        if visible >= MIN_CHARS_PER_PAGE {
            pages_with_text += 1;
            total_chars += text.chars().count();
        }
    }

    let text_coverage_pct = if total_pages > 0 {
        pages_with_text as f32 / total_pages as f32 * 100.0
    } else {
        0.0
    };

    let quality = TextLayerQuality::from_coverage(text_coverage_pct);

    Ok(PdfAnalysis {
        total_pages,
        pages_with_text,
        text_coverage_pct: (text_coverage_pct * 100.0).round() / 100.0,
        text_layer_quality: quality,
        total_chars,
        has_images: pdf::has_images(content),
        needs_ocr: quality.needs_ocr(),
    })
}

/// Heuristic for raw RFC-822 messages: header lines near the top.
fn looks_like_rfc822(content: &[u8]) -> bool {
    let head = &content[..content.len().min(2048)];
    let Ok(text) = std::str::from_utf8(head) else {
        return false;
    };

    let mut header_hits = 0;
    for line in text.lines().take(30) {
        if line.starts_with("From:")
            || line.starts_with("Received:")
            || line.starts_with("Return-Path:")
            || line.starts_with("Subject:")
            || line.starts_with("Message-ID:")
            || line.starts_with("To:")
        {
            header_hits += 1;
        }
    }
    header_hits >= 2
}
