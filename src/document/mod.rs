// JURADOC Document Module - file classification and per-format extraction
// PDF (embedded text + rendering), DOCX/ODT, EML, ZIP containers

use serde::{Deserialize, Serialize};

pub mod archive;
pub mod classifier;
pub mod email;
pub mod office;
pub mod pdf;

pub use archive::{ArchiveEntry, ArchiveExtractor};
pub use classifier::{FileAnalysis, FileClassifier, PdfAnalysis};
pub use email::{EmailAttachment, EmailExtractor, ExtractedEmail, ThreadInfo};
pub use pdf::PdfExtractor;

/// Supported document kinds, detected by content sniffing with the filename
/// extension as fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Docx,
    Odt,
    Eml,
    Zip,
    Unknown,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Docx => "docx",
            FileKind::Odt => "odt",
            FileKind::Eml => "eml",
            FileKind::Zip => "zip",
            FileKind::Unknown => "unknown",
        }
    }
}

/// Quality of the embedded text layer in a PDF, derived from the share of
/// pages carrying text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextLayerQuality {
    Excellent, // >= 90% pages with text
    Good,      // >= 70%
    Poor,      // > 0%
    None,      // no text layer
    Unknown,   // unable to determine
}

impl TextLayerQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextLayerQuality::Excellent => "excellent",
            TextLayerQuality::Good => "good",
            TextLayerQuality::Poor => "poor",
            TextLayerQuality::None => "none",
            TextLayerQuality::Unknown => "unknown",
        }
    }

    pub fn from_coverage(coverage_pct: f32) -> Self {
        if coverage_pct >= 90.0 {
            TextLayerQuality::Excellent
        } else if coverage_pct >= 70.0 {
            TextLayerQuality::Good
        } else if coverage_pct > 0.0 {
            TextLayerQuality::Poor
        } else {
            TextLayerQuality::None
        }
    }

    pub fn needs_ocr(&self) -> bool {
        matches!(
            self,
            TextLayerQuality::Poor | TextLayerQuality::None | TextLayerQuality::Unknown
        )
    }
}

/// Text extracted from a single page. Embedded text carries confidence 1.0;
/// OCR text reports the engine's confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    pub page_num: usize, // 1-indexed
    pub text: String,
    pub char_count: usize,
    pub word_count: usize,
    pub bbox: Option<(f32, f32, f32, f32)>,
    pub confidence: f32,
}

impl PageText {
    pub fn new(page_num: usize, text: String) -> Self {
        let char_count = text.chars().count();
        let word_count = text.split_whitespace().count();
        Self {
            page_num,
            text,
            char_count,
            word_count,
            bbox: None,
            confidence: 1.0,
        }
    }
}

/// Rendered page image for OCR submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageImage {
    pub page_num: usize,
    pub image_base64: String,
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
}

/// Errors from classification and extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unrecognized file format: {0}")]
    UnknownFormat(String),

    #[error("corrupt {kind} input: {detail}")]
    Corrupt { kind: &'static str, detail: String },

    #[error("page rendering failed: {0}")]
    Rendering(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ExtractResult<T> = Result<T, ExtractError>;
