// JURADOC PDF Extraction - embedded text via pdf-extract, structure via lopdf,
// page rendering via poppler (pdftoppm) for the OCR path

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::GenericImageView;
use lopdf::{Dictionary, Document as PdfDocument, Object};
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ExtractError, ExtractResult, PageImage, PageText};

/// Extracts embedded text and renders pages to images.
#[derive(Debug, Clone)]
pub struct PdfExtractor {
    dpi: u32,
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self { dpi: 150 }
    }
}

impl PdfExtractor {
    /// dpi: rendering resolution; 72 is the PDF native unit, 150 the default
    /// trade-off between OCR quality and payload size.
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }

    /// Extract the embedded text layer, one record per page (1-indexed).
    /// The bbox is the page MediaBox when the page carries text.
    pub async fn extract_embedded_text(&self, content: &[u8]) -> ExtractResult<Vec<PageText>> {
        let owned = content.to_vec();

        let pages = tokio::task::spawn_blocking(move || -> ExtractResult<Vec<PageText>> {
            let texts = raw_page_texts(&owned)?;
            let boxes = media_boxes(&owned);

            let pages = texts
                .into_iter()
                .enumerate()
                .map(|(idx, text)| {
                    let trimmed = text.trim().to_string();
                    let bbox = if trimmed.is_empty() {
                        None
                    } else {
                        boxes.get(idx).copied().flatten()
                    };
                    let mut page = PageText::new(idx + 1, trimmed);
                    page.bbox = bbox;
                    page
                })
                .collect();
            Ok(pages)
        })
        .await
        .map_err(|e| ExtractError::Rendering(format!("extraction task failed: {e}")))??;

        info!(pages = pages.len(), "Extracted embedded PDF text");
        Ok(pages)
    }

    /// Render a single page (1-indexed) to a base64 PNG.
    pub async fn render_page(&self, content: &[u8], page_num: usize) -> ExtractResult<PageImage> {
        let total = page_count(content)?;
        if page_num < 1 || page_num > total {
            return Err(ExtractError::Rendering(format!(
                "invalid page number {page_num} (document has {total} pages)"
            )));
        }

        let mut images = self.render_range(content, Some((page_num, page_num))).await?;
        images
            .pop()
            .ok_or_else(|| ExtractError::Rendering(format!("pdftoppm produced no page {page_num}")))
    }

    /// Render every page to a base64 PNG, in page order.
    pub async fn render_all_pages(&self, content: &[u8]) -> ExtractResult<Vec<PageImage>> {
        let images = self.render_range(content, None).await?;
        info!(pages = images.len(), dpi = self.dpi, "Rendered PDF pages for OCR");
        Ok(images)
    }

    async fn render_range(
        &self,
        content: &[u8],
        range: Option<(usize, usize)>,
    ) -> ExtractResult<Vec<PageImage>> {
        let dpi = self.dpi;
        let owned = content.to_vec();

        tokio::task::spawn_blocking(move || render_blocking(&owned, dpi, range))
            .await
            .map_err(|e| ExtractError::Rendering(format!("render task failed: {e}")))?
    }

    /// PDF info dictionary (title, author, ...) with empty values dropped.
    pub fn extract_metadata(&self, content: &[u8]) -> serde_json::Map<String, serde_json::Value> {
        let mut out = serde_json::Map::new();

        let Ok(doc) = PdfDocument::load_mem(content) else {
            return out;
        };
        let Ok(info_ref) = doc.trailer.get(b"Info") else {
            return out;
        };
        let Some(info) = resolve_dict(&doc, info_ref) else {
            return out;
        };

        for (key, value) in info.iter() {
            if let Object::String(bytes, _) = value {
                let text = String::from_utf8_lossy(bytes).trim().to_string();
                if !text.is_empty() {
                    out.insert(
                        String::from_utf8_lossy(key).to_string(),
                        serde_json::Value::String(text),
                    );
                }
            }
        }
        out
    }
}

/// Number of pages in the document.
pub fn page_count(content: &[u8]) -> ExtractResult<usize> {
    let doc = PdfDocument::load_mem(content).map_err(|e| ExtractError::Corrupt {
        kind: "pdf",
        detail: e.to_string(),
    })?;
    Ok(doc.get_pages().len())
}

/// Raw per-page text, unnormalized, in page order.
pub fn raw_page_texts(content: &[u8]) -> ExtractResult<Vec<String>> {
    pdf_extract::extract_text_from_mem_by_pages(content).map_err(|e| ExtractError::Corrupt {
        kind: "pdf",
        detail: format!("{e:?}"),
    })
}

/// Whether any page references an image XObject.
pub fn has_images(content: &[u8]) -> bool {
    let Ok(doc) = PdfDocument::load_mem(content) else {
        return false;
    };

    for (_page_num, page_id) in doc.get_pages() {
        let Ok(page) = doc.get_dictionary(page_id) else {
            continue;
        };
        let Some(resources) = page.get(b"Resources").ok().and_then(|r| resolve_dict(&doc, r))
        else {
            continue;
        };
        let Some(xobjects) = resources.get(b"XObject").ok().and_then(|x| resolve_dict(&doc, x))
        else {
            continue;
        };

        for (_name, entry) in xobjects.iter() {
            let stream_dict = match entry {
                Object::Reference(id) => doc
                    .get_object(*id)
                    .ok()
                    .and_then(|obj| obj.as_stream().ok())
                    .map(|s| &s.dict),
                Object::Stream(s) => Some(&s.dict),
                _ => None,
            };
            if let Some(dict) = stream_dict {
                if matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image") {
                    return true;
                }
            }
        }
    }
    false
}

/// Per-page MediaBox rectangles, in page order. Pages without an explicit
/// box yield None (inherited boxes are not chased).
fn media_boxes(content: &[u8]) -> Vec<Option<(f32, f32, f32, f32)>> {
    let Ok(doc) = PdfDocument::load_mem(content) else {
        return Vec::new();
    };

    doc.get_pages()
        .into_iter()
        .map(|(_num, page_id)| {
            let page = doc.get_dictionary(page_id).ok()?;
            let Ok(Object::Array(coords)) = page.get(b"MediaBox") else {
                return None;
            };
            if coords.len() != 4 {
                return None;
            }
            Some((
                number(&coords[0])?,
                number(&coords[1])?,
                number(&coords[2])?,
                number(&coords[3])?,
            ))
        })
        .collect()
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn resolve_dict<'a>(doc: &'a PdfDocument, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Runs pdftoppm over the document (or a page range) and collects the
/// produced PNGs as base64 page images.
fn render_blocking(
    content: &[u8],
    dpi: u32,
    range: Option<(usize, usize)>,
) -> ExtractResult<Vec<PageImage>> {
    let work_dir = std::env::temp_dir().join("juradoc_render");
    std::fs::create_dir_all(&work_dir)?;

    let job_id = Uuid::new_v4().simple().to_string();
    let input_path = work_dir.join(format!("{job_id}.pdf"));
    let prefix = work_dir.join(format!("{job_id}_page"));
    std::fs::write(&input_path, content)?;

    let mut cmd = Command::new("pdftoppm");
    cmd.arg("-png").arg("-r").arg(dpi.to_string());
    if let Some((first, last)) = range {
        cmd.arg("-f").arg(first.to_string());
        cmd.arg("-l").arg(last.to_string());
    }
    cmd.arg(&input_path).arg(&prefix);

    let output = cmd.output().map_err(|e| {
        let _ = std::fs::remove_file(&input_path);
        ExtractError::Rendering(format!("failed to run pdftoppm: {e}"))
    })?;

    if !output.status.success() {
        let _ = std::fs::remove_file(&input_path);
        return Err(ExtractError::Rendering(format!(
            "pdftoppm exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    // pdftoppm names outputs <prefix>-<page>.png with zero padding that
    // depends on the page count; recover the page number from the name.
    let prefix_name = format!("{job_id}_page-");
    let mut produced: Vec<(usize, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(&work_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(rest) = name.strip_prefix(&prefix_name) {
            if let Some(num) = rest.strip_suffix(".png").and_then(|n| n.parse::<usize>().ok()) {
                produced.push((num, entry.path()));
            }
        }
    }
    produced.sort_by_key(|(num, _)| *num);

    let mut images = Vec::with_capacity(produced.len());
    for (page_num, path) in &produced {
        let bytes = std::fs::read(path)?;
        let (width, height) = match image::load_from_memory(&bytes) {
            Ok(img) => img.dimensions(),
            Err(e) => {
                warn!(page = page_num, "Unreadable rendered page, skipping: {e}");
                continue;
            }
        };

        images.push(PageImage {
            page_num: *page_num,
            image_base64: BASE64.encode(&bytes),
            width,
            height,
            dpi,
        });
    }

    // Temp cleanup is best-effort
    let _ = std::fs::remove_file(&input_path);
    for (_, path) in produced {
        let _ = std::fs::remove_file(path);
    }

    debug!(pages = images.len(), "pdftoppm render complete");
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_pdf_reports_corrupt() {
        let err = page_count(b"%PDF-1.4 truncated").unwrap_err();
        assert!(matches!(err, ExtractError::Corrupt { kind: "pdf", .. }));
    }

    #[test]
    fn test_page_text_counts() {
        let page = PageText::new(1, "Die Kündigungsfrist beträgt drei Monate".to_string());
        assert_eq!(page.page_num, 1);
        assert_eq!(page.word_count, 5);
        assert!((page.confidence - 1.0).abs() < f32::EPSILON);
        assert!(page.bbox.is_none());
    }

    #[test]
    fn test_number_conversion() {
        assert_eq!(number(&Object::Integer(595)), Some(595.0));
        assert_eq!(number(&Object::Real(841.89)), Some(841.89));
        assert_eq!(number(&Object::Null), None);
    }

    #[tokio::test]
    async fn test_render_rejects_invalid_page() {
        // page_count on garbage fails before pdftoppm is ever invoked
        let extractor = PdfExtractor::default();
        assert!(extractor.render_page(b"not a pdf", 1).await.is_err());
    }
}
