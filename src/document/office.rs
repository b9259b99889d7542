// JURADOC Office Extraction - DOCX and ODT text via their zip containers
// Pulls the main document part and strips markup; one logical page out

use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read};
use tracing::info;

use super::{ExtractError, ExtractResult, PageText};

static XML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Word paragraph and break boundaries become newlines so the hierarchical
/// parser still sees line structure.
static DOCX_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</w:p>|<w:br[^>]*/?>").unwrap());

/// ODT paragraph and heading ends.
static ODT_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</text:p>|</text:h>|<text:line-break[^>]*/?>").unwrap());

/// Extract the text of a DOCX document (word/document.xml).
pub fn extract_docx_text(content: &[u8]) -> ExtractResult<PageText> {
    let xml = read_zip_entry(content, "word/document.xml", "docx")?;
    let text = xml_to_text(&xml, &DOCX_BREAK_RE);
    info!(chars = text.chars().count(), "Extracted DOCX text");
    Ok(PageText::new(1, text))
}

/// Extract the text of an ODT document (content.xml).
pub fn extract_odt_text(content: &[u8]) -> ExtractResult<PageText> {
    let xml = read_zip_entry(content, "content.xml", "odt")?;
    let text = xml_to_text(&xml, &ODT_BREAK_RE);
    info!(chars = text.chars().count(), "Extracted ODT text");
    Ok(PageText::new(1, text))
}

fn read_zip_entry(content: &[u8], entry_name: &str, kind: &'static str) -> ExtractResult<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(content)).map_err(|e| {
        ExtractError::Corrupt {
            kind,
            detail: e.to_string(),
        }
    })?;

    let mut entry = archive.by_name(entry_name).map_err(|e| ExtractError::Corrupt {
        kind,
        detail: format!("missing {entry_name}: {e}"),
    })?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Corrupt {
            kind,
            detail: format!("unreadable {entry_name}: {e}"),
        })?;
    Ok(xml)
}

fn xml_to_text(xml: &str, break_re: &Regex) -> String {
    let with_breaks = break_re.replace_all(xml, "\n");
    let stripped = XML_TAG_RE.replace_all(&with_breaks, "");

    let decoded = stripped
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'");

    // Collapse runs of blank lines left behind by structural markup
    let mut lines: Vec<&str> = Vec::new();
    let mut blank_pending = false;
    for line in decoded.lines() {
        if line.trim().is_empty() {
            blank_pending = !lines.is_empty();
        } else {
            if blank_pending {
                lines.push("");
                blank_pending = false;
            }
            lines.push(line.trim());
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with_entry(name: &str, body: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            writer
                .start_file(name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_docx_paragraphs_become_lines() {
        let xml = r#"<?xml version="1.0"?><w:document><w:body>
            <w:p><w:r><w:t>&#167; 1 Vertragsgegenstand</w:t></w:r></w:p>
            <w:p><w:r><w:t>Dieser Vertrag regelt die Zusammenarbeit.</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let bytes = zip_with_entry("word/document.xml", xml);

        let page = extract_docx_text(&bytes).unwrap();
        let lines: Vec<&str> = page.text.lines().collect();
        assert!(lines[0].contains("1 Vertragsgegenstand"));
        assert!(page.text.contains("regelt die Zusammenarbeit"));
        assert_eq!(page.page_num, 1);
    }

    #[test]
    fn test_odt_entities_decoded() {
        let xml = r#"<office:document-content><office:body>
            <text:p>M&amp;M Partner GmbH</text:p>
        </office:body></office:document-content>"#;
        let bytes = zip_with_entry("content.xml", xml);

        let page = extract_odt_text(&bytes).unwrap();
        assert!(page.text.contains("M&M Partner GmbH"));
    }

    #[test]
    fn test_missing_entry_is_corrupt() {
        let bytes = zip_with_entry("irrelevant.txt", "nope");
        assert!(matches!(
            extract_docx_text(&bytes),
            Err(ExtractError::Corrupt { kind: "docx", .. })
        ));
    }
}
