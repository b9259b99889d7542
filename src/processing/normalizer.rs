// JURADOC Text Normalizer - cleanup before parsing and embedding
// Unicode NFC, HTML artifacts, quote/dash unification, legal token spacing

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static TRAILING_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" +\n").unwrap());
static MULTI_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());
static MULTI_NEWLINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static DOUBLE_SECTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"§§\s*").unwrap());
static SECTION_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"§\s+(\d)").unwrap());
static ABSATZ_ABBREV_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Abs\.\s+(\d)").unwrap());
static NUMMER_ABBREV_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Nr\.\s+(\d)").unwrap());

/// Normalizes legal text for parsing and embedding.
#[derive(Debug, Default, Clone)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        // 1. Unicode NFC
        let mut out: String = text.nfc().collect();

        // 2. HTML entities and tags
        out = out
            .replace("&nbsp;", " ")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'");
        out = HTML_TAG_RE.replace_all(&out, "").to_string();

        // 3. Unify quotes and dashes
        out = out
            .chars()
            .map(|c| match c {
                '\u{201E}' | '\u{201C}' | '\u{201D}' | '\u{00AB}' | '\u{00BB}' => '"',
                '\u{201A}' | '\u{2018}' | '\u{2019}' | '\u{2039}' | '\u{203A}' => '\'',
                '\u{2013}' | '\u{2014}' | '\u{2212}' => '-',
                _ => c,
            })
            .collect();

        // 4. Whitespace: line endings, tabs, collapsed spaces, capped newlines
        out = out.replace("\r\n", "\n").replace('\r', "\n").replace('\t', " ");
        out = MULTI_SPACE_RE.replace_all(&out, " ").to_string();
        out = TRAILING_SPACE_RE.replace_all(&out, "\n").to_string();
        out = MULTI_NEWLINE_RE.replace_all(&out, "\n\n").to_string();

        // 5. Legal token spacing
        out = DOUBLE_SECTION_RE.replace_all(&out, "§ ").to_string();
        out = SECTION_SPACE_RE.replace_all(&out, "§$1").to_string();
        out = ABSATZ_ABBREV_RE.replace_all(&out, "Abs. $1").to_string();
        out = NUMMER_ABBREV_RE.replace_all(&out, "Nr. $1").to_string();

        out.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_spacing() {
        let normalizer = TextNormalizer::new();
        assert_eq!(normalizer.normalize("§  823  Abs.  1  BGB"), "§823 Abs. 1 BGB");
    }

    #[test]
    fn test_html_artifacts_removed() {
        let normalizer = TextNormalizer::new();
        let out = normalizer.normalize("&nbsp;&nbsp;Wer vorsätzlich&nbsp;oder fahrlässig...");
        assert_eq!(out, "Wer vorsätzlich oder fahrlässig...");

        let out = normalizer.normalize("<p>Test   text    with     spaces</p>");
        assert_eq!(out, "Test text with spaces");
    }

    #[test]
    fn test_line_endings_and_newline_cap() {
        let normalizer = TextNormalizer::new();
        assert_eq!(normalizer.normalize("Zeile1\r\nZeile2\rZeile3"), "Zeile1\nZeile2\nZeile3");
        assert_eq!(normalizer.normalize("A\n\n\n\n\nB"), "A\n\nB");
    }

    #[test]
    fn test_quotes_and_dashes() {
        let normalizer = TextNormalizer::new();
        assert_eq!(
            normalizer.normalize("\u{201E}Miete\u{201C} \u{2013} monatlich"),
            "\"Miete\" - monatlich"
        );
    }

    #[test]
    fn test_double_section_sign() {
        let normalizer = TextNormalizer::new();
        // §§ 5-7 refers to a range of sections
        assert_eq!(normalizer.normalize("gemäß §§ 5-7 BGB"), "gemäß §5-7 BGB");
    }

    #[test]
    fn test_empty_input() {
        let normalizer = TextNormalizer::new();
        assert_eq!(normalizer.normalize(""), "");
        assert_eq!(normalizer.normalize("   \n\n  "), "");
    }
}
