// JURADOC Hierarchical Parser - German legal section structure to chunk forest
// §/Art. open top-level sections, Absatz/Ziffer/Nr. nest below, numbered
// blocks form the deepest level; oversized sections split with overlap

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use super::normalizer::TextNormalizer;
use crate::models::{Chunk, ChunkType};

/// A parsed section before chunk materialization. `parent_index` points into
/// the returned vector; parents always precede their children.
#[derive(Debug, Clone)]
pub struct Section {
    pub section_id: String,
    pub content: String,
    pub depth: u8,
    pub chunk_type: ChunkType,
    pub parent_index: Option<usize>,
}

struct HeaderMatch {
    section_id: String,
    depth: u8,
    chunk_type: ChunkType,
    tail: String,
}

// Header patterns in descending depth-assigning strength. Matched against
// normalized lines, where "§ 5" has already become "§5".
static PARAGRAPH_SIGN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^§\s*(\d+[a-z]?(?:\.\d+)*)\s*(.*)$").unwrap());
static ARTICLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:Art\.|Artikel)\s*(\d+[a-z]?)\s*(.*)$").unwrap());
static ABSATZ_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Absatz\s+(\d+)\s*(.*)$").unwrap());
static ZIFFER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(Ziffer|Nr\.)\s*(\d+)\s*(.*)$").unwrap());
static NUMBERED_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\.\s+(.+)$").unwrap());

// Reference patterns for citation scanning; same token classes as above.
static SECTION_REF_RES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"§\s*(\d+(?:\.\d+)*[a-z]?)").unwrap(), "§{}"),
        (Regex::new(r"Art\.\s*(\d+[a-z]?)").unwrap(), "Art. {}"),
        (Regex::new(r"Artikel\s+(\d+[a-z]?)").unwrap(), "Art. {}"),
        (Regex::new(r"Absatz\s+(\d+)").unwrap(), "Absatz {}"),
        (Regex::new(r"Ziffer\s+(\d+)").unwrap(), "Ziffer {}"),
        (Regex::new(r"Nr\.\s*(\d+)").unwrap(), "Nr. {}"),
    ]
});

fn match_header(line: &str) -> Option<HeaderMatch> {
    if let Some(caps) = PARAGRAPH_SIGN_RE.captures(line) {
        return Some(HeaderMatch {
            section_id: format!("§{}", &caps[1]),
            depth: 1,
            chunk_type: ChunkType::Section,
            tail: caps[2].trim().to_string(),
        });
    }
    if let Some(caps) = ARTICLE_RE.captures(line) {
        return Some(HeaderMatch {
            section_id: format!("Art. {}", &caps[1]),
            depth: 1,
            chunk_type: ChunkType::Section,
            tail: caps[2].trim().to_string(),
        });
    }
    if let Some(caps) = ABSATZ_RE.captures(line) {
        return Some(HeaderMatch {
            section_id: format!("Absatz {}", &caps[1]),
            depth: 2,
            chunk_type: ChunkType::Subsection,
            tail: caps[2].trim().to_string(),
        });
    }
    if let Some(caps) = ZIFFER_RE.captures(line) {
        let token = if &caps[1] == "Ziffer" { "Ziffer" } else { "Nr." };
        return Some(HeaderMatch {
            section_id: format!("{token} {}", &caps[2]),
            depth: 3,
            chunk_type: ChunkType::Clause,
            tail: caps[3].trim().to_string(),
        });
    }
    if let Some(caps) = NUMBERED_LINE_RE.captures(line) {
        return Some(HeaderMatch {
            section_id: format!("{}.", &caps[1]),
            depth: 4,
            chunk_type: ChunkType::Paragraph,
            tail: caps[2].trim().to_string(),
        });
    }
    None
}

/// Scan free text for section references, in order of appearance, first
/// occurrence wins. Shared by the parser and the citation verifier.
pub fn extract_section_numbers(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    for (re, template) in SECTION_REF_RES.iter() {
        for caps in re.captures_iter(text) {
            let whole = caps.get(0).unwrap();
            let id = template.replacen("{}", &caps[1], 1);
            found.push((whole.start(), id));
        }
    }

    found.sort_by_key(|(start, _)| *start);

    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter(|(_, id)| seen.insert(id.clone()))
        .map(|(_, id)| id)
        .collect()
}

/// Splits normalized text into a parent/child section forest and
/// materializes chunks with stable identifiers and document order.
#[derive(Debug, Clone)]
pub struct DocumentParser {
    max_chunk_size: usize,
    chunk_overlap: usize,
    normalizer: TextNormalizer,
}

impl Default for DocumentParser {
    fn default() -> Self {
        Self::new(1000, 100)
    }
}

impl DocumentParser {
    pub fn new(max_chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            max_chunk_size,
            chunk_overlap: chunk_overlap.min(max_chunk_size.saturating_sub(1)),
            normalizer: TextNormalizer::new(),
        }
    }

    /// Parse a document into ordered sections. A header opens a section whose
    /// content runs until the next header of equal-or-lesser depth; the
    /// parent is the nearest enclosing section of strictly smaller depth.
    pub fn parse_document(&self, text: &str) -> Vec<Section> {
        let normalized = self.normalizer.normalize(text);
        if normalized.is_empty() {
            return Vec::new();
        }

        let mut sections: Vec<Section> = Vec::new();
        let mut stack: Vec<usize> = Vec::new();
        let mut preamble: Vec<String> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        for line in normalized.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(header) = match_header(line) {
                while let Some(&top) = stack.last() {
                    if sections[top].depth >= header.depth {
                        stack.pop();
                    } else {
                        break;
                    }
                }
                let parent_index = stack.last().copied();

                // Repeated labels ("Absatz 1" under several §) are qualified
                // by their parent to keep section ids unique per document.
                let mut section_id = header.section_id;
                if seen_ids.contains(&section_id) {
                    if let Some(parent) = parent_index {
                        section_id = format!("{} {}", sections[parent].section_id, section_id);
                    }
                    let mut counter = 2;
                    while seen_ids.contains(&section_id) {
                        section_id = format!("{section_id}#{counter}");
                        counter += 1;
                    }
                }
                seen_ids.insert(section_id.clone());

                sections.push(Section {
                    section_id,
                    content: header.tail,
                    depth: header.depth,
                    chunk_type: header.chunk_type,
                    parent_index,
                });
                stack.push(sections.len() - 1);
            } else if let Some(&top) = stack.last() {
                let section = &mut sections[top];
                if !section.content.is_empty() {
                    section.content.push(' ');
                }
                section.content.push_str(line);
            } else {
                preamble.push(line.to_string());
            }
        }

        // Text before the first header stands on its own
        if !preamble.is_empty() {
            let shift = 1;
            for section in &mut sections {
                if let Some(parent) = section.parent_index.as_mut() {
                    *parent += shift;
                }
            }
            sections.insert(
                0,
                Section {
                    section_id: "Präambel".to_string(),
                    content: preamble.join(" "),
                    depth: 4,
                    chunk_type: ChunkType::Paragraph,
                    parent_index: None,
                },
            );
        }

        // Empty-after-normalization sections are dropped; indices remapped
        let sections = Self::drop_empty(sections);

        debug!(sections = sections.len(), "Parsed document structure");
        sections
    }

    fn drop_empty(sections: Vec<Section>) -> Vec<Section> {
        let mut remap: Vec<Option<usize>> = vec![None; sections.len()];
        let mut kept: Vec<Section> = Vec::new();

        for (index, mut section) in sections.into_iter().enumerate() {
            if section.content.trim().is_empty() {
                continue;
            }
            // Walk up past dropped ancestors
            section.parent_index = section
                .parent_index
                .and_then(|parent| remap.get(parent).copied().flatten());
            remap[index] = Some(kept.len());
            kept.push(section);
        }
        kept
    }

    /// Materialize chunks: oversized sections are split into overlapping
    /// windows sharing the base section id with a `#i` suffix; children of a
    /// split section attach to its first piece. Positions follow document
    /// order.
    pub fn create_chunks(&self, sections: &[Section], document_id: Uuid) -> Vec<Chunk> {
        let now = Utc::now();
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut first_chunk_id: Vec<Uuid> = Vec::with_capacity(sections.len());
        let mut position: i64 = 0;

        for section in sections {
            let parent_id = section.parent_index.map(|p| first_chunk_id[p]);
            let pieces = self.split_content(&section.content);
            let single = pieces.len() == 1;
            let mut own_first: Option<Uuid> = None;

            for (piece_index, piece) in pieces.into_iter().enumerate() {
                let id = Uuid::new_v4();
                own_first.get_or_insert(id);

                let section_id = if single {
                    section.section_id.clone()
                } else {
                    format!("{}#{}", section.section_id, piece_index + 1)
                };

                chunks.push(Chunk {
                    id,
                    document_id,
                    section_id,
                    parent_id,
                    content: piece,
                    chunk_type: section.chunk_type,
                    position,
                    metadata: json!({ "depth": section.depth }),
                    embedding: None,
                    created_at: now,
                });
                position += 1;
            }

            first_chunk_id.push(own_first.unwrap_or_else(Uuid::new_v4));
        }

        chunks
    }

    /// Parse and materialize in one step.
    pub fn parse_into_chunks(&self, text: &str, document_id: Uuid) -> Vec<Chunk> {
        let sections = self.parse_document(text);
        self.create_chunks(&sections, document_id)
    }

    /// Windowed split on char boundaries; the last window may be shorter.
    fn split_content(&self, content: &str) -> Vec<String> {
        let chars: Vec<char> = content.chars().collect();
        if chars.len() <= self.max_chunk_size {
            return vec![content.to_string()];
        }

        let step = self.max_chunk_size - self.chunk_overlap;
        let mut pieces = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.max_chunk_size).min(chars.len());
            pieces.push(chars[start..end].iter().collect::<String>().trim().to_string());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        pieces.retain(|p| !p.is_empty());
        pieces
    }
}
