// JURADOC Citation Verifier - score cited sections, flag unsupported claims
// Overlap is Jaccard over lowercased, punctuation-stripped word multisets

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::llm::FactCheckResult;
use crate::models::{Citation, RetrievalResult};
use crate::processing::extract_section_numbers;

static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s§]").unwrap());

/// Sentence terminators count only when followed by whitespace or the end
/// of text, so "§5.2" survives splitting.
static SENTENCE_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?](\s+|$)").unwrap());

/// Section references inside a citing sentence, removed before scoring the
/// claim against the chunk content.
static SECTION_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"§\s*\d+(?:\.\d+)*[a-z]?|Art\.\s*\d+[a-z]?|Artikel\s+\d+|Absatz\s+\d+|Ziffer\s+\d+|Nr\.\s*\d+")
        .unwrap()
});

/// Connector words of the mandated cite-first scaffold ("According to §X: ...");
/// they carry no claim content.
const CITATION_SCAFFOLD: &[&str] = &[
    "according", "to", "laut", "gemäß", "nach", "as", "per", "zufolge",
];

/// Outcome of verifying one answer against its retrieved evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub is_supported: bool,
    pub citations: Vec<Citation>,
    pub unsupported_statements: Vec<String>,
    pub confidence: f32,
}

/// Verifies generated answers: resolves citations against retrieved chunks,
/// scores them by text overlap, detects unsupported sentences and composes
/// the final confidence.
#[derive(Debug, Clone)]
pub struct Verifier {
    sentence_threshold: f32,
}

impl Default for Verifier {
    fn default() -> Self {
        Self {
            sentence_threshold: 0.4,
        }
    }
}

impl Verifier {
    pub fn new(sentence_threshold: f32) -> Self {
        Self { sentence_threshold }
    }

    /// Extract citations from an answer and resolve them against the
    /// retrieved results. Unresolvable references become hallucinated
    /// citations with zero confidence and a nil chunk id.
    pub fn extract_citations(
        &self,
        answer: &str,
        results: &[RetrievalResult],
    ) -> Vec<Citation> {
        let references = extract_section_numbers(answer);
        let mut citations = Vec::with_capacity(references.len());

        for reference in references {
            match self.resolve(&reference, results) {
                Some(result) => {
                    let citing = self.citing_sentences(answer, &reference).join(" ");
                    let claim = strip_citation_scaffold(&citing);
                    let confidence = self.text_overlap(&claim, &result.content);
                    citations.push(Citation {
                        section_id: reference,
                        content: result.content.clone(),
                        confidence,
                        chunk_id: result.chunk_id,
                    });
                }
                None => {
                    debug!(reference, "Citation does not match any retrieved section");
                    citations.push(Citation {
                        section_id: reference,
                        content: String::new(),
                        confidence: 0.0,
                        chunk_id: Uuid::nil(),
                    });
                }
            }
        }
        citations
    }

    /// Exact section-id match first. After chunk splitting, several results
    /// can share a base id (`§5#1`, `§5#2`); the highest-similarity one
    /// resolves the citation.
    fn resolve<'a>(
        &self,
        reference: &str,
        results: &'a [RetrievalResult],
    ) -> Option<&'a RetrievalResult> {
        if let Some(exact) = results.iter().find(|r| r.section_id == reference) {
            return Some(exact);
        }

        results
            .iter()
            .filter(|r| base_section_id(&r.section_id) == reference)
            .max_by(|a, b| {
                a.similarity
                    .partial_cmp(&b.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    /// Sentences of the answer containing the given section reference.
    fn citing_sentences(&self, text: &str, reference: &str) -> Vec<String> {
        split_sentences(text)
            .into_iter()
            .filter(|sentence| sentence.contains(reference))
            .collect()
    }

    /// Jaccard over word bags: |A ∩ B| / |A ∪ B| with multiset counts.
    fn text_overlap(&self, a: &str, b: &str) -> f32 {
        let bag_a = word_bag(a);
        let bag_b = word_bag(b);

        if bag_a.is_empty() || bag_b.is_empty() {
            return 0.0;
        }

        let mut intersection = 0usize;
        let mut union = 0usize;

        for (word, &count_a) in &bag_a {
            let count_b = bag_b.get(word).copied().unwrap_or(0);
            intersection += count_a.min(count_b);
            union += count_a.max(count_b);
        }
        for (word, &count_b) in &bag_b {
            if !bag_a.contains_key(word) {
                union += count_b;
            }
        }

        if union == 0 {
            0.0
        } else {
            intersection as f32 / union as f32
        }
    }

    /// Full verification: citations, unsupported sentences, composed
    /// confidence. The independent fact check, when supplied, gates
    /// `is_supported` alongside the sentence analysis.
    pub fn verify_answer(
        &self,
        answer: &str,
        results: &[RetrievalResult],
        fact_check: Option<&FactCheckResult>,
    ) -> VerificationReport {
        let citations = self.extract_citations(answer, results);
        let sentences = split_sentences(answer);

        let mut unsupported: Vec<String> = Vec::new();

        // Hallucinated citations are themselves unsupported claims
        for citation in citations.iter().filter(|c| c.chunk_id.is_nil()) {
            unsupported.push(format!(
                "Citation not found in retrieved sections: {}",
                citation.section_id
            ));
        }

        // A sentence needs a recognized citation and enough overlap with
        // the retrieved content to count as supported
        for sentence in &sentences {
            let has_citation = extract_section_numbers(sentence)
                .iter()
                .any(|reference| citations.iter().any(|c| !c.chunk_id.is_nil() && c.section_id == *reference));

            let best_overlap = results
                .iter()
                .map(|r| self.text_overlap(sentence, &r.content))
                .fold(0.0f32, f32::max);

            if !has_citation || best_overlap < self.sentence_threshold {
                unsupported.push(sentence.clone());
            }
        }

        let fact_check_supported = fact_check.map_or(true, |f| f.is_supported);
        let is_supported = unsupported.is_empty() && fact_check_supported;

        let confidence = self.compose_confidence(&citations, results, &sentences, &unsupported);

        VerificationReport {
            is_supported,
            citations,
            unsupported_statements: unsupported,
            confidence,
        }
    }

    /// Weighted mean: citation confidence (0.5), retrieval similarity (0.3),
    /// sentence coverage (0.2). Clamped to [0, 1].
    fn compose_confidence(
        &self,
        citations: &[Citation],
        results: &[RetrievalResult],
        sentences: &[String],
        unsupported: &[String],
    ) -> f32 {
        let citation_confidence = if citations.is_empty() {
            0.0
        } else {
            citations.iter().map(|c| c.confidence).sum::<f32>() / citations.len() as f32
        };

        let retrieval_similarity = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.similarity).sum::<f32>() / results.len() as f32
        };

        let coverage = if sentences.is_empty() {
            0.0
        } else {
            let unsupported_sentences = unsupported.len().min(sentences.len());
            1.0 - unsupported_sentences as f32 / sentences.len() as f32
        };

        (0.5 * citation_confidence + 0.3 * retrieval_similarity + 0.2 * coverage).clamp(0.0, 1.0)
    }
}

/// Sentence split on `.`, `!`, `?`. Short fragments (citations alone,
/// enumeration numbers) are not sentences.
fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE_END_RE
        .split(text)
        .map(|s| s.trim())
        .filter(|s| s.split_whitespace().count() >= 3)
        .map(|s| s.to_string())
        .collect()
}

/// Reduce a citing sentence to its claim: drop the section references and
/// the cite-first connector words around them.
fn strip_citation_scaffold(text: &str) -> String {
    let without_refs = SECTION_TOKEN_RE.replace_all(text, " ");
    without_refs
        .split_whitespace()
        .filter(|word| {
            let bare = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            !CITATION_SCAFFOLD.contains(&bare.as_str())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Base id of a split chunk: `§5#2` resolves to `§5`.
fn base_section_id(section_id: &str) -> &str {
    section_id.split('#').next().unwrap_or(section_id)
}

fn word_bag(text: &str) -> HashMap<String, usize> {
    let lowered = text.to_lowercase();
    let cleaned = NON_WORD_RE.replace_all(&lowered, " ");
    let mut bag = HashMap::new();
    for word in cleaned.split_whitespace() {
        *bag.entry(word.to_string()).or_insert(0) += 1;
    }
    bag
}
