// JURADOC PII Recognizers - pattern set for German legal documents
// Case numbers, IBAN, tax ids, contract numbers plus person/org/location

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::PiiEntity;

struct PatternRecognizer {
    entity_type: &'static str,
    regex: Regex,
    score: f32,
    /// When the pattern needs surrounding context (e.g. a "Steuer-ID:"
    /// prefix), group 1 delimits the actual entity span.
    use_group: bool,
}

static RECOGNIZERS: Lazy<Vec<PatternRecognizer>> = Lazy::new(|| {
    vec![
        // German case numbers: "Az.: 1 C 234/23", "Aktenzeichen 1 BvR 123/45"
        PatternRecognizer {
            entity_type: "CASE_NUMBER",
            regex: Regex::new(r"(?:Az\.|Aktenzeichen)\s*:?\s*\d+\s+[A-Z][a-zA-Z]{0,2}\s+\d+/\d+")
                .unwrap(),
            score: 0.85,
            use_group: false,
        },
        // German IBAN, optionally grouped in blocks of four
        PatternRecognizer {
            entity_type: "IBAN",
            regex: Regex::new(r"\bDE\d{2}\s?(?:\d{4}\s?){4}\d{2}\b").unwrap(),
            score: 0.9,
            use_group: false,
        },
        // Umsatzsteuer-ID
        PatternRecognizer {
            entity_type: "VAT_ID",
            regex: Regex::new(r"\bDE\d{9}\b").unwrap(),
            score: 0.85,
            use_group: false,
        },
        // Steuer-ID requires its label as context
        PatternRecognizer {
            entity_type: "TAX_ID",
            regex: Regex::new(r"Steuer-?(?:ID|Nr\.?|nummer)\s*:?\s*(\d{10,11})").unwrap(),
            score: 0.8,
            use_group: true,
        },
        // Contract numbers
        PatternRecognizer {
            entity_type: "CONTRACT_NUMBER",
            regex: Regex::new(r"(?:Vertrags?-?Nr\.|V-Nr\.)\s*:?\s*([A-Z0-9][A-Z0-9\-/]{2,})")
                .unwrap(),
            score: 0.75,
            use_group: true,
        },
        PatternRecognizer {
            entity_type: "EMAIL",
            regex: Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap(),
            score: 0.95,
            use_group: false,
        },
        PatternRecognizer {
            entity_type: "PHONE",
            regex: Regex::new(r"(?:\+49|0049|0)\s?[1-9]\d{1,4}[\s/-]?\d{4,10}\b").unwrap(),
            score: 0.7,
            use_group: false,
        },
        // Persons behind a salutation or title; group 1 is the name itself
        PatternRecognizer {
            entity_type: "PERSON",
            regex: Regex::new(
                r"(?:Herrn?|Frau|Dr\.|Prof\.|Rechtsanwalt|Rechtsanwältin|RA)\s+((?:[A-ZÄÖÜ][a-zäöüß]+)(?:\s+[A-ZÄÖÜ][a-zäöüß]+)+)",
            )
            .unwrap(),
            score: 0.85,
            use_group: true,
        },
        // Organizations carry a legal-form suffix
        PatternRecognizer {
            entity_type: "ORG",
            regex: Regex::new(
                r"\b[A-ZÄÖÜ][\w&äöüß.-]*(?:\s+[A-ZÄÖÜ][\w&äöüß.-]*)*\s+(?:GmbH\s*&\s*Co\.\s*KG\b|GmbH\b|AG\b|KG\b|OHG\b|mbH\b|e\.V\.)",
            )
            .unwrap(),
            score: 0.85,
            use_group: false,
        },
        // Locations behind a preposition, limited to well-known cities
        PatternRecognizer {
            entity_type: "LOCATION",
            regex: Regex::new(
                r"\b(?:in|aus|zu|nach|bei)\s+(Berlin|Hamburg|München|Köln|Frankfurt(?:\s+am\s+Main)?|Stuttgart|Düsseldorf|Leipzig|Dortmund|Essen|Bremen|Dresden|Hannover|Nürnberg|Bonn|Karlsruhe|Wien|Zürich)\b",
            )
            .unwrap(),
            score: 0.8,
            use_group: true,
        },
    ]
});

/// Run every recognizer over the text; spans below the confidence threshold
/// are dropped and overlaps resolved in favor of the higher score, then the
/// longer span. The result is ordered by start offset.
pub fn detect_entities(text: &str, confidence_threshold: f32) -> Vec<PiiEntity> {
    let mut raw: Vec<PiiEntity> = Vec::new();

    for recognizer in RECOGNIZERS.iter() {
        if recognizer.score < confidence_threshold {
            continue;
        }
        for caps in recognizer.regex.captures_iter(text) {
            let span = if recognizer.use_group {
                caps.get(1)
            } else {
                caps.get(0)
            };
            let Some(span) = span else { continue };

            raw.push(PiiEntity {
                entity_type: recognizer.entity_type.to_string(),
                text: span.as_str().to_string(),
                start: span.start(),
                end: span.end(),
                confidence: recognizer.score,
            });
        }
    }

    // Overlap resolution: higher score first, then longer span
    raw.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then((b.end - b.start).cmp(&(a.end - a.start)))
    });

    let mut kept: Vec<PiiEntity> = Vec::new();
    for candidate in raw {
        let overlaps = kept
            .iter()
            .any(|existing| candidate.start < existing.end && existing.start < candidate.end);
        if !overlaps {
            kept.push(candidate);
        }
    }

    kept.sort_by_key(|entity| entity.start);
    kept
}
