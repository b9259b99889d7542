// JURADOC Email Extraction - RFC-822 messages with thread info and attachments
// Body preference: text/plain, falling back to stripped text/html

use chrono::{DateTime, Utc};
use mail_parser::{Address, MessageParser, MimeHeaders};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ExtractError, ExtractResult};

/// Attachment with decoded content. Attachments are surfaced as metadata;
/// they are not fed back into ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: usize,
    #[serde(skip)]
    pub content: Vec<u8>,
}

/// Structured email message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEmail {
    pub subject: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub date: Option<DateTime<Utc>>,
    pub body_text: String,
    pub body_html: Option<String>,
    pub attachments: Vec<EmailAttachment>,
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
}

/// Thread position of a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
    pub is_reply: bool,
    pub is_forward: bool,
}

static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Signature markers after which the body is cut, including the German
/// mobile-client signatures common in the corpus.
const SIGNATURE_MARKERS: &[&str] = &[
    "-- ",
    "___",
    "Sent from",
    "Get Outlook for",
    "Von meinem iPhone gesendet",
    "Von meinem Android-Gerät gesendet",
];

/// Extracts structured data from EML bytes.
#[derive(Debug, Default, Clone)]
pub struct EmailExtractor;

impl EmailExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_message(&self, content: &[u8]) -> ExtractResult<ExtractedEmail> {
        let message = MessageParser::default()
            .parse(content)
            .ok_or_else(|| ExtractError::Corrupt {
                kind: "eml",
                detail: "failed to parse message".to_string(),
            })?;

        let subject = message.subject().unwrap_or_default().to_string();

        let sender = message
            .from()
            .and_then(|addrs| addrs.first())
            .map(format_address)
            .unwrap_or_default();

        let mut recipients: Vec<String> = collect_addresses(message.to());
        recipients.extend(collect_addresses(message.cc()));

        let date = message
            .date()
            .and_then(|d| DateTime::parse_from_rfc3339(&d.to_rfc3339()).ok())
            .map(|d| d.with_timezone(&Utc));

        let message_id = message.message_id().map(|id| id.to_string());
        let in_reply_to = message
            .header_raw("In-Reply-To")
            .map(|raw| raw.trim().to_string());
        let references = message
            .header_raw("References")
            .map(|raw| raw.split_whitespace().map(|r| r.to_string()).collect())
            .unwrap_or_default();

        let body_text = message
            .body_text(0)
            .map(|body| body.to_string())
            .unwrap_or_default();
        let body_html = message.body_html(0).map(|body| body.to_string());

        let attachments: Vec<EmailAttachment> = message
            .attachments()
            .map(|part| EmailAttachment {
                filename: part
                    .attachment_name()
                    .unwrap_or("unbenannt")
                    .to_string(),
                content_type: part
                    .content_type()
                    .map(|ct| match ct.subtype() {
                        Some(sub) => format!("{}/{}", ct.ctype(), sub),
                        None => ct.ctype().to_string(),
                    })
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                size_bytes: part.contents().len(),
                content: part.contents().to_vec(),
            })
            .collect();

        info!(
            subject,
            attachments = attachments.len(),
            "Extracted email message"
        );

        Ok(ExtractedEmail {
            subject,
            sender,
            recipients,
            date,
            body_text: body_text.trim().to_string(),
            body_html,
            attachments,
            message_id,
            in_reply_to,
            references,
        })
    }

    /// Flatten a message into document text: header block plus cleaned body.
    /// Prefers the plain-text body; falls back to tag-stripped HTML.
    pub fn as_document_text(&self, message: &ExtractedEmail) -> String {
        let mut lines = Vec::new();

        if !message.subject.is_empty() {
            lines.push(format!("Subject: {}", message.subject));
        }
        if !message.sender.is_empty() {
            lines.push(format!("From: {}", message.sender));
        }
        if !message.recipients.is_empty() {
            lines.push(format!("To: {}", message.recipients.join(", ")));
        }
        if let Some(date) = message.date {
            lines.push(format!("Date: {}", date.format("%Y-%m-%d %H:%M:%S")));
        }

        let body = if !message.body_text.is_empty() {
            message.body_text.clone()
        } else if let Some(html) = &message.body_html {
            HTML_TAG_RE.replace_all(html, " ").to_string()
        } else {
            String::new()
        };

        lines.push(String::new());
        lines.push(self.clean_body(&body));
        lines.join("\n")
    }

    /// Strip quoted replies and cut at the first signature marker.
    pub fn clean_body(&self, text: &str) -> String {
        let unquoted: Vec<&str> = text
            .lines()
            .filter(|line| !line.trim_start().starts_with('>'))
            .collect();
        let mut cleaned = unquoted.join("\n");

        for marker in SIGNATURE_MARKERS {
            if let Some(idx) = cleaned.find(marker) {
                cleaned.truncate(idx);
            }
        }

        cleaned.trim().to_string()
    }

    pub fn thread_info(&self, message: &ExtractedEmail) -> ThreadInfo {
        let subject = message.subject.as_str();
        ThreadInfo {
            message_id: message.message_id.clone(),
            in_reply_to: message.in_reply_to.clone(),
            references: message.references.clone(),
            is_reply: message.in_reply_to.is_some(),
            is_forward: subject.contains("Fwd:") || subject.contains("FW:") || subject.contains("WG:"),
        }
    }
}

fn collect_addresses(addresses: Option<&Address>) -> Vec<String> {
    addresses
        .map(|addrs| addrs.iter().map(format_address).collect())
        .unwrap_or_default()
}

fn format_address(addr: &mail_parser::Addr) -> String {
    match (addr.name(), addr.address()) {
        (Some(name), Some(address)) => format!("{name} <{address}>"),
        (None, Some(address)) => address.to_string(),
        (Some(name), None) => name.to_string(),
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_EML: &[u8] = b"From: Kanzlei Weber <kanzlei@example.de>\r\n\
To: Mandant <mandant@example.de>\r\n\
Cc: Sekretariat <office@example.de>\r\n\
Subject: Fristsache Mietvertrag\r\n\
Message-ID: <msg-1@example.de>\r\n\
Date: Mon, 13 Jul 2026 10:00:00 +0200\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Sehr geehrte Damen und Herren,\r\n\
die Frist endet am 31.08.2026.\r\n\
> Das war die urspruengliche Nachricht.\r\n\
Mit freundlichen Gruessen\r\n\
-- \r\n\
Kanzlei Weber\r\n";

    #[test]
    fn test_extract_headers_and_body() {
        let extractor = EmailExtractor::new();
        let message = extractor.extract_message(SAMPLE_EML).unwrap();

        assert_eq!(message.subject, "Fristsache Mietvertrag");
        assert!(message.sender.contains("kanzlei@example.de"));
        assert_eq!(message.recipients.len(), 2);
        assert_eq!(message.message_id.as_deref(), Some("msg-1@example.de"));
        assert!(message.body_text.contains("die Frist endet"));
        assert!(message.date.is_some());
    }

    #[test]
    fn test_clean_body_strips_quotes_and_signature() {
        let extractor = EmailExtractor::new();
        let cleaned = extractor.clean_body(
            "Antwort hier.\n> zitierte Zeile\nNoch eine Zeile.\n-- \nSignatur GmbH",
        );

        assert!(cleaned.contains("Antwort hier."));
        assert!(cleaned.contains("Noch eine Zeile."));
        assert!(!cleaned.contains("zitierte Zeile"));
        assert!(!cleaned.contains("Signatur GmbH"));
    }

    #[test]
    fn test_german_mobile_signature_cut() {
        let extractor = EmailExtractor::new();
        let cleaned =
            extractor.clean_body("Kurze Antwort.\nVon meinem iPhone gesendet");
        assert_eq!(cleaned, "Kurze Antwort.");
    }

    #[test]
    fn test_document_text_contains_header_block() {
        let extractor = EmailExtractor::new();
        let message = extractor.extract_message(SAMPLE_EML).unwrap();
        let text = extractor.as_document_text(&message);

        assert!(text.starts_with("Subject: Fristsache Mietvertrag"));
        assert!(text.contains("From: "));
        assert!(text.contains("die Frist endet am 31.08.2026."));
        // Quoted reply lines and signature are cleaned out
        assert!(!text.contains("urspruengliche Nachricht"));
    }

    #[test]
    fn test_thread_info_reply_detection() {
        let extractor = EmailExtractor::new();
        let mut message = extractor.extract_message(SAMPLE_EML).unwrap();
        let info = extractor.thread_info(&message);
        assert!(!info.is_reply);

        message.in_reply_to = Some("<earlier@example.de>".to_string());
        message.subject = "WG: Fristsache Mietvertrag".to_string();
        let info = extractor.thread_info(&message);
        assert!(info.is_reply);
        assert!(info.is_forward);
    }

    #[test]
    fn test_garbage_is_not_fatal_structure() {
        let extractor = EmailExtractor::new();
        // mail-parser accepts almost anything; a headerless blob becomes an
        // empty-ish message rather than an error, matching lenient intake
        if let Ok(message) = extractor.extract_message(b"plain blob") {
            assert!(message.subject.is_empty());
        }
    }
}
