// JURADOC Configuration - environment-backed settings with documented defaults
// Every tunable of the pipeline lives here; components receive what they need

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application settings. `Default` carries the documented defaults;
/// `from_env` overrides individual keys from `JURADOC_*` variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // === Embedding ===
    pub embedding_model: String,
    pub embedding_max_sequence_length: usize,

    // === OCR worker ===
    pub ocr_endpoint: String,
    pub ocr_enabled: bool,
    pub enable_handwriting_ocr: bool,
    pub ocr_timeout_secs: u64,          // covers GPU cold start
    pub ocr_confidence_threshold: f32,  // below this, poor-quality pages keep embedded text
    pub render_dpi: u32,

    // === Generation ===
    pub generation_endpoint: String,
    pub generation_model: String,
    pub generation_temperature: f32,
    pub generation_timeout_secs: u64,   // per attempt
    pub generation_max_attempts: u32,

    // === Local verifier (on-premise) ===
    pub verifier_endpoint: String,
    pub verifier_model: String,
    pub verifier_timeout_secs: u64,
    pub use_local_verifier: bool,

    // === Vector store ===
    pub qdrant_url: String,
    pub qdrant_collection: String,
    pub qdrant_timeout_secs: u64,

    // === PII protection ===
    pub pii_mapping_ttl_secs: u64,
    pub pii_confidence_threshold: f32,

    // === Retrieval ===
    pub default_top_k: usize,
    pub similarity_threshold: f32,
    pub max_chunk_size: usize,
    pub chunk_overlap: usize,
    pub sentence_threshold: f32,        // unsupported-sentence cutoff

    // === Caching ===
    pub cache_enabled: bool,
    pub cache_query_results_ttl_secs: u64,
    pub cache_documents_ttl_secs: u64,
    pub cache_query_logs_ttl_secs: u64,

    // === Quotas (per user, per month) ===
    pub quota_tokens_per_month: i64,
    pub quota_queries_per_month: i64,
    pub quota_documents_per_month: i64,
    pub usage_retention_months: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            embedding_model: "intfloat/multilingual-e5-small".to_string(),
            embedding_max_sequence_length: 512,

            ocr_endpoint: "http://localhost:8100".to_string(),
            ocr_enabled: true,
            enable_handwriting_ocr: true,
            ocr_timeout_secs: 300,
            ocr_confidence_threshold: 0.75,
            render_dpi: 150,

            generation_endpoint: "http://localhost:8200".to_string(),
            generation_model: "legal-analyst-large".to_string(),
            generation_temperature: 0.1,
            generation_timeout_secs: 60,
            generation_max_attempts: 3,

            verifier_endpoint: "http://localhost:11434".to_string(),
            verifier_model: "mistral:7b".to_string(),
            verifier_timeout_secs: 30,
            use_local_verifier: true,

            qdrant_url: "http://localhost:6333".to_string(),
            qdrant_collection: "juradoc_chunks".to_string(),
            qdrant_timeout_secs: 5,

            pii_mapping_ttl_secs: 300,
            pii_confidence_threshold: 0.7,

            default_top_k: 5,
            similarity_threshold: 0.0,
            max_chunk_size: 1000,
            chunk_overlap: 100,
            sentence_threshold: 0.4,

            cache_enabled: true,
            cache_query_results_ttl_secs: 3600,
            cache_documents_ttl_secs: 7200,
            cache_query_logs_ttl_secs: 300,

            quota_tokens_per_month: 1_000_000,
            quota_queries_per_month: 1_000,
            quota_documents_per_month: 100,
            usage_retention_months: 13,
        }
    }
}

impl Settings {
    /// Load settings, overriding defaults from `JURADOC_*` environment
    /// variables. Unparseable values fall back to the default silently.
    pub fn from_env() -> Self {
        let mut s = Self::default();

        env_string("JURADOC_EMBEDDING_MODEL", &mut s.embedding_model);
        env_string("JURADOC_OCR_ENDPOINT", &mut s.ocr_endpoint);
        env_parse("JURADOC_OCR_ENABLED", &mut s.ocr_enabled);
        env_parse("JURADOC_ENABLE_HANDWRITING_OCR", &mut s.enable_handwriting_ocr);
        env_parse("JURADOC_OCR_TIMEOUT", &mut s.ocr_timeout_secs);
        env_parse("JURADOC_OCR_CONFIDENCE_THRESHOLD", &mut s.ocr_confidence_threshold);
        env_parse("JURADOC_RENDER_DPI", &mut s.render_dpi);

        env_string("JURADOC_GENERATION_ENDPOINT", &mut s.generation_endpoint);
        env_string("JURADOC_GENERATION_MODEL", &mut s.generation_model);
        env_parse("JURADOC_GENERATION_TIMEOUT", &mut s.generation_timeout_secs);

        env_string("JURADOC_VERIFIER_ENDPOINT", &mut s.verifier_endpoint);
        env_string("JURADOC_VERIFIER_MODEL", &mut s.verifier_model);
        env_parse("JURADOC_VERIFIER_TIMEOUT", &mut s.verifier_timeout_secs);
        env_parse("JURADOC_USE_LOCAL_VERIFIER", &mut s.use_local_verifier);

        env_string("JURADOC_QDRANT_URL", &mut s.qdrant_url);
        env_string("JURADOC_QDRANT_COLLECTION", &mut s.qdrant_collection);

        env_parse("JURADOC_PII_MAPPING_TTL", &mut s.pii_mapping_ttl_secs);
        env_parse("JURADOC_PII_CONFIDENCE_THRESHOLD", &mut s.pii_confidence_threshold);

        env_parse("JURADOC_DEFAULT_TOP_K", &mut s.default_top_k);
        env_parse("JURADOC_MAX_CHUNK_SIZE", &mut s.max_chunk_size);
        env_parse("JURADOC_CHUNK_OVERLAP", &mut s.chunk_overlap);
        env_parse("JURADOC_SENTENCE_THRESHOLD", &mut s.sentence_threshold);

        env_parse("JURADOC_CACHE_ENABLED", &mut s.cache_enabled);
        env_parse("JURADOC_CACHE_QUERY_RESULTS_TTL", &mut s.cache_query_results_ttl_secs);

        env_parse("JURADOC_QUOTA_TOKENS_PER_MONTH", &mut s.quota_tokens_per_month);
        env_parse("JURADOC_QUOTA_QUERIES_PER_MONTH", &mut s.quota_queries_per_month);
        env_parse("JURADOC_QUOTA_DOCUMENTS_PER_MONTH", &mut s.quota_documents_per_month);

        s
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn verifier_timeout(&self) -> Duration {
        Duration::from_secs(self.verifier_timeout_secs)
    }

    pub fn pii_mapping_ttl(&self) -> Duration {
        Duration::from_secs(self.pii_mapping_ttl_secs)
    }
}

fn env_string(key: &str, target: &mut String) {
    if let Ok(v) = std::env::var(key) {
        if !v.trim().is_empty() {
            *target = v;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(v) = std::env::var(key) {
        if let Ok(parsed) = v.trim().parse::<T>() {
            *target = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.pii_mapping_ttl_secs, 300);
        assert_eq!(s.ocr_timeout_secs, 300);
        assert_eq!(s.default_top_k, 5);
        assert_eq!(s.max_chunk_size, 1000);
        assert_eq!(s.chunk_overlap, 100);
        assert!((s.ocr_confidence_threshold - 0.75).abs() < f32::EPSILON);
        assert!((s.sentence_threshold - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("JURADOC_DEFAULT_TOP_K", "7");
        std::env::set_var("JURADOC_OCR_ENABLED", "false");
        let s = Settings::from_env();
        assert_eq!(s.default_top_k, 7);
        assert!(!s.ocr_enabled);
        std::env::remove_var("JURADOC_DEFAULT_TOP_K");
        std::env::remove_var("JURADOC_OCR_ENABLED");
    }
}
