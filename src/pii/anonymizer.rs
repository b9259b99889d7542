// JURADOC PII Anonymizer - reversible placeholder substitution per request
// Mapping lives in the KV store under the request id and is consumed on
// de-anonymize; repeated calls under one request accumulate into one mapping

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::recognizers::detect_entities;
use super::PiiResult;
use crate::models::PiiEntity;
use crate::store::kv::{pii_key, KvStore};

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Z_]+)_(\d+)>").unwrap());

/// Reversible PII anonymization. Holds no cross-request state: entity
/// counters are derived per call from the request's stored mapping.
pub struct PiiAnonymizer {
    kv: Arc<dyn KvStore>,
    confidence_threshold: f32,
    mapping_ttl: Duration,
}

impl PiiAnonymizer {
    pub fn new(kv: Arc<dyn KvStore>, confidence_threshold: f32, mapping_ttl: Duration) -> Self {
        Self {
            kv,
            confidence_threshold,
            mapping_ttl,
        }
    }

    /// Detect-only mode: spans without mutation.
    pub fn detect(&self, text: &str) -> Vec<PiiEntity> {
        detect_entities(text, self.confidence_threshold)
    }

    /// Replace detected entities with `<TYPE_n>` placeholders and persist
    /// the mapping under the request id. Calling again under the same
    /// request id continues the counters and reuses placeholders for
    /// surfaces already mapped, so query and context stay consistent.
    pub async fn anonymize(
        &self,
        text: &str,
        request_id: &str,
    ) -> PiiResult<(String, HashMap<String, String>)> {
        let entities = self.detect(text);

        if entities.is_empty() {
            info!(request_id, "No PII detected");
            return Ok((text.to_string(), HashMap::new()));
        }

        let mut mapping = self.load_mapping(request_id).await?.unwrap_or_default();
        let mut reverse: HashMap<String, String> = mapping
            .iter()
            .map(|(placeholder, surface)| (surface.clone(), placeholder.clone()))
            .collect();
        let mut counters = counters_from(&mapping);

        // Assign placeholders in reading order so numbering is stable
        let mut assignments: Vec<(PiiEntity, String)> = Vec::with_capacity(entities.len());
        for entity in entities {
            let placeholder = if let Some(existing) = reverse.get(&entity.text) {
                existing.clone()
            } else {
                let counter = counters.entry(entity.entity_type.clone()).or_insert(0);
                *counter += 1;
                let placeholder = format!("<{}_{}>", entity.entity_type, counter);
                reverse.insert(entity.text.clone(), placeholder.clone());
                mapping.insert(placeholder.clone(), entity.text.clone());
                placeholder
            };
            assignments.push((entity, placeholder));
        }

        // Replace from the highest start offset down to avoid shifting
        let mut anonymized = text.to_string();
        for (entity, placeholder) in assignments.iter().rev() {
            anonymized.replace_range(entity.start..entity.end, placeholder);
        }

        self.store_mapping(request_id, &mapping).await?;

        info!(
            request_id,
            entities = assignments.len(),
            "Anonymized PII entities"
        );
        Ok((anonymized, mapping))
    }

    /// Restore original surfaces. The mapping is single-use: it is deleted
    /// after a successful restore. A missing mapping (TTL expiry or misuse)
    /// is logged and the input returned unchanged.
    pub async fn deanonymize(&self, text: &str, request_id: &str) -> PiiResult<String> {
        let Some(mapping) = self.load_mapping(request_id).await? else {
            // A clean request never stored a mapping; placeholders without
            // one mean TTL expiry or misuse and must be visible in the logs
            if PLACEHOLDER_RE.is_match(text) {
                warn!(request_id, "PII mapping missing for placeholder-bearing text");
            } else {
                debug!(request_id, "No PII mapping stored, nothing to restore");
            }
            return Ok(text.to_string());
        };

        // Longest placeholder first: <PERSON_1> is a prefix of <PERSON_12>
        let mut pairs: Vec<(&String, &String)> = mapping.iter().collect();
        pairs.sort_by_key(|(placeholder, _)| std::cmp::Reverse(placeholder.len()));

        let mut restored = text.to_string();
        for (placeholder, original) in pairs {
            restored = restored.replace(placeholder, original);
        }

        self.kv.delete(&pii_key(request_id)).await?;

        info!(request_id, "De-anonymized text, mapping consumed");
        Ok(restored)
    }

    /// Whether a mapping is currently stored for the request.
    pub async fn mapping_exists(&self, request_id: &str) -> bool {
        self.kv.exists(&pii_key(request_id)).await.unwrap_or(false)
    }

    /// Best-effort cleanup of a pending mapping (cancellation path).
    pub async fn discard_mapping(&self, request_id: &str) {
        if let Err(e) = self.kv.delete(&pii_key(request_id)).await {
            warn!(request_id, "Failed to discard pending PII mapping: {e}");
        }
    }

    /// True iff re-running the detector on the text finds nothing.
    pub fn verify_no_leakage(&self, text: &str) -> bool {
        let leaked = self.detect(text);
        if !leaked.is_empty() {
            warn!(
                entities = leaked.len(),
                "PII leakage detected in anonymized text"
            );
            return false;
        }
        true
    }

    async fn load_mapping(
        &self,
        request_id: &str,
    ) -> PiiResult<Option<HashMap<String, String>>> {
        match self.kv.get(&pii_key(request_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn store_mapping(
        &self,
        request_id: &str,
        mapping: &HashMap<String, String>,
    ) -> PiiResult<()> {
        let raw = serde_json::to_string(mapping)?;
        self.kv
            .set_ex(&pii_key(request_id), raw, self.mapping_ttl)
            .await?;
        Ok(())
    }
}

/// Recover per-type counters from stored placeholders so accumulation
/// continues the numbering instead of restarting at 1.
fn counters_from(mapping: &HashMap<String, String>) -> HashMap<String, u32> {
    let mut counters: HashMap<String, u32> = HashMap::new();
    for placeholder in mapping.keys() {
        if let Some(caps) = PLACEHOLDER_RE.captures(placeholder) {
            if let Ok(n) = caps[2].parse::<u32>() {
                let entry = counters.entry(caps[1].to_string()).or_insert(0);
                *entry = (*entry).max(n);
            }
        }
    }
    counters
}
