// JURADOC Generation Client - cite-first prompting with retry and backoff
// The model must cite section ids before each claim or say it found nothing

use async_trait::async_trait;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::{GenerationError, GenerationResultT};

/// Cite-first analysis prompt. The retrieved context goes under PROVIDED
/// SECTIONS, the question under USER QUESTION; claims must carry their
/// section id and missing information must be called out explicitly.
const ANALYSIS_PROMPT: &str = "You are a precise German legal document analyst.

CRITICAL RULES:
1. ONLY use information from the provided sections below.
2. ALWAYS cite section numbers (§X, Absatz Y, Art. Z) BEFORE making ANY claim.
3. If information is NOT in the provided sections, explicitly state: \"Not found in provided sections\".
4. Format every statement as: \"According to [§X.Y / Absatz Z]: [your statement]\".
5. Never paraphrase legal text when quoting is possible.
6. Never invent or assume information not explicitly stated.
7. Wenn mehrere Abschnitte relevant sind, zitiere alle.

---

PROVIDED SECTIONS:

{context}

---

USER QUESTION:

{query}

YOUR ANALYSIS:
";

/// Outcome of one generation call.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub answer: String,
    pub latency_ms: u64,
    pub tokens_used: Option<u64>,
    pub model_version: String,
}

/// Contract of the answer generator.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        query: &str,
        context: &str,
        request_id: &str,
    ) -> GenerationResultT<GenerationResult>;
}

/// Configuration of the HTTP generation client.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    /// Per-attempt deadline.
    pub timeout: Duration,
    pub max_attempts: u32,
    /// Base of the exponential backoff between attempts.
    pub backoff_base: Duration,
    /// Upper bound on a single backoff sleep.
    pub backoff_cap: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8200".to_string(),
            model: "legal-analyst-large".to_string(),
            temperature: 0.1,
            timeout: Duration::from_secs(60),
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(10),
        }
    }
}

/// HTTP client for the external generation model.
pub struct GenerationClient {
    client: reqwest::Client,
    config: GenerationConfig,
}

impl GenerationClient {
    pub fn new(config: GenerationConfig) -> GenerationResultT<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn build_prompt(&self, query: &str, context: &str) -> String {
        ANALYSIS_PROMPT
            .replacen("{context}", context, 1)
            .replacen("{query}", query, 1)
    }

    async fn attempt(&self, prompt: &str) -> GenerationResultT<(String, Option<u64>)> {
        let url = format!(
            "{}/api/generate",
            self.config.endpoint.trim_end_matches('/')
        );
        let payload = json!({
            "model": self.config.model,
            "prompt": prompt,
            "temperature": self.config.temperature,
            "stream": false,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.config.timeout.as_secs())
                } else {
                    GenerationError::Unavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::BadResponse(format!("{status}: {body}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::BadResponse(e.to_string()))?;

        let answer = body
            .get("response")
            .and_then(|r| r.as_str())
            .ok_or_else(|| GenerationError::BadResponse("missing response field".to_string()))?
            .to_string();

        let tokens_used = match (
            body.get("prompt_eval_count").and_then(|v| v.as_u64()),
            body.get("eval_count").and_then(|v| v.as_u64()),
        ) {
            (Some(prompt_tokens), Some(completion_tokens)) => {
                Some(prompt_tokens + completion_tokens)
            }
            (Some(tokens), None) | (None, Some(tokens)) => Some(tokens),
            (None, None) => None,
        };

        Ok((answer, tokens_used))
    }
}

#[async_trait]
impl Generator for GenerationClient {
    /// Explicit retry loop: up to `max_attempts` with exponential backoff
    /// (base 2 s, cap 10 s), every attempt correlated by request id.
    async fn generate(
        &self,
        query: &str,
        context: &str,
        request_id: &str,
    ) -> GenerationResultT<GenerationResult> {
        let prompt = self.build_prompt(query, context);
        let started = Instant::now();
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_attempts {
            match self.attempt(&prompt).await {
                Ok((answer, tokens_used)) => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    info!(
                        request_id,
                        attempt, latency_ms, tokens_used, "Generation completed"
                    );
                    return Ok(GenerationResult {
                        answer,
                        latency_ms,
                        tokens_used,
                        model_version: self.config.model.clone(),
                    });
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(request_id, attempt, "Generation attempt failed: {last_error}");

                    if attempt < self.config.max_attempts {
                        let backoff = self
                            .config
                            .backoff_base
                            .saturating_mul(1 << (attempt - 1))
                            .min(self.config.backoff_cap);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        Err(GenerationError::Exhausted {
            attempts: self.config.max_attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_structure() {
        let client = GenerationClient::new(GenerationConfig::default()).unwrap();
        let prompt = client.build_prompt(
            "Wie lang ist die Kündigungsfrist?",
            "[§5.2] Die Kündigungsfrist beträgt 3 Monate.",
        );

        assert!(prompt.contains("PROVIDED SECTIONS:"));
        assert!(prompt.contains("USER QUESTION:"));
        assert!(prompt.contains("[§5.2] Die Kündigungsfrist beträgt 3 Monate."));
        assert!(prompt.contains("Wie lang ist die Kündigungsfrist?"));

        // Context precedes the question; citations must come first
        let context_at = prompt.find("PROVIDED SECTIONS").unwrap();
        let question_at = prompt.find("USER QUESTION").unwrap();
        assert!(context_at < question_at);
    }

    #[tokio::test]
    async fn test_retries_then_exhausted() {
        let client = GenerationClient::new(GenerationConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            max_attempts: 3,
            backoff_base: Duration::from_millis(5),
            backoff_cap: Duration::from_millis(20),
            timeout: Duration::from_secs(1),
            ..Default::default()
        })
        .unwrap();

        let err = client.generate("Frage", "Kontext", "req-1").await.unwrap_err();
        match err {
            GenerationError::Exhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_backoff_progression() {
        // 2s, 4s, then capped at 10s from the third retry onwards
        let config = GenerationConfig::default();
        let backoffs: Vec<Duration> = (1..=4u32)
            .map(|attempt| {
                config
                    .backoff_base
                    .saturating_mul(1 << (attempt - 1))
                    .min(config.backoff_cap)
            })
            .collect();
        assert_eq!(
            backoffs,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(10),
            ]
        );
    }
}
