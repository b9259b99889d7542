// JURADOC Local Verifier - on-premise fact-check over an Ollama-style API
// Fail open: an unreachable verifier never blocks the primary verification

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// Marker the model must emit for a clean pass.
const PASS_MARKER: &str = "✓ All statements supported";
const FAIL_MARKER: &str = "Unsupported:";

/// Verdict of the independent fact check.
#[derive(Debug, Clone)]
pub struct FactCheckResult {
    pub is_supported: bool,
    pub details: String,
}

impl FactCheckResult {
    /// The fail-open verdict used whenever the verifier cannot run.
    pub fn unavailable() -> Self {
        Self {
            is_supported: true,
            details: "verifier unavailable".to_string(),
        }
    }
}

/// Contract of the independent answer verifier. Infallible by design:
/// failures collapse into the fail-open verdict.
#[async_trait]
pub trait FactChecker: Send + Sync {
    async fn verify(&self, answer: &str, context: &str, request_id: &str) -> FactCheckResult;
}

/// Configuration of the local verifier client.
#[derive(Debug, Clone)]
pub struct LocalVerifierConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
    pub max_attempts: u32,
}

impl Default for LocalVerifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "mistral:7b".to_string(),
            timeout: Duration::from_secs(30),
            max_attempts: 2,
        }
    }
}

/// Client for the on-premise verification model (different family than the
/// generation model, so the two checks stay independent).
pub struct LocalVerifier {
    client: reqwest::Client,
    config: LocalVerifierConfig,
}

impl LocalVerifier {
    pub fn new(config: LocalVerifierConfig) -> Option<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .ok()?;
        Some(Self { client, config })
    }

    fn build_prompt(answer: &str, context: &str) -> String {
        format!(
            "You are a fact-checker. Verify if the ANSWER is fully supported by the CONTEXT.\n\n\
             CONTEXT:\n{context}\n\n\
             ANSWER:\n{answer}\n\n\
             TASK:\n\
             - Check each statement in the ANSWER\n\
             - Verify it's supported by the CONTEXT\n\
             - If ALL statements are supported, respond: \"{PASS_MARKER}\"\n\
             - If ANY statement is unsupported, list them as: \"- {FAIL_MARKER} [quote the claim]\"\n\n\
             YOUR VERIFICATION:\n"
        )
    }

    /// Pass iff the output carries the pass marker and no unsupported list.
    fn parse_verdict(output: &str) -> bool {
        output.contains(PASS_MARKER) && !output.contains(FAIL_MARKER)
    }

    async fn attempt(&self, prompt: &str) -> Result<String, String> {
        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        let payload = json!({
            "model": self.config.model,
            "prompt": prompt,
            "temperature": 0.1,
            "stream": false,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("verifier returned {}", response.status()));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
        body.get("response")
            .and_then(|r| r.as_str())
            .map(|r| r.to_string())
            .ok_or_else(|| "missing response field".to_string())
    }
}

#[async_trait]
impl FactChecker for LocalVerifier {
    async fn verify(&self, answer: &str, context: &str, request_id: &str) -> FactCheckResult {
        let prompt = Self::build_prompt(answer, context);

        for attempt in 1..=self.config.max_attempts {
            match self.attempt(&prompt).await {
                Ok(output) => {
                    let is_supported = Self::parse_verdict(&output);
                    info!(
                        request_id,
                        verdict = if is_supported { "PASS" } else { "FAIL" },
                        "Local verification complete"
                    );
                    return FactCheckResult {
                        is_supported,
                        details: output,
                    };
                }
                Err(e) => {
                    warn!(request_id, attempt, "Local verification attempt failed: {e}");
                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                }
            }
        }

        warn!(request_id, "Local verifier unavailable, failing open");
        FactCheckResult::unavailable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verdict_pass() {
        assert!(LocalVerifier::parse_verdict("✓ All statements supported"));
        assert!(LocalVerifier::parse_verdict(
            "Analysis done.\n✓ All statements supported\n"
        ));
    }

    #[test]
    fn test_parse_verdict_fail() {
        assert!(!LocalVerifier::parse_verdict(
            "- Unsupported: The contract must be notarized."
        ));
        // Pass marker plus an unsupported list is still a fail
        assert!(!LocalVerifier::parse_verdict(
            "✓ All statements supported\n- Unsupported: something"
        ));
        // No marker at all is a fail
        assert!(!LocalVerifier::parse_verdict("The answer looks plausible."));
    }

    #[test]
    fn test_prompt_contains_both_texts() {
        let prompt = LocalVerifier::build_prompt("Die Antwort.", "Der Kontext.");
        assert!(prompt.contains("CONTEXT:\nDer Kontext."));
        assert!(prompt.contains("ANSWER:\nDie Antwort."));
    }

    #[tokio::test]
    async fn test_unreachable_verifier_fails_open() {
        let verifier = LocalVerifier::new(LocalVerifierConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            max_attempts: 2,
            timeout: Duration::from_secs(1),
            ..Default::default()
        })
        .unwrap();

        let result = verifier.verify("Antwort", "Kontext", "req-1").await;
        assert!(result.is_supported);
        assert_eq!(result.details, "verifier unavailable");
    }
}
