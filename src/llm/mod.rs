// JURADOC LLM Module - generation endpoint and on-premise fact-check client
// Both are RPC collaborators; prompts and parsing live here, nothing else

pub mod generation;
pub mod local_verifier;

pub use generation::{GenerationClient, GenerationConfig, GenerationResult, Generator};
pub use local_verifier::{FactCheckResult, FactChecker, LocalVerifier, LocalVerifierConfig};

/// Errors from the generation path. Surfaced only after retries are
/// exhausted; every log line carries the request id for correlation.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation endpoint unreachable: {0}")]
    Unavailable(String),

    #[error("generation deadline exceeded after {0}s")]
    Timeout(u64),

    #[error("invalid generation response: {0}")]
    BadResponse(String),

    #[error("generation failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

pub type GenerationResultT<T> = Result<T, GenerationError>;
