// JURADOC PII Module - detection and reversible anonymization
// German legal entity patterns plus generic person/org/location recognizers

pub mod anonymizer;
pub mod recognizers;

pub use anonymizer::PiiAnonymizer;
pub use recognizers::detect_entities;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PiiError {
    #[error("mapping store error: {0}")]
    Store(#[from] StoreError),

    #[error("mapping serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type PiiResult<T> = Result<T, PiiError>;
