// JURADOC Verification Module - citation extraction and answer verification

pub mod citations;

pub use citations::{VerificationReport, Verifier};
