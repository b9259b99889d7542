// JURADOC Processing Module - normalization and hierarchical section parsing

pub mod normalizer;
pub mod parser;

pub use normalizer::TextNormalizer;
pub use parser::{extract_section_numbers, DocumentParser, Section};
