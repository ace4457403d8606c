//! Text-level indexing primitives.
//!
//! This module provides:
//! - Structural line chunking (language-agnostic keyword heuristic)
//! - Redaction of inline binary payloads
//! - The per-file reindex error type

mod chunk;
mod error;
mod redact;

pub use chunk::Chunker;
pub use error::IndexError;
pub use redact::redact_data_uris;
