//! Lexigraph lexicon client
//!
//! Boundary to the external lexical-similarity service ("Living Lexicon"):
//! - `payload`: the parsed similarity payload (filaments, words, word information)
//! - `client`: the HTTP implementation of [`LexiconClient`]
//!
//! Lookups distinguish three outcomes the crawl pipeline cares about:
//! data found, no data ([`Lookup::Empty`], not an error), and failures
//! classified by [`LexiconError::class`] as retryable, discardable or fatal.

pub mod client;
pub mod payload;

use async_trait::async_trait;

pub use client::{HttpLexiconClient, LexiconConfig, DEFAULT_ENDPOINT};
pub use payload::{
    Filament, FilamentLabel, LabelSide, SimilarWord, SimilarityPayload, WordInformation,
};

/// Character the upstream service cannot route inside a term path segment.
pub const UNROUTABLE_CHAR: char = '/';

/// Whether a term can be sent to the lexicon service at all.
pub fn is_routable(term: &str) -> bool {
    !term.contains(UNROUTABLE_CHAR)
}

// ============================================================================
// Lookup Contract
// ============================================================================

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The service knows the term and returned at least one filament.
    Found(SimilarityPayload),
    /// The service has no similarity data for the term.
    Empty,
}

impl Lookup {
    /// Normalize a parsed payload: zero filaments means "no data".
    pub fn from_payload(payload: SimilarityPayload) -> Self {
        if payload.is_empty() {
            Lookup::Empty
        } else {
            Lookup::Found(payload)
        }
    }
}

/// Anything that can resolve `(term, language)` into similarity data.
///
/// Implementations must be callable concurrently from many workers.
#[async_trait]
pub trait LexiconClient: Send + Sync {
    async fn lookup(&self, term: &str, language: &str) -> Result<Lookup, LexiconError>;
}

// ============================================================================
// Errors
// ============================================================================

/// How the crawl pipeline should react to a failed lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient: re-queue the request (bounded by the retry ceiling).
    Retryable,
    /// Local to this request: drop it and carry on.
    Discard,
    /// Nothing further can succeed (e.g. bad credentials): stop the crawl.
    Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum LexiconError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unauthorized (HTTP {status}); check the API key")]
    Unauthorized { status: u16 },
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("term cannot be routed to the lexicon service: {0:?}")]
    Unroutable(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LexiconError {
    pub fn class(&self) -> ErrorClass {
        match self {
            LexiconError::Network(_) => ErrorClass::Retryable,
            LexiconError::Status { status, .. } => {
                if *status == 408 || *status == 429 || *status >= 500 {
                    ErrorClass::Retryable
                } else {
                    ErrorClass::Discard
                }
            }
            LexiconError::InvalidPayload(_) | LexiconError::Unroutable(_) => ErrorClass::Discard,
            LexiconError::Unauthorized { .. } | LexiconError::Config(_) => ErrorClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }
}
