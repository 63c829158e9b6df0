//! Lookup requests and responses flowing through the pipeline queues.

use std::fmt;

use lexigraph_lexicon::SimilarityPayload;
use serde::{Deserialize, Serialize};

/// Canonical form of a term: trimmed, inner whitespace collapsed to one space.
pub fn normalize_term(term: &str) -> String {
    term.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of whitespace-separated tokens in a term.
pub fn token_count(term: &str) -> usize {
    term.split_whitespace().count()
}

/// A pending lookup of one term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRequest {
    pub term: String,
    /// ISO 639-1 code.
    pub language: String,
    /// Hops from the nearest seed.
    pub distance: u32,
    /// Failed lookups so far.
    pub attempts: u32,
}

impl LookupRequest {
    pub fn new(term: impl Into<String>, language: impl Into<String>, distance: u32) -> Self {
        Self {
            term: term.into(),
            language: language.into(),
            distance,
            attempts: 0,
        }
    }

    pub fn seed(term: impl Into<String>, language: impl Into<String>) -> Self {
        Self::new(term, language, 0)
    }
}

impl fmt::Display for LookupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LookupRequest[term={}, distance={}, attempts={}]",
            self.term, self.distance, self.attempts
        )
    }
}

/// Similarity data for one looked-up term, on its way to the graph writer.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResponse {
    pub target: String,
    pub language: String,
    /// Originating request distance + 1.
    pub distance: u32,
    pub payload: SimilarityPayload,
}

impl LookupResponse {
    pub fn from_request(request: &LookupRequest, payload: SimilarityPayload) -> Self {
        Self {
            target: request.term.clone(),
            language: request.language.clone(),
            distance: request.distance + 1,
            payload,
        }
    }
}
