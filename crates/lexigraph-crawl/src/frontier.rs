//! Seen-set and breadth-first expansion.
//!
//! Owned by the graph writer alone; no locking.

use std::collections::HashMap;

use lexigraph_lexicon::is_routable;

use crate::lookup::{normalize_term, LookupRequest, LookupResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    /// First time this term is seen; a request should be emitted.
    New,
    /// Seen before; holds the updated sighting count.
    Repeat(u32),
    /// Contains a character the lexicon service cannot route.
    Unroutable,
    /// Nothing left after normalization.
    Blank,
}

#[derive(Debug, Clone)]
pub struct Frontier {
    max_distance: u32,
    seen: HashMap<String, u32>,
}

impl Frontier {
    pub fn new(max_distance: u32) -> Self {
        Self {
            max_distance,
            seen: HashMap::new(),
        }
    }

    pub fn max_distance(&self) -> u32 {
        self.max_distance
    }

    /// Record a sighting of `term` (already normalized).
    pub fn observe(&mut self, term: &str) -> Sighting {
        if term.is_empty() {
            return Sighting::Blank;
        }
        if !is_routable(term) {
            return Sighting::Unroutable;
        }
        match self.seen.get_mut(term) {
            Some(count) => {
                *count += 1;
                Sighting::Repeat(*count)
            }
            None => {
                self.seen.insert(term.to_string(), 1);
                Sighting::New
            }
        }
    }

    /// Requests for every unseen similar word of `response`, in payload order.
    ///
    /// Nothing is emitted once the response is past the distance bound.
    pub fn expand(&mut self, response: &LookupResponse) -> Vec<LookupRequest> {
        if response.distance > self.max_distance {
            tracing::debug!(
                term = %response.target,
                distance = response.distance,
                max_distance = self.max_distance,
                "distance bound reached, not expanding"
            );
            return Vec::new();
        }

        let mut requests = Vec::new();
        for word in response.payload.similar_words() {
            let term = normalize_term(word);
            match self.observe(&term) {
                Sighting::New => requests.push(LookupRequest::new(
                    term,
                    response.language.clone(),
                    response.distance,
                )),
                Sighting::Unroutable => {
                    tracing::debug!(term = %term, "skipping unroutable term");
                }
                Sighting::Repeat(_) | Sighting::Blank => {}
            }
        }
        requests
    }

    pub fn is_seen(&self, term: &str) -> bool {
        self.seen.contains_key(term)
    }

    /// How many times `term` has been sighted, seeds included.
    pub fn sightings(&self, term: &str) -> Option<u32> {
        self.seen.get(term).copied()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexigraph_lexicon::{Filament, SimilarWord, SimilarityPayload};

    fn response(target: &str, distance: u32, words: &[&str]) -> LookupResponse {
        let words = words
            .iter()
            .map(|w| SimilarWord {
                word: w.to_string(),
                strength: 0.5,
            })
            .collect();
        LookupResponse {
            target: target.to_string(),
            language: "en".to_string(),
            distance,
            payload: SimilarityPayload {
                filaments: vec![Filament {
                    labels: Vec::new(),
                    words,
                }],
                word_information: None,
            },
        }
    }

    #[test]
    fn new_terms_inherit_response_distance() {
        let mut frontier = Frontier::new(2);
        frontier.observe("alpha");

        let requests = frontier.expand(&response("alpha", 1, &["beta", "alpha", "gamma"]));
        let terms: Vec<_> = requests.iter().map(|r| r.term.as_str()).collect();
        assert_eq!(terms, vec!["beta", "gamma"]);
        assert!(requests.iter().all(|r| r.distance == 1 && r.attempts == 0));
        assert_eq!(frontier.sightings("alpha"), Some(2));
    }

    #[test]
    fn bound_is_inclusive() {
        let mut frontier = Frontier::new(1);
        assert_eq!(frontier.expand(&response("alpha", 1, &["beta"])).len(), 1);
        assert!(frontier.expand(&response("beta", 2, &["delta"])).is_empty());
        assert!(!frontier.is_seen("delta"));
    }

    #[test]
    fn unroutable_words_never_enter_the_seen_set() {
        let mut frontier = Frontier::new(2);
        let requests = frontier.expand(&response("alpha", 1, &["sir/madam", "beta"]));
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].term, "beta");
        assert!(!frontier.is_seen("sir/madam"));
    }

    #[test]
    fn words_are_normalized_before_lookup() {
        let mut frontier = Frontier::new(2);
        let requests = frontier.expand(&response("alpha", 1, &[" new  york ", "new york", "  "]));
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].term, "new york");
        assert_eq!(frontier.sightings("new york"), Some(2));
    }
}
