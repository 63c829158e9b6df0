//! The single graph writer: response queue -> frontier -> graph store.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use lexigraph_store::{CommitSummary, GraphStore, PropertyValue, StoreError, Transaction, NEIGHBOR};

use crate::frontier::Frontier;
use crate::lifecycle::Shutdown;
use crate::lookup::{normalize_term, token_count, LookupRequest, LookupResponse};
use crate::queue::BoundedQueue;
use crate::stats::{bump, CrawlStats};

pub(crate) struct GraphWriter<S: GraphStore> {
    pub store: Arc<S>,
    pub frontier: Frontier,
    pub requests: BoundedQueue<LookupRequest>,
    pub responses: BoundedQueue<LookupResponse>,
    pub stats: Arc<CrawlStats>,
    pub shutdown: Shutdown,
    /// Expanded requests waiting for room in the request queue.
    pub backlog: VecDeque<LookupRequest>,
}

impl<S: GraphStore> GraphWriter<S> {
    /// Runs until shutdown; hands the frontier back for reporting.
    ///
    /// The writer never parks on a full request queue: while the backlog is
    /// non-empty it keeps taking responses, so workers blocked on a full
    /// response queue always make progress.
    pub async fn run(mut self) -> Frontier {
        tracing::debug!("graph writer started");
        loop {
            self.flush_backlog();

            let response = if self.backlog.is_empty() {
                self.responses.pop(&self.shutdown).await
            } else {
                tokio::select! {
                    biased;
                    _ = self.shutdown.triggered() => None,
                    permit = self.requests.reserve() => match permit {
                        Ok(permit) => {
                            if let Some(request) = self.backlog.pop_front() {
                                permit.send(request);
                            }
                            continue;
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "request queue unavailable");
                            None
                        }
                    },
                    response = self.responses.pop(&self.shutdown) => response,
                }
            };
            let Some(response) = response else { break };

            self.expand(&response);
            self.persist(response).await;
            self.stats.finish();
        }

        for _ in self.backlog.drain(..) {
            self.stats.finish();
        }
        tracing::debug!(unique_terms = self.frontier.len(), "graph writer exited");
        self.frontier
    }

    /// Admit requests for unseen similar words into the backlog.
    fn expand(&mut self, response: &LookupResponse) {
        for request in self.frontier.expand(response) {
            self.stats.admit();
            self.backlog.push_back(request);
        }
        if !self.backlog.is_empty() {
            tracing::trace!(backlog = self.backlog.len(), "frontier backlog");
        }
    }

    /// Move as much of the backlog as fits into the request queue.
    fn flush_backlog(&mut self) {
        while !self.backlog.is_empty() {
            let Ok(permit) = self.requests.try_reserve() else {
                break;
            };
            if let Some(request) = self.backlog.pop_front() {
                permit.send(request);
            }
        }
    }

    async fn persist(&self, response: LookupResponse) {
        let store = Arc::clone(&self.store);
        let target = response.target.clone();
        let outcome =
            tokio::task::spawn_blocking(move || persist_response(&*store, &response)).await;
        match outcome {
            Ok(Ok(summary)) => {
                bump(&self.stats.persisted);
                self.stats
                    .nodes_created
                    .fetch_add(summary.nodes_created as u64, Ordering::Relaxed);
                self.stats
                    .edges_created
                    .fetch_add(summary.edges_created as u64, Ordering::Relaxed);
                tracing::debug!(
                    term = %target,
                    nodes = summary.nodes_created,
                    edges = summary.edges_created,
                    "persisted response"
                );
            }
            Ok(Err(err)) => {
                bump(&self.stats.persist_failures);
                tracing::error!(term = %target, error = %err, "failed to persist response");
            }
            Err(err) => {
                bump(&self.stats.persist_failures);
                tracing::error!(term = %target, error = %err, "persist task failed");
            }
        }
    }
}

/// Write one response into the store as a single transaction.
///
/// On any error the transaction is rolled back and the error returned; the
/// response is not retried.
pub fn persist_response<S: GraphStore + ?Sized>(
    store: &S,
    response: &LookupResponse,
) -> Result<CommitSummary, StoreError> {
    let mut tx = store.begin()?;
    match write_response(store, &mut tx, response) {
        Ok(()) => store.commit(tx),
        Err(err) => {
            if let Err(rollback_err) = store.rollback(tx) {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

fn write_response<S: GraphStore + ?Sized>(
    store: &S,
    tx: &mut Transaction,
    response: &LookupResponse,
) -> Result<(), StoreError> {
    let target_key = normalize_term(&response.target);
    let target = store.upsert_node(tx, &target_key)?;

    let info = response.payload.info();
    let properties: [(&str, PropertyValue); 5] = [
        ("numTokens", PropertyValue::Int(token_count(&target_key) as i64)),
        ("frequency", PropertyValue::Int(info.frequency)),
        ("documentFrequency", PropertyValue::Int(info.document_frequency)),
        ("absoluteRank", PropertyValue::Int(info.absolute_rank)),
        ("relativeRank", PropertyValue::Float(info.relative_rank)),
    ];
    for (key, value) in properties {
        store.set_property_if_absent(tx, target, key, value)?;
    }

    for filament in &response.payload.filaments {
        let label = filament.semantic_label();
        for word in &filament.words {
            let key = normalize_term(&word.word);
            if key.is_empty() {
                continue;
            }
            let similar = store.upsert_node(tx, &key)?;
            let exists = store
                .edges(tx, target)?
                .iter()
                .any(|edge| edge.same_triple(target, similar, &label));
            if !exists {
                store.create_edge(tx, target, similar, NEIGHBOR, &label, word.strength)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexigraph_lexicon::{
        Filament, FilamentLabel, LabelSide, SimilarWord, SimilarityPayload, WordInformation,
    };
    use lexigraph_store::TermStore;

    fn word(word: &str, strength: f64) -> SimilarWord {
        SimilarWord {
            word: word.to_string(),
            strength,
        }
    }

    fn gamma_response() -> LookupResponse {
        LookupResponse {
            target: "alpha".into(),
            language: "en".into(),
            distance: 1,
            payload: SimilarityPayload {
                filaments: vec![
                    Filament {
                        labels: vec![FilamentLabel {
                            side: LabelSide::Left,
                            label: "x".into(),
                        }],
                        words: vec![word("gamma", 0.5)],
                    },
                    Filament {
                        labels: vec![FilamentLabel {
                            side: LabelSide::Left,
                            label: "y".into(),
                        }],
                        words: vec![word("gamma", 0.7)],
                    },
                ],
                word_information: Some(WordInformation {
                    frequency: 120,
                    document_frequency: 80,
                    absolute_rank: 4,
                    relative_rank: 0.25,
                }),
            },
        }
    }

    #[test]
    fn one_edge_per_filament_label() {
        let store = TermStore::in_memory();
        let summary = persist_response(&store, &gamma_response()).unwrap();
        assert_eq!(summary.nodes_created, 2);
        assert_eq!(summary.edges_created, 2);

        let edges = store.edges_between("alpha", "gamma");
        let labels: Vec<_> = edges.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["x *", "y *"]);
    }

    #[test]
    fn reprocessing_adds_nothing() {
        let store = TermStore::in_memory();
        persist_response(&store, &gamma_response()).unwrap();
        let again = persist_response(&store, &gamma_response()).unwrap();
        assert_eq!(again.nodes_created, 0);
        assert_eq!(again.edges_created, 0);
        assert_eq!(store.edge_count(), 2);
    }

    #[test]
    fn target_properties_are_first_write_wins() {
        let store = TermStore::in_memory();
        persist_response(&store, &gamma_response()).unwrap();

        let mut later = gamma_response();
        later.payload.word_information = Some(WordInformation {
            frequency: 1,
            ..WordInformation::default()
        });
        persist_response(&store, &later).unwrap();

        let alpha = store.node_by_key("alpha").unwrap();
        assert_eq!(alpha.property("frequency"), Some(&PropertyValue::Int(120)));
        assert_eq!(alpha.property("numTokens"), Some(&PropertyValue::Int(1)));
        assert_eq!(alpha.property("relativeRank"), Some(&PropertyValue::Float(0.25)));

        // Similar terms only get properties when they are looked up themselves.
        let gamma = store.node_by_key("gamma").unwrap();
        assert!(gamma.properties.is_empty());
    }

    #[test]
    fn failed_write_is_rolled_back() {
        let store = TermStore::in_memory();
        let mut response = gamma_response();
        response.target = "   ".into();

        assert!(matches!(
            persist_response(&store, &response),
            Err(StoreError::EmptyKey)
        ));
        assert_eq!(store.node_count(), 0);
    }
}
