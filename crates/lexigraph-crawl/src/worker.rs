//! Fetch workers: request queue -> lexicon service -> response queue.

use std::sync::Arc;
use std::time::Duration;

use lexigraph_lexicon::{is_routable, ErrorClass, LexiconClient, Lookup};

use crate::lifecycle::{Shutdown, StopReason, Stopper};
use crate::lookup::{LookupRequest, LookupResponse};
use crate::queue::BoundedQueue;
use crate::stats::{bump, CrawlStats};
use crate::CrawlError;

enum Flow {
    Continue,
    /// Retry kept by this worker because the request queue had no room.
    Retry(LookupRequest),
    Exit,
}

pub(crate) struct FetchWorker {
    pub id: usize,
    pub client: Arc<dyn LexiconClient>,
    pub requests: BoundedQueue<LookupRequest>,
    pub responses: BoundedQueue<LookupResponse>,
    pub stats: Arc<CrawlStats>,
    pub stopper: Stopper,
    pub shutdown: Shutdown,
    pub max_attempts: u32,
    pub delay: Duration,
}

impl FetchWorker {
    pub async fn run(self) {
        tracing::debug!(worker = self.id, "fetch worker started");
        let mut next = self.requests.pop(&self.shutdown).await;
        while let Some(request) = next {
            let held = match self.process(request).await {
                Flow::Exit => break,
                Flow::Continue => None,
                Flow::Retry(request) => Some(request),
            };
            if !self.pause().await {
                break;
            }
            next = match held {
                Some(request) => Some(request),
                None => self.requests.pop(&self.shutdown).await,
            };
        }
        tracing::debug!(worker = self.id, "fetch worker exited");
    }

    async fn process(&self, mut request: LookupRequest) -> Flow {
        if !is_routable(&request.term) {
            tracing::warn!(term = %request.term, "discarding unroutable term");
            bump(&self.stats.discarded);
            self.stats.finish();
            return Flow::Continue;
        }

        bump(&self.stats.lookups);
        match self.client.lookup(&request.term, &request.language).await {
            Ok(Lookup::Found(payload)) => {
                bump(&self.stats.found);
                tracing::info!(
                    term = %request.term,
                    distance = request.distance,
                    similar = payload.word_count(),
                    "got similar terms"
                );
                let response = LookupResponse::from_request(&request, payload);
                if self.responses.push(response, &self.shutdown).await.is_err() {
                    return Flow::Exit;
                }
            }
            Ok(Lookup::Empty) => {
                bump(&self.stats.empty);
                tracing::debug!(term = %request.term, "no similarity data");
                self.stats.finish();
            }
            Err(err) => match err.class() {
                ErrorClass::Retryable => {
                    request.attempts += 1;
                    if request.attempts < self.max_attempts {
                        bump(&self.stats.retried);
                        tracing::warn!(
                            term = %request.term,
                            attempts = request.attempts,
                            error = %err,
                            "lookup failed, retrying"
                        );
                        // Only workers drain the request queue, so waiting
                        // on it here could leave every worker parked.
                        match self.requests.try_reserve() {
                            Ok(permit) => permit.send(request),
                            Err(CrawlError::QueueFull(_)) => return Flow::Retry(request),
                            Err(_) => return Flow::Exit,
                        }
                    } else {
                        bump(&self.stats.dropped);
                        tracing::error!(
                            term = %request.term,
                            attempts = request.attempts,
                            error = %err,
                            "dropping request after too many failures"
                        );
                        self.stats.finish();
                    }
                }
                ErrorClass::Discard => {
                    bump(&self.stats.discarded);
                    tracing::warn!(term = %request.term, error = %err, "discarding request");
                    self.stats.finish();
                }
                ErrorClass::Fatal => {
                    tracing::error!(term = %request.term, error = %err, "fatal lookup error");
                    self.stats.finish();
                    self.stopper.stop(StopReason::Fatal(err.to_string()));
                    return Flow::Exit;
                }
            },
        }
        Flow::Continue
    }

    /// Inter-request delay. `false` if shutdown arrived meanwhile.
    async fn pause(&self) -> bool {
        if self.delay.is_zero() {
            return !self.shutdown.is_triggered();
        }
        tokio::select! {
            _ = self.shutdown.triggered() => false,
            _ = tokio::time::sleep(self.delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lexigraph_lexicon::LexiconError;
    use parking_lot::Mutex;

    /// Fails every lookup with the error produced by `fail`.
    struct Failing {
        calls: Mutex<Vec<String>>,
        fail: fn() -> LexiconError,
    }

    #[async_trait]
    impl LexiconClient for Failing {
        async fn lookup(&self, term: &str, _language: &str) -> Result<Lookup, LexiconError> {
            self.calls.lock().push(term.to_string());
            Err((self.fail)())
        }
    }

    fn worker(client: Arc<Failing>, stopper: &Stopper) -> (FetchWorker, BoundedQueue<LookupRequest>) {
        let requests = BoundedQueue::new("request", 16);
        let worker = FetchWorker {
            id: 0,
            client,
            requests: requests.clone(),
            responses: BoundedQueue::new("response", 16),
            stats: Arc::new(CrawlStats::default()),
            stopper: stopper.clone(),
            shutdown: stopper.shutdown(),
            max_attempts: 3,
            delay: Duration::ZERO,
        };
        (worker, requests)
    }

    #[tokio::test]
    async fn retryable_failure_is_dropped_after_three_attempts() {
        let client = Arc::new(Failing {
            calls: Mutex::new(Vec::new()),
            fail: || LexiconError::Network("connection reset".into()),
        });
        let stopper = Stopper::new();
        let (worker, requests) = worker(client.clone(), &stopper);
        let stats = worker.stats.clone();

        stats.admit();
        requests.try_push(LookupRequest::seed("alpha", "en")).unwrap();

        let shutdown = stopper.shutdown();
        while let Some(request) = requests.pop(&shutdown).await {
            worker.process(request).await;
            if requests.is_empty() {
                break;
            }
        }

        assert_eq!(client.calls.lock().len(), 3);
        assert!(requests.is_empty(), "no fourth enqueue");
        assert_eq!(stats.retried.load(std::sync::atomic::Ordering::Relaxed), 2);
        assert_eq!(stats.dropped.load(std::sync::atomic::Ordering::Relaxed), 1);
        assert_eq!(stats.outstanding(), 0);
    }

    #[tokio::test]
    async fn retry_stays_with_worker_when_request_queue_is_full() {
        let client = Arc::new(Failing {
            calls: Mutex::new(Vec::new()),
            fail: || LexiconError::Network("connection reset".into()),
        });
        let stopper = Stopper::new();
        let (mut worker, _) = worker(client, &stopper);
        let requests = BoundedQueue::new("request", 1);
        requests.try_push(LookupRequest::seed("beta", "en")).unwrap();
        worker.requests = requests.clone();

        let flow = worker.process(LookupRequest::seed("alpha", "en")).await;

        match flow {
            Flow::Retry(request) => {
                assert_eq!(request.term, "alpha");
                assert_eq!(request.attempts, 1);
            }
            _ => panic!("expected the retry to be held by the worker"),
        }
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn unauthorized_stops_the_pipeline() {
        let client = Arc::new(Failing {
            calls: Mutex::new(Vec::new()),
            fail: || LexiconError::Unauthorized { status: 401 },
        });
        let stopper = Stopper::new();
        stopper.mark_running();
        let (worker, requests) = worker(client, &stopper);
        requests.try_push(LookupRequest::seed("alpha", "en")).unwrap();

        worker.run().await;

        assert!(matches!(stopper.reason(), Some(StopReason::Fatal(_))));
    }

    #[tokio::test]
    async fn unroutable_term_never_reaches_client() {
        let client = Arc::new(Failing {
            calls: Mutex::new(Vec::new()),
            fail: || LexiconError::Network("unreachable".into()),
        });
        let stopper = Stopper::new();
        let (worker, _requests) = worker(client.clone(), &stopper);

        worker.process(LookupRequest::seed("sir/madam", "en")).await;

        assert!(client.calls.lock().is_empty());
        assert_eq!(worker.stats.discarded.load(std::sync::atomic::Ordering::Relaxed), 1);
    }
}
