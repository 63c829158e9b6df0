//! Wiring: seeds -> request queue -> workers -> response queue -> writer.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use lexigraph_lexicon::LexiconClient;
use lexigraph_store::GraphStore;
use tokio::task::JoinHandle;

use crate::config::{CrawlConfig, QuiescenceProbe};
use crate::frontier::{Frontier, Sighting};
use crate::lifecycle::{PipelineState, StopReason, Stopper};
use crate::lookup::{normalize_term, LookupRequest, LookupResponse};
use crate::queue::BoundedQueue;
use crate::stats::{CrawlReport, CrawlStats};
use crate::worker::FetchWorker;
use crate::writer::GraphWriter;
use crate::{watchdog, CrawlError};

pub struct Pipeline<S: GraphStore> {
    config: CrawlConfig,
    client: Arc<dyn LexiconClient>,
    store: Arc<S>,
}

impl<S: GraphStore> Pipeline<S> {
    pub fn new(config: CrawlConfig, client: Arc<dyn LexiconClient>, store: Arc<S>) -> Self {
        Self {
            config,
            client,
            store,
        }
    }

    /// Seed the request queue and spawn workers, writer and watchdog.
    ///
    /// Must be called from within a tokio runtime. Seeds are normalized and
    /// deduplicated; seeds that cannot be routed are skipped.
    pub fn start(self, seeds: Vec<LookupRequest>) -> Result<RunningPipeline<S>, CrawlError> {
        self.config.validate()?;

        let stats = Arc::new(CrawlStats::default());
        let stopper = Stopper::new();
        let shutdown = stopper.shutdown();
        let requests: BoundedQueue<LookupRequest> =
            BoundedQueue::new("request", self.config.request_queue_capacity);
        let responses: BoundedQueue<LookupResponse> =
            BoundedQueue::new("response", self.config.response_queue_capacity);

        let mut frontier = Frontier::new(self.config.max_distance);
        for mut seed in seeds {
            seed.term = normalize_term(&seed.term);
            match frontier.observe(&seed.term) {
                Sighting::New => {
                    requests.try_push(seed)?;
                    stats.admit();
                }
                Sighting::Unroutable => {
                    tracing::warn!(term = %seed.term, "skipping unroutable seed");
                }
                Sighting::Repeat(_) | Sighting::Blank => {}
            }
        }
        if frontier.is_empty() {
            return Err(CrawlError::NoSeeds);
        }

        if !stopper.mark_running() {
            return Err(CrawlError::Cancelled);
        }

        let workers = (0..self.config.workers)
            .map(|id| {
                let worker = FetchWorker {
                    id,
                    client: Arc::clone(&self.client),
                    requests: requests.clone(),
                    responses: responses.clone(),
                    stats: Arc::clone(&stats),
                    stopper: stopper.clone(),
                    shutdown: shutdown.clone(),
                    max_attempts: self.config.max_attempts,
                    delay: self.config.request_delay(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        let writer = tokio::spawn(
            GraphWriter {
                store: Arc::clone(&self.store),
                frontier,
                requests: requests.clone(),
                responses,
                stats: Arc::clone(&stats),
                shutdown: shutdown.clone(),
                backlog: VecDeque::new(),
            }
            .run(),
        );

        let probe: Box<dyn Fn() -> usize + Send> = match self.config.quiescence {
            QuiescenceProbe::Outstanding => {
                let stats = Arc::clone(&stats);
                Box::new(move || stats.outstanding())
            }
            QuiescenceProbe::RequestQueue => {
                let requests = requests.clone();
                Box::new(move || requests.len())
            }
        };
        let watchdog = tokio::spawn(watchdog::run(
            probe,
            self.config.watchdog_grace(),
            self.config.watchdog_period(),
            stopper.clone(),
            shutdown,
        ));

        tracing::info!(
            seeds = requests.len(),
            workers = self.config.workers,
            max_distance = self.config.max_distance,
            "crawl pipeline running"
        );

        Ok(RunningPipeline {
            stopper,
            stats,
            store: self.store,
            workers,
            writer,
            watchdog,
            started: Instant::now(),
        })
    }
}

pub struct RunningPipeline<S: GraphStore> {
    stopper: Stopper,
    stats: Arc<CrawlStats>,
    store: Arc<S>,
    workers: Vec<JoinHandle<()>>,
    writer: JoinHandle<Frontier>,
    watchdog: JoinHandle<()>,
    started: Instant,
}

impl<S: GraphStore> RunningPipeline<S> {
    pub fn stopper(&self) -> Stopper {
        self.stopper.clone()
    }

    pub fn state(&self) -> PipelineState {
        self.stopper.state()
    }

    pub fn stats(&self) -> Arc<CrawlStats> {
        Arc::clone(&self.stats)
    }

    /// Why the pipeline stopped, once it has.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stopper.reason()
    }

    /// Wait for the pipeline to stop, join every task and close the store.
    pub async fn join(self) -> Result<CrawlReport, CrawlError> {
        self.stopper.shutdown().triggered().await;

        for handle in self.workers {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "fetch worker panicked");
            }
        }
        let unique_terms = match self.writer.await {
            Ok(frontier) => frontier.len(),
            Err(err) => {
                tracing::warn!(error = %err, "graph writer panicked");
                0
            }
        };
        if let Err(err) = self.watchdog.await {
            tracing::warn!(error = %err, "watchdog panicked");
        }

        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.close())
            .await
            .map_err(|e| CrawlError::Task(e.to_string()))??;

        self.stopper.mark_stopped();
        let report = self
            .stats
            .report(unique_terms, self.started.elapsed().as_secs_f64());
        tracing::info!(
            reason = %self.stopper.reason().map(|r| r.to_string()).unwrap_or_default(),
            lookups = report.lookups,
            persisted = report.persisted,
            "crawl pipeline stopped"
        );
        Ok(report)
    }
}
