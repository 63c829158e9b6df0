//! Counters shared by workers, the writer and the watchdog.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct CrawlStats {
    pub lookups: AtomicU64,
    pub found: AtomicU64,
    pub empty: AtomicU64,
    pub retried: AtomicU64,
    pub dropped: AtomicU64,
    pub discarded: AtomicU64,
    pub enqueued: AtomicU64,
    pub persisted: AtomicU64,
    pub persist_failures: AtomicU64,
    pub nodes_created: AtomicU64,
    pub edges_created: AtomicU64,
    outstanding: AtomicUsize,
}

pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl CrawlStats {
    /// A new unit of work entered the request queue.
    pub(crate) fn admit(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        bump(&self.enqueued);
    }

    /// A unit of work reached a terminal state.
    pub(crate) fn finish(&self) {
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Requests queued or in flight plus responses not yet persisted.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    pub fn report(&self, unique_terms: usize, elapsed_secs: f64) -> CrawlReport {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CrawlReport {
            lookups: load(&self.lookups),
            found: load(&self.found),
            empty: load(&self.empty),
            retried: load(&self.retried),
            dropped: load(&self.dropped),
            discarded: load(&self.discarded),
            enqueued: load(&self.enqueued),
            persisted: load(&self.persisted),
            persist_failures: load(&self.persist_failures),
            nodes_created: load(&self.nodes_created),
            edges_created: load(&self.edges_created),
            unique_terms,
            elapsed_secs,
        }
    }
}

/// Final tally of a crawl run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrawlReport {
    pub lookups: u64,
    pub found: u64,
    pub empty: u64,
    pub retried: u64,
    /// Gave up after the retry ceiling.
    pub dropped: u64,
    /// Malformed or unroutable.
    pub discarded: u64,
    pub enqueued: u64,
    pub persisted: u64,
    pub persist_failures: u64,
    pub nodes_created: u64,
    pub edges_created: u64,
    pub unique_terms: usize,
    pub elapsed_secs: f64,
}

impl fmt::Display for CrawlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lookups ({} found, {} empty, {} retried, {} dropped, {} discarded), \
             {} responses persisted ({} failed), {} nodes, {} edges, {} unique terms in {:.1}s",
            self.lookups,
            self.found,
            self.empty,
            self.retried,
            self.dropped,
            self.discarded,
            self.persisted,
            self.persist_failures,
            self.nodes_created,
            self.edges_created,
            self.unique_terms,
            self.elapsed_secs
        )
    }
}
