//! Lexigraph crawl pipeline
//!
//! Breadth-first crawl of a lexical-similarity service into a term graph:
//!
//! ```text
//!  seeds ─► [request queue] ─► fetch workers (N) ─► [response queue] ─► graph writer (1)
//!                 ▲                  │ retry                                  │
//!                 ├──────────────────┘                                        │
//!                 └──────────────── frontier (unseen terms) ◄─────────────────┘
//! ```
//!
//! - `worker`: looks terms up, retries transient failures, forwards payloads
//! - `writer`: expands the frontier and persists each response transactionally
//! - `watchdog`: stops the crawl after two consecutive idle observations
//! - `lifecycle`: the idempotent stop contract and shutdown signal
//!
//! Both queues are bounded, so a slow writer throttles the workers.

pub mod config;
pub mod error;
pub mod frontier;
pub mod lifecycle;
pub mod lookup;
pub mod pipeline;
pub mod queue;
pub mod stats;
pub mod watchdog;
pub mod writer;

mod worker;

pub use config::{CrawlConfig, QuiescenceProbe};
pub use error::CrawlError;
pub use frontier::{Frontier, Sighting};
pub use lifecycle::{PipelineState, Shutdown, StopReason, Stopper};
pub use lookup::{normalize_term, token_count, LookupRequest, LookupResponse};
pub use pipeline::{Pipeline, RunningPipeline};
pub use queue::BoundedQueue;
pub use stats::{CrawlReport, CrawlStats};
pub use watchdog::{IdleWatchdog, WatchdogState};
pub use writer::persist_response;
