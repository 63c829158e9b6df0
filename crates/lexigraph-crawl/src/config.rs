//! Crawl tuning knobs.
//!
//! Every field has a default, so a JSON override file only needs the keys
//! it changes:
//!
//! ```json
//! { "max_distance": 1, "workers": 8, "request_delay_ms": 250 }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::CrawlError;

/// How the idle watchdog decides that no work is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuiescenceProbe {
    /// Queued requests + requests in flight + responses not yet persisted.
    #[default]
    Outstanding,
    /// Request queue depth only.
    RequestQueue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Responses farther than this from a seed are persisted but not expanded.
    pub max_distance: u32,
    pub workers: usize,
    pub request_queue_capacity: usize,
    pub response_queue_capacity: usize,
    /// A request is dropped once it has failed this many times.
    pub max_attempts: u32,
    /// Pause after each processed request, per worker.
    pub request_delay_ms: u64,
    pub watchdog_grace_ms: u64,
    pub watchdog_period_ms: u64,
    pub quiescence: QuiescenceProbe,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_distance: 2,
            workers: 100,
            request_queue_capacity: 100_000,
            response_queue_capacity: 1_000,
            max_attempts: 3,
            request_delay_ms: 100,
            watchdog_grace_ms: 20_000,
            watchdog_period_ms: 10_000,
            quiescence: QuiescenceProbe::Outstanding,
        }
    }
}

impl CrawlConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, CrawlError> {
        let text = std::fs::read_to_string(path)?;
        let config: CrawlConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.workers == 0 {
            return Err(CrawlError::Config("workers must be at least 1".into()));
        }
        if self.request_queue_capacity == 0 || self.response_queue_capacity == 0 {
            return Err(CrawlError::Config("queue capacities must be positive".into()));
        }
        if self.max_attempts == 0 {
            return Err(CrawlError::Config("max_attempts must be at least 1".into()));
        }
        if self.watchdog_period_ms == 0 {
            return Err(CrawlError::Config("watchdog_period_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn watchdog_grace(&self) -> Duration {
        Duration::from_millis(self.watchdog_grace_ms)
    }

    pub fn watchdog_period(&self) -> Duration {
        Duration::from_millis(self.watchdog_period_ms)
    }
}
