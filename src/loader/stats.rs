//! Loader statistics
//!
//! Counters are updated from both caller threads and the worker, so they
//! are plain relaxed atomics; a snapshot is only approximately consistent.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct LoaderStats {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
    decode_failures: AtomicU64,
    preloads_scheduled: AtomicU64,
    panics_caught: AtomicU64,
}

/// Point-in-time copy of the loader counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Calls to `load` with a non-empty page id
    pub requests: u64,

    /// Loads served from cache, on the caller or the worker
    pub cache_hits: u64,

    /// Network fetches started by the worker
    pub fetches: u64,

    pub fetch_failures: u64,
    pub decode_failures: u64,

    /// Background preload requests queued by the preload cascade
    pub preloads_scheduled: u64,

    /// Panics caught in the fetch task, the decoder or a callback
    pub panics_caught: u64,
}

impl LoaderStats {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_preload(&self) {
        self.preloads_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panic(&self) {
        self.panics_caught.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            preloads_scheduled: self.preloads_scheduled.load(Ordering::Relaxed),
            panics_caught: self.panics_caught.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Share of fetches that produced a page, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.fetches == 0 {
            return 0.0;
        }
        let failed = self.fetch_failures + self.decode_failures;
        (self.fetches.saturating_sub(failed) as f64 / self.fetches as f64) * 100.0
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Loader Statistics ===")?;
        writeln!(f, "  Requests: {}", self.requests)?;
        writeln!(f, "  Cache hits: {}", self.cache_hits)?;
        writeln!(f, "  Fetches: {}", self.fetches)?;
        writeln!(f, "  Fetch failures: {}", self.fetch_failures)?;
        writeln!(f, "  Decode failures: {}", self.decode_failures)?;
        writeln!(f, "  Preloads scheduled: {}", self.preloads_scheduled)?;
        writeln!(f, "  Panics caught: {}", self.panics_caught)?;
        write!(f, "Success Rate: {:.1}%", self.success_rate())
    }
}
