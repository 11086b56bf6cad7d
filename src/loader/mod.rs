//! Page loading
//!
//! This module contains everything between a caller asking for a page and
//! the decoded page arriving in its callback:
//! - The priority queue of pending load requests
//! - The fetch seam and its HTTP implementation
//! - The scheduler that owns the cache and the single worker
//! - Loader statistics

mod fetcher;
mod request;
mod scheduler;
mod stats;

pub use fetcher::{build_http_client, FetchError, HttpFetcher, PageFetcher};
pub use request::{LoadCallback, LoadPriority, LoadRequest, RequestQueue};
pub use scheduler::PageLoader;
pub use stats::{LoaderStats, StatsSnapshot};
