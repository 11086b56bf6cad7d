//! Bounded in-memory caching
//!
//! Decoded pages are kept in a fixed-capacity LRU cache. Nothing is
//! persisted; the cache starts empty on every process start.

mod lru;

pub use lru::LruCache;

/// Number of decoded pages kept in memory by default
pub const DEFAULT_CAPACITY: usize = 100;
