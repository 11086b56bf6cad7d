//! Load requests and the priority queue feeding the worker

use crate::page::{PageEntity, PageId};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::Notify;

/// How urgently a page is needed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadPriority {
    /// User-initiated loads
    High,

    /// Background preloads
    Low,
}

impl LoadPriority {
    fn rank(self) -> u8 {
        match self {
            Self::High => 1,
            Self::Low => 0,
        }
    }
}

impl fmt::Display for LoadPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => f.write_str("high"),
            Self::Low => f.write_str("low"),
        }
    }
}

/// Receives the loaded page, or `None` when it could not be fetched or decoded
pub type LoadCallback = Box<dyn FnOnce(Option<Arc<PageEntity>>) + Send + 'static>;

/// A queued page load, consumed exactly once by the worker
pub struct LoadRequest {
    pub(crate) page_id: PageId,
    pub(crate) priority: LoadPriority,
    pub(crate) submitted_at: Instant,
    pub(crate) callback: Option<LoadCallback>,
    pub(crate) is_preload: bool,

    /// Queue insertion order, breaks ties between equal timestamps
    sequence: u64,
}

impl LoadRequest {
    /// Creates a caller-initiated request
    pub fn new(page_id: PageId, priority: LoadPriority, callback: Option<LoadCallback>) -> Self {
        Self {
            page_id,
            priority,
            submitted_at: Instant::now(),
            callback,
            is_preload: false,
            sequence: 0,
        }
    }

    /// Creates a low priority background request without callback
    pub fn preload(page_id: PageId) -> Self {
        Self {
            is_preload: true,
            ..Self::new(page_id, LoadPriority::Low, None)
        }
    }

    /// Overrides the submission time
    pub fn submitted_at(mut self, at: Instant) -> Self {
        self.submitted_at = at;
        self
    }

    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    pub fn priority(&self) -> LoadPriority {
        self.priority
    }

    pub fn is_preload(&self) -> bool {
        self.is_preload
    }
}

impl fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadRequest")
            .field("page_id", &self.page_id)
            .field("priority", &self.priority)
            .field("submitted_at", &self.submitted_at)
            .field("has_callback", &self.callback.is_some())
            .field("is_preload", &self.is_preload)
            .finish()
    }
}

// BinaryHeap pops the greatest element: high priority first, then the
// oldest submission, then the earliest queued
impl Ord for LoadRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .rank()
            .cmp(&other.priority.rank())
            .then_with(|| other.submitted_at.cmp(&self.submitted_at))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for LoadRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for LoadRequest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LoadRequest {}

struct QueueInner {
    heap: BinaryHeap<LoadRequest>,
    next_sequence: u64,
}

/// Priority queue shared between any number of producers and one consumer
///
/// `push` never blocks; `pop` waits until a request is available.
pub struct RequestQueue {
    inner: Mutex<QueueInner>,
    available: Notify,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                heap: BinaryHeap::new(),
                next_sequence: 0,
            }),
            available: Notify::new(),
        }
    }

    /// Adds a request and wakes the consumer
    pub fn push(&self, mut request: LoadRequest) {
        {
            let mut inner = self.lock();
            request.sequence = inner.next_sequence;
            inner.next_sequence += 1;
            inner.heap.push(request);
        }
        self.available.notify_one();
    }

    /// Takes the most urgent request, if any
    pub fn try_pop(&self) -> Option<LoadRequest> {
        self.lock().heap.pop()
    }

    /// Waits for and takes the most urgent request
    pub async fn pop(&self) -> LoadRequest {
        loop {
            if let Some(request) = self.try_pop() {
                return request;
            }
            // A push between try_pop and here leaves a stored permit
            self.available.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request(id: &str, priority: LoadPriority, at: Instant) -> LoadRequest {
        LoadRequest::new(PageId::normalize(id), priority, None).submitted_at(at)
    }

    fn drain(queue: &RequestQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.try_pop())
            .map(|r| r.page_id().to_string())
            .collect()
    }

    #[test]
    fn test_high_before_low_then_oldest_first() {
        let t0 = Instant::now();
        let queue = RequestQueue::new();
        queue.push(request("101", LoadPriority::Low, t0 + Duration::from_millis(1)));
        queue.push(request("102", LoadPriority::High, t0 + Duration::from_millis(2)));
        queue.push(request("100", LoadPriority::Low, t0));

        assert_eq!(drain(&queue), vec!["102-0", "100-0", "101-0"]);
    }

    #[test]
    fn test_high_requests_ordered_by_time() {
        let t0 = Instant::now();
        let queue = RequestQueue::new();
        queue.push(request("300", LoadPriority::High, t0 + Duration::from_millis(5)));
        queue.push(request("200", LoadPriority::High, t0));

        assert_eq!(drain(&queue), vec!["200-0", "300-0"]);
    }

    #[test]
    fn test_equal_timestamps_are_fifo() {
        let t0 = Instant::now();
        let queue = RequestQueue::new();
        for id in ["1", "2", "3"] {
            queue.push(request(id, LoadPriority::Low, t0));
        }

        assert_eq!(drain(&queue), vec!["1-0", "2-0", "3-0"]);
    }

    #[test]
    fn test_preload_request() {
        let request = LoadRequest::preload(PageId::normalize("150"));
        assert!(request.is_preload());
        assert_eq!(request.priority(), LoadPriority::Low);
        assert!(request.callback.is_none());
    }

    #[test]
    fn test_len() {
        let queue = RequestQueue::new();
        assert!(queue.is_empty());
        queue.push(LoadRequest::preload(PageId::normalize("150")));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(RequestQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(LoadRequest::preload(PageId::normalize("150")));

        let request = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.page_id().as_str(), "150-0");
    }

    #[tokio::test]
    async fn test_concurrent_producers() {
        let queue = Arc::new(RequestQueue::new());
        let mut producers = Vec::new();
        for thread in 0..4 {
            let queue = Arc::clone(&queue);
            producers.push(std::thread::spawn(move || {
                for i in 0..25 {
                    let id = format!("{}{:02}", thread + 1, i);
                    queue.push(LoadRequest::preload(PageId::normalize(&id)));
                }
            }));
        }
        for producer in producers {
            producer.join().unwrap();
        }

        let mut popped = 0;
        while tokio::time::timeout(Duration::from_millis(50), queue.pop())
            .await
            .is_ok()
        {
            popped += 1;
        }
        assert_eq!(popped, 100);
    }
}
