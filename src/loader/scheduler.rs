//! Page load scheduler
//!
//! [`PageLoader`] owns the page cache, the request queue and the single
//! worker task that drains it. The worker is the only place where pages
//! are fetched and decoded, so the decoder's scratch buffers are never
//! shared.

use crate::cache::LruCache;
use crate::config::Config;
use crate::decoder::TeletextDecoder;
use crate::loader::fetcher::PageFetcher;
use crate::loader::request::{LoadCallback, LoadPriority, LoadRequest, RequestQueue};
use crate::loader::stats::{LoaderStats, StatsSnapshot};
use crate::page::{PageEntity, PageId};
use crate::TeletextError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// State shared between callers and the worker
struct Shared<F> {
    cache: Mutex<LruCache<PageId, Arc<PageEntity>>>,
    queue: RequestQueue,
    fetcher: F,
    stats: LoaderStats,

    /// Set once the worker is stopped; nothing is queued afterwards
    closed: AtomicBool,

    /// Callback of the request the worker is servicing
    ///
    /// Whoever takes it out invokes it, so a shutdown racing the worker
    /// answers it exactly once.
    in_flight: Mutex<Option<(PageId, LoadCallback)>>,
}

impl<F: PageFetcher> Shared<F> {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn in_flight(&self) -> MutexGuard<'_, Option<(PageId, LoadCallback)>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Invokes a callback, containing any panic it raises
    fn deliver(&self, page_id: &PageId, callback: LoadCallback, page: Option<Arc<PageEntity>>) {
        if catch_unwind(AssertUnwindSafe(|| callback(page))).is_err() {
            tracing::error!("Callback for {} panicked", page_id);
            self.stats.record_panic();
        }
    }

    fn cache(&self) -> MutexGuard<'_, LruCache<PageId, Arc<PageEntity>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached entity for `page_id` if it has not expired
    fn fresh(&self, page_id: &PageId) -> Option<Arc<PageEntity>> {
        let mut cache = self.cache();
        cache.get(page_id).filter(|page| page.is_fresh()).cloned()
    }

    /// Replaces any stale entry for the page with the new entity
    fn store(&self, page: Arc<PageEntity>) {
        let mut cache = self.cache();
        cache.remove(page.page_id());
        if let Some(evicted) = cache.put(page.page_id().clone(), page) {
            tracing::debug!("Evicted {} from cache", evicted);
        }
    }

    /// Queues a callback-less low priority load unless the page is cached
    fn preload(&self, page_id: &PageId) {
        if self.is_closed() || self.fresh(page_id).is_some() {
            return;
        }
        tracing::debug!("Scheduling preload of {}", page_id);
        self.stats.record_preload();
        self.queue.push(LoadRequest::preload(page_id.clone()));
    }

    /// Warms the cache with every page `page` links to
    fn cascade(&self, page: &PageEntity) {
        for page_id in page.referenced_page_ids() {
            self.preload(page_id);
        }
    }
}

/// Priority-ordered, cached page loader
///
/// Foreground loads are served from cache when possible and otherwise queued
/// for the worker. Every page that is delivered to a foreground caller
/// triggers background preloads of the pages it references.
pub struct PageLoader<F: PageFetcher> {
    shared: Arc<Shared<F>>,
    worker: Option<JoinHandle<()>>,
}

impl<F: PageFetcher> PageLoader<F> {
    /// Creates a loader and spawns its worker on the current tokio runtime
    ///
    /// # Arguments
    ///
    /// * `config` - Cache, expiry and decoder settings
    /// * `fetcher` - Source of raw page bytes
    ///
    /// # Returns
    ///
    /// * `Ok(PageLoader)` - The loader, with its worker running
    /// * `Err(TeletextError)` - Called outside a runtime, or the decoder could not be built
    pub fn new(config: &Config, fetcher: F) -> Result<Self, TeletextError> {
        let handle = Handle::try_current().map_err(|_| TeletextError::NoRuntime)?;
        let decoder = TeletextDecoder::new(config.decoder.options(), config.loader.expiry_policy())?;

        let shared = Arc::new(Shared {
            cache: Mutex::new(LruCache::new(config.loader.cache_capacity)),
            queue: RequestQueue::new(),
            fetcher,
            stats: LoaderStats::default(),
            closed: AtomicBool::new(false),
            in_flight: Mutex::new(None),
        });

        let worker = handle.spawn(run_worker(Arc::clone(&shared), decoder));
        tracing::debug!(
            "Page loader started (cache capacity {})",
            config.loader.cache_capacity
        );

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Loads a page and reports it to `callback`
    ///
    /// An empty id is ignored and the callback is never invoked. A fresh
    /// cache hit invokes the callback before this returns, on the calling
    /// thread. Anything else is queued and the callback runs later on the
    /// worker, with `None` if the page could not be fetched or decoded.
    /// After [`PageLoader::shutdown`] a cache miss is reported as `None` at once.
    pub fn load<C>(&self, raw_page_id: &str, priority: LoadPriority, callback: C)
    where
        C: FnOnce(Option<Arc<PageEntity>>) + Send + 'static,
    {
        if raw_page_id.is_empty() {
            return;
        }

        let page_id = PageId::normalize(raw_page_id);
        self.shared.stats.record_request();

        if let Some(page) = self.shared.fresh(&page_id) {
            tracing::debug!("Cache hit for {}", page_id);
            self.shared.stats.record_cache_hit();
            callback(Some(Arc::clone(&page)));
            self.shared.cascade(&page);
            return;
        }

        if self.shared.is_closed() {
            callback(None);
            return;
        }

        tracing::debug!("Queueing {} ({} priority)", page_id, priority);
        let callback: LoadCallback = Box::new(callback);
        self.shared
            .queue
            .push(LoadRequest::new(page_id, priority, Some(callback)));
    }

    /// Loads a page and waits for the result
    ///
    /// Returns `None` for an empty id, for pages that could not be loaded, and
    /// when the loader is shut down before the request was serviced.
    pub async fn load_async(
        &self,
        raw_page_id: &str,
        priority: LoadPriority,
    ) -> Option<Arc<PageEntity>> {
        let (tx, rx) = oneshot::channel();
        self.load(raw_page_id, priority, move |page| {
            let _ = tx.send(page);
        });
        rx.await.ok().flatten()
    }

    /// Queues a background load without callback
    pub fn prefetch(&self, raw_page_id: &str) {
        if raw_page_id.is_empty() {
            return;
        }
        self.shared.preload(&PageId::normalize(raw_page_id));
    }

    /// Returns the cached page if it is still fresh
    pub fn cached(&self, raw_page_id: &str) -> Option<Arc<PageEntity>> {
        self.shared.fresh(&PageId::normalize(raw_page_id))
    }

    pub fn cache_len(&self) -> usize {
        self.shared.cache().len()
    }

    pub fn cache_capacity(&self) -> usize {
        self.shared.cache().capacity()
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Stops the worker
    ///
    /// The request being serviced and the requests still queued are answered
    /// with `None`. Later cache misses are answered the same way and preloads
    /// are ignored.
    pub fn shutdown(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.abort();

        let in_flight = self.shared.in_flight().take();
        if let Some((page_id, callback)) = in_flight {
            self.shared.deliver(&page_id, callback, None);
        }

        let mut cancelled = 0;
        while let Some(request) = self.shared.queue.try_pop() {
            cancelled += 1;
            if let Some(callback) = request.callback {
                self.shared.deliver(&request.page_id, callback, None);
            }
        }
        tracing::debug!("Page loader stopped, {} queued requests cancelled", cancelled);
    }
}

impl<F: PageFetcher> Drop for PageLoader<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Drains the request queue until the task is aborted
async fn run_worker<F: PageFetcher>(shared: Arc<Shared<F>>, mut decoder: TeletextDecoder) {
    loop {
        let request = shared.queue.pop().await;
        service(&shared, &mut decoder, request).await;
    }
}

/// Resolves one request and delivers the outcome
async fn service<F: PageFetcher>(
    shared: &Arc<Shared<F>>,
    decoder: &mut TeletextDecoder,
    request: LoadRequest,
) {
    let LoadRequest {
        page_id,
        priority,
        callback,
        is_preload,
        ..
    } = request;

    if let Some(callback) = callback {
        *shared.in_flight() = Some((page_id.clone(), callback));
    }

    let page = match shared.fresh(&page_id) {
        Some(page) => {
            tracing::debug!("{} already cached, skipping fetch", page_id);
            shared.stats.record_cache_hit();
            Some(page)
        }
        None => resolve(shared, decoder, &page_id).await,
    };

    match &page {
        Some(_) => tracing::info!("Loaded {} ({} priority)", page_id, priority),
        None => tracing::warn!("Page {} not found", page_id),
    }

    let in_flight = shared.in_flight().take();
    if let Some((_, callback)) = in_flight {
        shared.deliver(&page_id, callback, page.clone());
    }

    if !is_preload {
        if let Some(page) = &page {
            shared.cascade(page);
        }
    }
}

/// Fetches and decodes a page, caching it on success
async fn resolve<F: PageFetcher>(
    shared: &Arc<Shared<F>>,
    decoder: &mut TeletextDecoder,
    page_id: &PageId,
) -> Option<Arc<PageEntity>> {
    shared.stats.record_fetch();

    // The fetch runs as its own task so a panicking fetcher is reported as
    // a join error instead of unwinding through the worker
    let fetch = {
        let shared = Arc::clone(shared);
        let page_id = page_id.clone();
        tokio::spawn(async move { shared.fetcher.fetch(&page_id).await })
    };

    let bytes = match fetch.await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            tracing::warn!("Failed to fetch {}: {}", page_id, e);
            shared.stats.record_fetch_failure();
            return None;
        }
        Err(e) => {
            tracing::error!("Fetch task for {} failed: {}", page_id, e);
            shared.stats.record_fetch_failure();
            if e.is_panic() {
                shared.stats.record_panic();
            }
            return None;
        }
    };

    let decoded = match catch_unwind(AssertUnwindSafe(|| decoder.decode(page_id, &bytes))) {
        Ok(decoded) => decoded,
        Err(_) => {
            tracing::error!("Decoder panicked on {}", page_id);
            shared.stats.record_panic();
            shared.stats.record_decode_failure();
            return None;
        }
    };

    match decoded {
        Ok(page) => {
            let page = Arc::new(page);
            shared.store(Arc::clone(&page));
            Some(page)
        }
        Err(e) => {
            tracing::warn!("Failed to decode {}: {}", page_id, e);
            shared.stats.record_decode_failure();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{COLS, GRID_SIZE};
    use crate::loader::fetcher::FetchError;
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Default)]
    struct MockFetcher {
        pages: HashMap<String, Vec<u8>>,
        log: Arc<Mutex<Vec<String>>>,
        delay: Option<Duration>,
    }

    impl MockFetcher {
        fn with_page(mut self, id: &str, bytes: Vec<u8>) -> Self {
            self.pages.insert(id.to_string(), bytes);
            self
        }
    }

    impl PageFetcher for MockFetcher {
        async fn fetch(&self, page_id: &PageId) -> Result<Vec<u8>, FetchError> {
            self.log.lock().unwrap().push(page_id.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.pages
                .get(page_id.as_str())
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    url: page_id.to_string(),
                    status: 404,
                })
        }
    }

    fn page(header: &str, first_row: &str) -> Vec<u8> {
        let mut bytes = format!("{}<pre>", header).into_bytes();
        let text = &first_row.as_bytes()[..first_row.len().min(COLS)];
        let mut grid = vec![b' '; GRID_SIZE];
        grid[..text.len()].copy_from_slice(text);
        bytes.extend(grid);
        bytes
    }

    fn loader(fetcher: MockFetcher) -> (PageLoader<MockFetcher>, Arc<Mutex<Vec<String>>>) {
        let log = Arc::clone(&fetcher.log);
        (PageLoader::new(&Config::default(), fetcher).unwrap(), log)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_load_fetches_caches_and_preloads() {
        let fetcher = MockFetcher::default()
            .with_page("101-0", page("pn=n_102\npn=p_100\n", " see page 150 for more "))
            .with_page("102-0", page("pn=n_103\n", ""))
            .with_page("103-0", page("", ""))
            .with_page("150-0", page("", ""));
        let (loader, log) = loader(fetcher);

        let loaded = loader.load_async("101", LoadPriority::High).await.unwrap();
        assert_eq!(loaded.page_id().as_str(), "101-0");
        assert_eq!(loaded.linked_page_ids(), &[PageId::normalize("150")]);
        assert!(loader.cached("101-0").is_some());

        wait_until(|| log.lock().unwrap().len() == 4).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Preloads run in cascade order and never cascade themselves
        assert_eq!(
            *log.lock().unwrap(),
            vec!["101-0", "102-0", "100-0", "150-0"]
        );
        assert!(loader.cached("102").is_some());
        assert!(loader.cached("150").is_some());
        assert!(loader.cached("100").is_none());
        assert!(loader.cached("103").is_none());

        let stats = loader.stats();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.preloads_scheduled, 3);
        assert_eq!(stats.fetches, 4);
        assert_eq!(stats.fetch_failures, 1);
    }

    #[tokio::test]
    async fn test_cache_hit_is_synchronous_and_skips_fetch() {
        let fetcher = MockFetcher::default().with_page("120-0", page("", ""));
        let (loader, log) = loader(fetcher);

        assert!(loader.load_async("120", LoadPriority::High).await.is_some());

        let (tx, rx) = std::sync::mpsc::channel();
        loader.load("120-0", LoadPriority::High, move |page| {
            tx.send(page.map(|p| p.page_id().to_string())).unwrap();
        });

        assert_eq!(rx.try_recv().unwrap(), Some("120-0".to_string()));
        assert_eq!(*log.lock().unwrap(), vec!["120-0"]);
        assert_eq!(loader.stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_delivers_none() {
        let (loader, _log) = loader(MockFetcher::default());

        assert!(loader.load_async("999", LoadPriority::High).await.is_none());
        assert!(loader.cached("999").is_none());
        assert_eq!(loader.cache_len(), 0);
        assert_eq!(loader.stats().fetch_failures, 1);
    }

    #[tokio::test]
    async fn test_decode_failure_delivers_none() {
        let fetcher = MockFetcher::default().with_page("130-0", b"no body here".to_vec());
        let (loader, _log) = loader(fetcher);

        assert!(loader.load_async("130", LoadPriority::High).await.is_none());
        assert_eq!(loader.cache_len(), 0);
        assert_eq!(loader.stats().decode_failures, 1);
    }

    #[tokio::test]
    async fn test_empty_id_is_ignored() {
        let (loader, log) = loader(MockFetcher::default());

        let called = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&called);
        loader.load("", LoadPriority::High, move |_| *flag.lock().unwrap() = true);

        assert!(loader.load_async("", LoadPriority::High).await.is_none());
        assert_eq!(loader.queue_len(), 0);
        assert_eq!(loader.stats().requests, 0);
        assert!(log.lock().unwrap().is_empty());
        assert!(!*called.lock().unwrap());
    }

    #[tokio::test]
    async fn test_panicking_callback_keeps_worker_alive() {
        let fetcher = MockFetcher::default()
            .with_page("101-0", page("", ""))
            .with_page("102-0", page("", ""));
        let (loader, _log) = loader(fetcher);

        loader.load("101", LoadPriority::High, |_| panic!("callback failure"));
        let page = loader.load_async("102", LoadPriority::High).await;

        assert!(page.is_some());
        assert_eq!(loader.stats().panics_caught, 1);
    }

    #[tokio::test]
    async fn test_expired_page_is_refetched() {
        let mut config = Config::default();
        config.loader.volatile_ttl_secs = 0;

        let fetcher = MockFetcher::default().with_page("801-0", page("", ""));
        let log = Arc::clone(&fetcher.log);
        let loader = PageLoader::new(&config, fetcher).unwrap();

        assert!(loader.load_async("801", LoadPriority::High).await.is_some());
        assert!(loader.cached("801").is_none());
        assert!(loader.load_async("801", LoadPriority::High).await.is_some());

        assert_eq!(*log.lock().unwrap(), vec!["801-0", "801-0"]);
        assert_eq!(loader.cache_len(), 1);
    }

    #[tokio::test]
    async fn test_prefetch_skips_cached_pages() {
        let fetcher = MockFetcher::default().with_page("140-0", page("", ""));
        let (loader, log) = loader(fetcher);

        loader.prefetch("140");
        wait_until(|| loader.cached("140").is_some()).await;

        loader.prefetch("140");
        loader.prefetch("");
        assert_eq!(loader.queue_len(), 0);
        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(loader.stats().preloads_scheduled, 1);
    }

    #[tokio::test]
    async fn test_shutdown_answers_pending_loads() {
        let fetcher = MockFetcher::default().with_page("101-0", page("", ""));
        let (mut loader, log) = loader(fetcher);

        // Queued before the worker gets a chance to run
        let (tx, rx) = std::sync::mpsc::channel();
        loader.load("101", LoadPriority::High, move |page| {
            tx.send(page.is_some()).unwrap();
        });
        loader.shutdown();

        assert!(!rx.try_recv().unwrap());
        assert!(loader.load_async("101", LoadPriority::High).await.is_none());

        loader.prefetch("101");
        assert_eq!(loader.queue_len(), 0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_answers_in_flight_load() {
        let mut fetcher = MockFetcher::default().with_page("101-0", page("", ""));
        fetcher.delay = Some(Duration::from_secs(5));
        let (mut loader, log) = loader(fetcher);

        let (tx, rx) = std::sync::mpsc::channel();
        loader.load("101", LoadPriority::High, move |page| {
            tx.send(page.is_some()).unwrap();
        });

        // The worker has taken the request and is waiting on the fetch
        wait_until(|| log.lock().unwrap().len() == 1).await;
        assert_eq!(loader.queue_len(), 0);

        loader.shutdown();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!rx.try_recv().unwrap());
        assert!(rx.try_recv().is_err());
        assert!(loader.cached("101").is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_preloads_stale_references() {
        let mut config = Config::default();
        config.loader.volatile_ttl_secs = 0;

        let fetcher = MockFetcher::default()
            .with_page("101-0", page("pn=n_801\n", ""))
            .with_page("801-0", page("", ""));
        let log = Arc::clone(&fetcher.log);
        let loader = PageLoader::new(&config, fetcher).unwrap();

        assert!(loader.load_async("101", LoadPriority::High).await.is_some());
        wait_until(|| log.lock().unwrap().len() == 2).await;
        assert!(loader.cached("801").is_none());

        // 101 is still fresh, so this is served from cache and the expired
        // 801 is queued again at low priority
        let (tx, rx) = std::sync::mpsc::channel();
        loader.load("101", LoadPriority::High, move |page| {
            tx.send(page.is_some()).unwrap();
        });
        assert!(rx.try_recv().unwrap());

        wait_until(|| log.lock().unwrap().len() == 3).await;
        assert_eq!(*log.lock().unwrap(), vec!["101-0", "801-0", "801-0"]);

        let stats = loader.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.preloads_scheduled, 2);
        assert_eq!(stats.fetches, 3);
    }

    #[test]
    fn test_new_requires_runtime() {
        let result = PageLoader::new(&Config::default(), MockFetcher::default());
        assert!(matches!(result, Err(TeletextError::NoRuntime)));
    }
}
