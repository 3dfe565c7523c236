//! Analysis Dispatcher
//!
//! Turns discovered search results into judgments:
//! - Concurrent requests for one URL share a single analysis
//! - A fair semaphore caps simultaneous analyses; waiters are served in
//!   call order, since each request joins the queue inside `analyze`
//! - Cache hits short-circuit inside the gate
//! - Fetch or extraction shortfalls fall back to title + snippet
//!
//! Only cache I/O failures reach the caller as errors.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use futures::task::noop_waker_ref;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use slopscan_core::{ExtractionPayload, JudgmentRecord, ModelSelector, SearchResult, Settings};
use slopscan_net::{extract, HtmlFetcher};
use slopscan_store::{KeyValueStore, ResultCache, StoreError};

use crate::DispatcherConfig;

/// Errors surfaced by [`AnalysisDispatcher::analyze`]
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Analysis task failed: {0}")]
    Task(String),

    #[error("Analysis is disabled in settings")]
    Disabled,
}

impl From<StoreError> for AnalysisError {
    fn from(e: StoreError) -> Self {
        AnalysisError::Cache(e.to_string())
    }
}

type SharedOutcome = Shared<BoxFuture<'static, Result<JudgmentRecord, AnalysisError>>>;

type PermitFuture = BoxFuture<'static, Result<OwnedSemaphorePermit, AcquireError>>;

/// Take a place in the gate's wait queue right now.
///
/// Polling once registers the waiter; the task that later awaits the
/// returned future swaps in its own waker without losing its place.
fn enqueue(gate: Arc<Semaphore>) -> PermitFuture {
    let mut acquire = gate.acquire_owned().boxed();
    let mut cx = Context::from_waker(noop_waker_ref());
    match acquire.poll_unpin(&mut cx) {
        Poll::Ready(permit) => future::ready(permit).boxed(),
        Poll::Pending => acquire,
    }
}

/// Counters describing dispatcher activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Analyses actually run (joins excluded)
    pub analyses: usize,
    /// Callers that joined an in-flight analysis
    pub joined: usize,
    pub cache_hits: usize,
    pub fetch_failures: usize,
    pub snippet_fallbacks: usize,
    /// Most analyses ever inside the gate at once
    pub peak_active: usize,
}

#[derive(Default)]
struct Counters {
    analyses: AtomicUsize,
    joined: AtomicUsize,
    cache_hits: AtomicUsize,
    fetch_failures: AtomicUsize,
    snippet_fallbacks: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

/// Tracks occupancy of the gate while an analysis holds a permit
struct ActiveSlot<'a>(&'a Counters);

impl<'a> ActiveSlot<'a> {
    fn enter(counters: &'a Counters) -> Self {
        let now = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_active.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for ActiveSlot<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Removes a URL from the in-flight registry however its task ends
struct InFlightGuard {
    inner: Arc<Inner>,
    url: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.remove(&self.url);
    }
}

struct Inner {
    config: DispatcherConfig,
    fetcher: Arc<dyn HtmlFetcher>,
    cache: ResultCache,
    selector: ModelSelector,
    settings: RwLock<Settings>,
    gate: Arc<Semaphore>,
    in_flight: DashMap<String, SharedOutcome>,
    counters: Counters,
}

impl Inner {
    async fn run(
        &self,
        result: &SearchResult,
        permit: PermitFuture,
    ) -> Result<JudgmentRecord, AnalysisError> {
        let _permit = permit
            .await
            .map_err(|e| AnalysisError::Task(e.to_string()))?;
        let _slot = ActiveSlot::enter(&self.counters);

        if let Some(cached) = self.cache.get(&result.url).await? {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached);
        }

        let payload = self.gather(result).await;

        let model = self.selector.select(&payload.text);
        let score = model.score(&payload.text);
        let judge = model.classify(score);
        let record = JudgmentRecord::new(
            score,
            judge,
            &model.name,
            &payload.text,
            payload.source,
            Utc::now(),
        );

        self.cache.put(&result.url, &record).await?;

        info!(
            "Judged {} as {} ({}, {:?} text, model {})",
            result.url, record.judge, record.display_score, record.source, record.model
        );
        Ok(record)
    }

    /// Fetched main text when long enough, the snippet otherwise
    async fn gather(&self, result: &SearchResult) -> ExtractionPayload {
        match self.fetcher.fetch_markup(&result.url).await {
            Ok(page) => {
                let payload =
                    match tokio::task::spawn_blocking(move || extract(&page.html, &page.final_url))
                        .await
                    {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!("Extraction failed for {}: {} (using snippet)", result.url, e);
                            return self.snippet(result);
                        }
                    };
                let len = payload.text_len();
                if len >= self.config.min_text_chars {
                    return payload;
                }
                debug!(
                    "Extracted {} chars from {} (< {}), using snippet",
                    len, result.url, self.config.min_text_chars
                );
            }
            Err(e) => {
                self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Fetch failed for {}: {} (using snippet)", result.url, e);
            }
        }

        self.snippet(result)
    }

    fn snippet(&self, result: &SearchResult) -> ExtractionPayload {
        self.counters.snippet_fallbacks.fetch_add(1, Ordering::Relaxed);
        ExtractionPayload::from_snippet(&result.title, &result.snippet)
    }
}

/// Bounded-concurrency, de-duplicating analysis orchestrator.
///
/// Cheap to clone; clones share the same gate, registry and cache.
#[derive(Clone)]
pub struct AnalysisDispatcher {
    inner: Arc<Inner>,
}

impl AnalysisDispatcher {
    pub fn new(
        config: DispatcherConfig,
        fetcher: Arc<dyn HtmlFetcher>,
        store: Arc<dyn KeyValueStore>,
        selector: ModelSelector,
        settings: Settings,
    ) -> Self {
        let capacity = config.max_concurrent.max(1);
        let cache = ResultCache::new(store, settings.cache_ttl_hours);

        Self {
            inner: Arc::new(Inner {
                config,
                fetcher,
                cache,
                selector,
                settings: RwLock::new(settings),
                gate: Arc::new(Semaphore::new(capacity)),
                in_flight: DashMap::new(),
                counters: Counters::default(),
            }),
        }
    }

    /// Analyze one result, joining an in-flight analysis of the same URL.
    ///
    /// Work is spawned, so it runs to completion even if every caller
    /// stops waiting. Fails with [`AnalysisError::Disabled`] while the
    /// settings turn analysis off.
    pub async fn analyze(&self, result: SearchResult) -> Result<JudgmentRecord, AnalysisError> {
        if !self.is_enabled() {
            debug!("Skipping {}, analysis disabled", result.url);
            return Err(AnalysisError::Disabled);
        }

        let outcome = match self.inner.in_flight.entry(result.url.clone()) {
            Entry::Occupied(entry) => {
                debug!("Joining in-flight analysis of {}", result.url);
                self.inner.counters.joined.fetch_add(1, Ordering::Relaxed);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                self.inner.counters.analyses.fetch_add(1, Ordering::Relaxed);
                let guard = InFlightGuard {
                    inner: self.inner.clone(),
                    url: result.url.clone(),
                };
                let permit = enqueue(self.inner.gate.clone());
                let handle = tokio::spawn(async move {
                    let guard = guard;
                    let outcome = guard.inner.run(&result, permit).await;
                    drop(guard);
                    outcome
                });

                let shared = async move {
                    handle
                        .await
                        .unwrap_or_else(|e| Err(AnalysisError::Task(e.to_string())))
                }
                .boxed()
                .shared();

                entry.insert(shared.clone());
                shared
            }
        };

        outcome.await
    }

    /// Delete cache entries older than the current TTL
    pub async fn sweep_expired(&self) -> Result<usize, AnalysisError> {
        let ttl = self.inner.cache.ttl_hours();
        Ok(self.inner.cache.sweep_expired(ttl).await?)
    }

    /// Apply new user settings; the TTL takes effect on the next cache read
    pub fn apply_settings(&self, settings: Settings) {
        self.inner.cache.set_ttl_hours(settings.cache_ttl_hours);
        *self.inner.settings.write() = settings;
        debug!(
            "Settings applied: enabled={}, ttl={}h",
            settings.enabled, settings.cache_ttl_hours
        );
    }

    pub fn settings(&self) -> Settings {
        *self.inner.settings.read()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.settings.read().enabled
    }

    pub fn cache(&self) -> &ResultCache {
        &self.inner.cache
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.inner.selector
    }

    /// URLs currently being analyzed
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.len()
    }

    pub fn stats(&self) -> DispatchStats {
        let c = &self.inner.counters;
        DispatchStats {
            analyses: c.analyses.load(Ordering::Relaxed),
            joined: c.joined.load(Ordering::Relaxed),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            fetch_failures: c.fetch_failures.load(Ordering::Relaxed),
            snippet_fallbacks: c.snippet_fallbacks.load(Ordering::Relaxed),
            peak_active: c.peak_active.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::future::join_all;
    use serde_json::Value;
    use slopscan_core::{
        content_hash, normalize_text, Judge, ScoringModel, TextSource, Thresholds,
    };
    use slopscan_net::{FetchError, FetchedPage};
    use slopscan_store::{cache_key, MemoryStore, StoreChange};
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::broadcast;

    /// Serves canned markup, counting calls and concurrent fetches
    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, String>,
        delay: Duration,
        calls: AtomicUsize,
        current: AtomicUsize,
        peak: AtomicUsize,
        order: parking_lot::Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn with_page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl HtmlFetcher for FakeFetcher {
        async fn fetch_markup(&self, url: &str) -> Result<FetchedPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.order.lock().push(url.to_string());
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.current.fetch_sub(1, Ordering::SeqCst);

            match self.pages.get(url) {
                Some(html) => Ok(FetchedPage {
                    html: html.clone(),
                    final_url: url.to_string(),
                    status: 200,
                    truncated: false,
                }),
                None => Err(FetchError::Status(404)),
            }
        }
    }

    /// Store whose every operation fails
    struct BrokenStore {
        changes: broadcast::Sender<StoreChange>,
    }

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _keys: Option<&[String]>) -> Result<HashMap<String, Value>, StoreError> {
            Err(StoreError::Unavailable("host storage rejected read".to_string()))
        }

        async fn set(&self, _items: HashMap<String, Value>) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("host storage rejected write".to_string()))
        }

        async fn remove(&self, _keys: &[String]) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("host storage rejected remove".to_string()))
        }

        fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
            self.changes.subscribe()
        }
    }

    /// Memory store that rejects writes to one key
    struct RejectingStore {
        inner: MemoryStore,
        rejected: String,
    }

    #[async_trait]
    impl KeyValueStore for RejectingStore {
        async fn get(&self, keys: Option<&[String]>) -> Result<HashMap<String, Value>, StoreError> {
            self.inner.get(keys).await
        }

        async fn set(&self, items: HashMap<String, Value>) -> Result<(), StoreError> {
            if items.contains_key(&self.rejected) {
                return Err(StoreError::Unavailable("quota exceeded".to_string()));
            }
            self.inner.set(items).await
        }

        async fn remove(&self, keys: &[String]) -> Result<(), StoreError> {
            self.inner.remove(keys).await
        }

        fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
            self.inner.subscribe()
        }
    }

    fn article(chars: usize) -> String {
        let sentence = "Local councils reviewed the proposal and asked for a revised budget. ";
        let body = sentence.repeat(chars / sentence.len() + 1)[..chars].to_string();
        format!(
            "<html><body><nav>Menu</nav><article><p>{}</p></article><footer>Footer</footer></body></html>",
            body
        )
    }

    fn selector() -> ModelSelector {
        let delta: Vec<f64> = (0..512).map(|i| ((i % 7) as f64 - 3.0) / 50.0).collect();
        ModelSelector::new(ScoringModel::new(
            "test-model",
            512,
            1200,
            0.0,
            delta,
            Thresholds::default(),
        ))
    }

    fn dispatcher(
        fetcher: Arc<FakeFetcher>,
        store: Arc<dyn KeyValueStore>,
        max_concurrent: usize,
    ) -> AnalysisDispatcher {
        AnalysisDispatcher::new(
            DispatcherConfig {
                max_concurrent,
                min_text_chars: 180,
            },
            fetcher,
            store,
            selector(),
            Settings::default(),
        )
    }

    fn result(url: &str) -> SearchResult {
        SearchResult::new(url, "Budget review", "Councils asked for a revised budget.")
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_analysis() {
        let url = "https://news.example/budget";
        let fetcher = Arc::new(
            FakeFetcher::default()
                .with_page(url, &article(600))
                .with_delay(Duration::from_millis(50)),
        );
        let store = Arc::new(MemoryStore::new());
        let d = dispatcher(fetcher.clone(), store.clone(), 2);

        let outcomes = join_all((0..8).map(|_| d.analyze(result(url)))).await;

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        let first = outcomes[0].clone().unwrap();
        for outcome in &outcomes {
            assert_eq!(outcome.as_ref().unwrap(), &first);
        }
        assert_eq!(store.len(), 1);

        let stats = d.stats();
        assert_eq!(stats.analyses, 1);
        assert_eq!(stats.joined, 7);
        assert_eq!(d.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_gate_caps_active_analyses() {
        let urls: Vec<String> = (0..6).map(|i| format!("https://site{}.example/", i)).collect();
        let mut fake = FakeFetcher::default().with_delay(Duration::from_millis(30));
        for url in &urls {
            fake = fake.with_page(url, &article(400));
        }
        let fetcher = Arc::new(fake);
        let d = dispatcher(fetcher.clone(), Arc::new(MemoryStore::new()), 2);

        let outcomes = join_all(urls.iter().map(|u| d.analyze(result(u)))).await;

        assert!(outcomes.iter().all(|o| o.is_ok()));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 6);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 2);
        assert_eq!(d.stats().peak_active, 2);
    }

    #[tokio::test]
    async fn test_gate_of_one_serializes() {
        let urls: Vec<String> = (0..3).map(|i| format!("https://one{}.example/", i)).collect();
        let fetcher = Arc::new(FakeFetcher::default().with_delay(Duration::from_millis(10)));
        let d = dispatcher(fetcher.clone(), Arc::new(MemoryStore::new()), 1);

        let outcomes = join_all(urls.iter().map(|u| d.analyze(result(u)))).await;

        assert!(outcomes.iter().all(|o| o.is_ok()));
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_queued_requests_run_in_call_order() {
        let urls: Vec<String> = (0..5).map(|i| format!("https://queue{}.example/", i)).collect();
        let fetcher = Arc::new(FakeFetcher::default().with_delay(Duration::from_millis(10)));
        let d = dispatcher(fetcher.clone(), Arc::new(MemoryStore::new()), 1);

        let calls: Vec<SearchResult> = urls.iter().map(|u| result(u)).collect();
        let worker = d.clone();
        let outcomes = tokio::spawn(async move {
            join_all(calls.into_iter().map(|r| worker.analyze(r))).await
        })
        .await
        .unwrap();

        assert!(outcomes.iter().all(|o| o.is_ok()));
        assert_eq!(*fetcher.order.lock(), urls);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_task_releases_slot_in_order() {
        let urls: Vec<String> = (0..4).map(|i| format!("https://fail{}.example/", i)).collect();
        let fetcher = Arc::new(FakeFetcher::default().with_delay(Duration::from_millis(10)));
        let store = Arc::new(RejectingStore {
            inner: MemoryStore::new(),
            rejected: cache_key(&urls[0]),
        });
        let d = dispatcher(fetcher.clone(), store.clone(), 1);

        let calls: Vec<SearchResult> = urls.iter().map(|u| result(u)).collect();
        let worker = d.clone();
        let outcomes = tokio::spawn(async move {
            join_all(calls.into_iter().map(|r| worker.analyze(r))).await
        })
        .await
        .unwrap();

        assert!(matches!(outcomes[0], Err(AnalysisError::Cache(_))));
        assert!(outcomes[1..].iter().all(|o| o.is_ok()));
        assert_eq!(*fetcher.order.lock(), urls);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 1);
        assert_eq!(store.inner.len(), 3);
        assert_eq!(d.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_disabled_dispatcher_skips_analysis() {
        let url = "https://off.example/";
        let fetcher = Arc::new(FakeFetcher::default().with_page(url, &article(600)));
        let d = dispatcher(fetcher.clone(), Arc::new(MemoryStore::new()), 2);

        d.apply_settings(Settings {
            enabled: false,
            cache_ttl_hours: 168,
        });
        assert!(matches!(d.analyze(result(url)).await, Err(AnalysisError::Disabled)));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);

        d.apply_settings(Settings::default());
        assert!(d.analyze(result(url)).await.is_ok());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fetch() {
        let url = "https://cached.example/";
        let fetcher = Arc::new(FakeFetcher::default().with_page(url, &article(600)));
        let d = dispatcher(fetcher.clone(), Arc::new(MemoryStore::new()), 2);

        let record = JudgmentRecord::new(0.9, Judge::Ai, "earlier", "text", TextSource::Fetched, Utc::now());
        d.cache().put(url, &record).await.unwrap();

        let got = d.analyze(result(url)).await.unwrap();
        assert_eq!(got, record);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(d.stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_second_request_is_served_from_cache() {
        let url = "https://again.example/";
        let fetcher = Arc::new(FakeFetcher::default().with_page(url, &article(600)));
        let d = dispatcher(fetcher.clone(), Arc::new(MemoryStore::new()), 2);

        let first = d.analyze(result(url)).await.unwrap();
        let second = d.analyze(result(url)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetched_text_is_scored() {
        let url = "https://long.example/";
        let html = article(600);
        let fetcher = Arc::new(FakeFetcher::default().with_page(url, &html));
        let store = Arc::new(MemoryStore::new());
        let d = dispatcher(fetcher, store.clone(), 2);

        let record = d.analyze(result(url)).await.unwrap();
        let expected = extract(&html, url);

        assert_eq!(record.source, TextSource::Fetched);
        assert_eq!(record.content_hash, content_hash(&expected.text));
        assert_eq!(record.score, selector().default_model().score(&expected.text));
        assert_eq!(record.model, "test-model");
        assert!(store.get_one(&cache_key(url)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_short_extraction_falls_back_to_snippet() {
        let url = "https://short.example/";
        let fetcher = Arc::new(FakeFetcher::default().with_page(url, &article(50)));
        let d = dispatcher(fetcher, Arc::new(MemoryStore::new()), 2);

        let r = result(url);
        let record = d.analyze(r.clone()).await.unwrap();
        let snippet_text = normalize_text(&format!("{}\n{}", r.title, r.snippet));

        assert_eq!(record.source, TextSource::Snippet);
        assert_eq!(record.content_hash, content_hash(&snippet_text));
        assert_eq!(d.stats().snippet_fallbacks, 1);
        assert_eq!(d.stats().fetch_failures, 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_snippet() {
        let fetcher = Arc::new(FakeFetcher::default());
        let d = dispatcher(fetcher, Arc::new(MemoryStore::new()), 2);

        let record = d.analyze(result("https://gone.example/")).await.unwrap();
        assert_eq!(record.source, TextSource::Snippet);
        assert_eq!(d.stats().fetch_failures, 1);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let url = "https://broken.example/";
        let fetcher = Arc::new(FakeFetcher::default().with_page(url, &article(600)));
        let (changes, _) = broadcast::channel(4);
        let d = dispatcher(fetcher, Arc::new(BrokenStore { changes }), 2);

        let outcome = d.analyze(result(url)).await;
        assert!(matches!(outcome, Err(AnalysisError::Cache(_))));
        assert_eq!(d.in_flight_count(), 0);

        // The failed slot is released for the next request
        let again = d.analyze(result(url)).await;
        assert!(matches!(again, Err(AnalysisError::Cache(_))));
    }

    #[tokio::test]
    async fn test_sweep_uses_current_ttl() {
        let store = Arc::new(MemoryStore::new());
        let d = dispatcher(Arc::new(FakeFetcher::default()), store.clone(), 2);

        let old = JudgmentRecord::new(
            0.2,
            Judge::Human,
            "m",
            "t",
            TextSource::Snippet,
            Utc::now() - chrono::Duration::hours(3),
        );
        d.cache().put("https://old.example/", &old).await.unwrap();

        assert_eq!(d.sweep_expired().await.unwrap(), 0);
        d.apply_settings(Settings {
            enabled: true,
            cache_ttl_hours: 2,
        });
        assert_eq!(d.sweep_expired().await.unwrap(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_apply_settings() {
        let d = dispatcher(Arc::new(FakeFetcher::default()), Arc::new(MemoryStore::new()), 2);
        assert!(d.is_enabled());

        d.apply_settings(Settings {
            enabled: false,
            cache_ttl_hours: 12,
        });
        assert!(!d.is_enabled());
        assert_eq!(d.cache().ttl_hours(), 12);
        assert_eq!(d.settings().cache_ttl_hours, 12);
    }
}
