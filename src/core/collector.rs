//! Per-family status cache with in-flight request coalescing.
//!
//! A [`Collector`] owns the cache for every entity that shares one upstream
//! endpoint. Requests arriving while a fetch is running are queued and served
//! by that fetch; requests arriving within the freshness window of the last
//! successful fetch are served from the cache without touching the network.

use crate::core::doctor::{Format, ResponseParser};
use crate::core::ent::StatusMap;
use crate::core::error::FetchError;
use crate::core::fetcher::Fetcher;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(60);

/// What every callback of one resolution cycle observes.
#[derive(Debug, Clone)]
pub struct FamilySnapshot {
    pub statuses: Arc<StatusMap>,
    pub last_error: Option<String>,
    pub last_fetch: Option<Instant>,
    pub in_flight: bool,
}

pub type Callback = Box<dyn FnOnce(&FamilySnapshot) + Send + 'static>;

struct CacheState {
    statuses: Arc<StatusMap>,
    pending: Vec<Callback>,
    last_fetch: Option<Instant>,
    in_flight: bool,
    last_error: Option<String>,
}

impl CacheState {
    fn snapshot(&self) -> FamilySnapshot {
        FamilySnapshot {
            statuses: Arc::clone(&self.statuses),
            last_error: self.last_error.clone(),
            last_fetch: self.last_fetch,
            in_flight: self.in_flight,
        }
    }
}

pub struct Collector {
    name: String,
    url: String,
    format: Format,
    parser: Box<dyn ResponseParser>,
    fetcher: Arc<dyn Fetcher>,
    freshness: Duration,
    state: Mutex<CacheState>,
}

impl Collector {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        format: Format,
        fetcher: Arc<dyn Fetcher>,
        freshness: Duration,
    ) -> Collector {
        Collector {
            name: name.into(),
            url: url.into(),
            format,
            parser: format.parser(),
            fetcher,
            freshness,
            state: Mutex::new(CacheState {
                statuses: Arc::new(StatusMap::new()),
                pending: Vec::new(),
                last_fetch: None,
                in_flight: false,
                last_error: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn snapshot(&self) -> FamilySnapshot {
        self.state().snapshot()
    }

    // No callback runs under the lock, so poisoning never leaves a half-written state.
    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue `callback` for the next resolution of this family.
    ///
    /// Never blocks on the network. Must be called from within a tokio
    /// runtime, since a cold or stale cache spawns the fetch.
    pub fn request_update(self: &Arc<Self>, callback: Callback) {
        let mut state = self.state();
        state.pending.push(callback);

        if state.in_flight {
            tracing::debug!(family = %self.name, queued = state.pending.len(), "fetch in flight, queued");
            return;
        }

        let fresh = state
            .last_fetch
            .map(|at| at.elapsed() < self.freshness)
            .unwrap_or(false);
        if fresh {
            let pending = std::mem::take(&mut state.pending);
            let snapshot = state.snapshot();
            drop(state);
            tracing::debug!(family = %self.name, callbacks = pending.len(), "serving cached statuses");
            for cb in pending {
                cb(&snapshot);
            }
            return;
        }

        state.in_flight = true;
        drop(state);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            // The fetch runs in its own task so a panic in a fetcher or parser
            // still resolves the cycle instead of leaving it in flight.
            let worker = Arc::clone(&this);
            let outcome = match tokio::spawn(async move { worker.fetch_and_parse().await }).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => Err(FetchError::Transport("fetch task panicked".to_string())),
                Err(_) => Err(FetchError::Transport("fetch task cancelled".to_string())),
            };
            this.resolve(outcome);
        });
    }

    async fn fetch_and_parse(&self) -> Result<StatusMap, FetchError> {
        tracing::debug!(family = %self.name, url = %self.url, "fetching status");
        let body = self.fetcher.fetch(&self.url).await?;
        let body = String::from_utf8(body).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(self.parser.parse(&body)?)
    }

    fn resolve(&self, outcome: Result<StatusMap, FetchError>) {
        let mut state = self.state();
        match outcome {
            Ok(statuses) => {
                tracing::debug!(family = %self.name, entities = statuses.len(), "fetch complete");
                state.statuses = Arc::new(statuses);
                state.last_error = None;
                state.last_fetch = Some(Instant::now());
            }
            Err(e) => {
                tracing::warn!(family = %self.name, url = %self.url, error = %e, "fetch failed");
                state.statuses = Arc::new(StatusMap::new());
                state.last_error = Some(e.to_string());
            }
        }
        // Taking the queue and clearing the flag in one critical section means
        // a request made from inside a callback below starts its own cycle.
        let pending = std::mem::take(&mut state.pending);
        state.in_flight = false;
        let snapshot = state.snapshot();
        drop(state);

        for cb in pending {
            cb(&snapshot);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::ent::Status;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{mpsc, Semaphore};

    pub const GCP_PAGE: &str = r#"<html><body><table class="timeline">
        <tr><td class="service-status">Google App Engine</td><td><span class="end-bubble ok"></span></td></tr>
        <tr><td class="service-status">Google BigQuery</td><td><span class="end-bubble medium"></span></td></tr>
        </table></body></html>"#;

    /// Serves canned responses in order, repeating the last one, and counts
    /// requests. With `gated`, each fetch waits for a permit before returning.
    pub struct MockFetcher {
        responses: Mutex<VecDeque<Result<String, u16>>>,
        calls: AtomicUsize,
        gate: Option<Semaphore>,
    }

    impl MockFetcher {
        pub fn new(responses: Vec<Result<&str, u16>>) -> Self {
            MockFetcher {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        pub fn gated(responses: Vec<Result<&str, u16>>) -> Self {
            MockFetcher {
                gate: Some(Semaphore::new(0)),
                ..MockFetcher::new(responses)
            }
        }

        pub fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            let mut responses = self.responses.lock().unwrap();
            let next = if responses.len() > 1 {
                responses.pop_front().unwrap()
            } else {
                responses.front().cloned().unwrap()
            };
            match next {
                Ok(body) => Ok(body.into_bytes()),
                Err(code) => Err(FetchError::Transport(format!("upstream returned {}", code))),
            }
        }
    }

    fn collector(fetcher: Arc<MockFetcher>) -> Arc<Collector> {
        Arc::new(Collector::new(
            "Google Cloud Platform",
            "https://status.cloud.google.com",
            Format::Html,
            fetcher,
            DEFAULT_FRESHNESS,
        ))
    }

    fn reporting(tx: &mpsc::UnboundedSender<(usize, FamilySnapshot)>, id: usize) -> Callback {
        let tx = tx.clone();
        Box::new(move |snap: &FamilySnapshot| {
            let _ = tx.send((id, snap.clone()));
        })
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_fetch() {
        let fetcher = Arc::new(MockFetcher::gated(vec![Ok(GCP_PAGE)]));
        let c = collector(fetcher.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        for id in 0..5 {
            c.request_update(reporting(&tx, id));
        }
        assert!(c.snapshot().in_flight);
        fetcher.release();

        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(rx.recv().await.unwrap());
        }
        assert_eq!(fetcher.calls(), 1);
        for (_, snap) in &seen {
            assert_eq!(snap.statuses, seen[0].1.statuses);
            assert_eq!(snap.statuses["Google App Engine"], Status::Good);
            assert!(snap.last_error.is_none());
        }
        assert!(!c.snapshot().in_flight);
    }

    #[tokio::test]
    async fn callbacks_fire_in_enqueue_order() {
        let fetcher = Arc::new(MockFetcher::gated(vec![Ok(GCP_PAGE)]));
        let c = collector(fetcher.clone());
        let order = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        for label in ["A", "B", "C"] {
            let order = order.clone();
            let tx = tx.clone();
            c.request_update(Box::new(move |_: &FamilySnapshot| {
                order.lock().unwrap().push(label);
                let _ = tx.send(());
            }));
        }
        fetcher.release();
        for _ in 0..3 {
            rx.recv().await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec!["A", "B", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn freshness_window_gates_the_network() {
        let fetcher = Arc::new(MockFetcher::new(vec![Ok(GCP_PAGE)]));
        let c = collector(fetcher.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        c.request_update(reporting(&tx, 0));
        rx.recv().await.unwrap();
        assert_eq!(fetcher.calls(), 1);

        tokio::time::advance(Duration::from_secs(30)).await;
        c.request_update(reporting(&tx, 1));
        // Fast path runs the callback before returning.
        let (id, snap) = rx.try_recv().unwrap();
        assert_eq!(id, 1);
        assert_eq!(snap.statuses["Google BigQuery"], Status::Minor);
        assert_eq!(fetcher.calls(), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        c.request_update(reporting(&tx, 2));
        rx.recv().await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn failure_empties_the_cache_and_success_replaces_it() {
        let fetcher = Arc::new(MockFetcher::new(vec![Err(500), Ok(GCP_PAGE)]));
        let c = collector(fetcher.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        c.request_update(reporting(&tx, 0));
        c.request_update(reporting(&tx, 1));
        for _ in 0..2 {
            let (_, snap) = rx.recv().await.unwrap();
            assert!(snap.statuses.is_empty());
            let err = snap.last_error.unwrap();
            assert!(err.contains("500"), "{}", err);
        }

        // A failed fetch does not start the freshness window.
        c.request_update(reporting(&tx, 2));
        let (_, snap) = rx.recv().await.unwrap();
        assert_eq!(fetcher.calls(), 2);
        assert!(snap.last_error.is_none());
        assert_eq!(snap.statuses.len(), 2);
    }

    #[tokio::test]
    async fn unparseable_body_is_a_failure() {
        let fetcher = Arc::new(MockFetcher::new(vec![Ok("<html>nothing here</html>")]));
        let c = collector(fetcher);
        let (tx, mut rx) = mpsc::unbounded_channel();

        c.request_update(reporting(&tx, 0));
        let (_, snap) = rx.recv().await.unwrap();
        assert!(snap.statuses.is_empty());
        assert!(snap.last_error.unwrap().starts_with("couldn't parse response"));
    }

    struct PanickingFetcher;

    #[async_trait]
    impl Fetcher for PanickingFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            panic!("fetcher blew up");
        }
    }

    #[tokio::test]
    async fn panicking_fetch_still_resolves_the_cycle() {
        let c = Arc::new(Collector::new(
            "Google Cloud Platform",
            "https://status.cloud.google.com",
            Format::Html,
            Arc::new(PanickingFetcher),
            DEFAULT_FRESHNESS,
        ));
        let (tx, mut rx) = mpsc::unbounded_channel();

        c.request_update(reporting(&tx, 0));
        c.request_update(reporting(&tx, 1));
        for expected in 0..2 {
            let (id, snap) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(id, expected);
            assert!(snap.statuses.is_empty());
            assert_eq!(snap.last_error.unwrap(), "transport error: fetch task panicked");
        }
        assert!(!c.snapshot().in_flight);

        // The family is not stuck: the next request starts another fetch.
        c.request_update(reporting(&tx, 2));
        let (id, _) = rx.recv().await.unwrap();
        assert_eq!(id, 2);
    }

    #[tokio::test]
    async fn reentrant_request_starts_a_new_cycle() {
        let fetcher = Arc::new(MockFetcher::gated(vec![Err(503), Ok(GCP_PAGE)]));
        let c = collector(fetcher.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let inner = c.clone();
        let inner_tx = tx.clone();
        c.request_update(Box::new(move |snap: &FamilySnapshot| {
            let _ = inner_tx.send((0, snap.clone()));
            inner.request_update(reporting(&inner_tx, 1));
        }));
        c.request_update(reporting(&tx, 2));

        fetcher.release();
        let (first, snap) = rx.recv().await.unwrap();
        assert_eq!(first, 0);
        assert!(snap.last_error.is_some());
        let (second, _) = rx.recv().await.unwrap();
        assert_eq!(second, 2);

        // The re-entrant request was not served by the failed cycle; it
        // started a second fetch of its own.
        fetcher.release();
        let (third, snap) = rx.recv().await.unwrap();
        assert_eq!(third, 1);
        assert!(snap.last_error.is_none());
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn reentrant_request_after_success_is_served_from_cache() {
        let fetcher = Arc::new(MockFetcher::new(vec![Ok(GCP_PAGE)]));
        let c = collector(fetcher.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let inner = c.clone();
        let inner_tx = tx.clone();
        c.request_update(Box::new(move |_: &FamilySnapshot| {
            inner.request_update(reporting(&inner_tx, 1));
        }));

        let (id, snap) = rx.recv().await.unwrap();
        assert_eq!(id, 1);
        assert_eq!(snap.statuses.len(), 2);
        assert_eq!(fetcher.calls(), 1);
        assert!(!c.snapshot().in_flight);
    }
}
