//! Fetch-or-get entry point over the store and the coalescer.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::cache::coalescer::{RequestCoalescer, SharedOutcome};
use crate::cache::revalidate::RevalidateTrigger;
use crate::cache::store::CacheStore;
use crate::error::{SyncError, SyncResult};
use crate::observability::metrics;

/// A reusable fetcher, kept by key subscriptions for revalidation.
pub type Fetcher<V> = Arc<dyn Fn() -> BoxFuture<'static, SyncResult<V>> + Send + Sync>;

/// Per-call fetch options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// TTL of the written entry; `None` uses the store default.
    pub ttl: Option<Duration>,
    /// Join an in-flight fetch for the same key instead of starting another.
    pub dedupe: bool,
    /// Ignore a fresh cached value.
    pub skip_cache: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            dedupe: true,
            skip_cache: false,
        }
    }
}

impl FetchOptions {
    /// Bypass the cached value but still coalesce.
    pub fn forced() -> Self {
        Self {
            skip_cache: true,
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

struct KeyWatch<V> {
    tx: watch::Sender<Option<Arc<V>>>,
    fetcher: Fetcher<V>,
    ttl: Option<Duration>,
    subscribers: usize,
}

struct Inner<V> {
    store: CacheStore<V>,
    coalescer: RequestCoalescer<V>,
    watches: DashMap<String, KeyWatch<V>>,
}

impl<V> Inner<V>
where
    V: Send + Sync + 'static,
{
    fn store_result(&self, key: &str, payload: &Arc<V>, ttl: Duration, seq: u64) {
        if self.store.write_if_newer(key, Arc::clone(payload), ttl, seq) {
            self.notify(key, payload);
        } else {
            metrics::record_stale_write_rejected();
            tracing::debug!(key, seq, "Discarded fetch result superseded by a newer write");
        }
    }

    fn notify(&self, key: &str, payload: &Arc<V>) {
        if let Some(watch) = self.watches.get(key) {
            watch.tx.send_replace(Some(Arc::clone(payload)));
        }
    }
}

/// Clears the in-flight slot when the fetch task ends, including on panic.
struct SlotGuard<V>
where
    V: Send + Sync + 'static,
{
    inner: Arc<Inner<V>>,
    key: String,
    seq: u64,
}

impl<V> Drop for SlotGuard<V>
where
    V: Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.inner.coalescer.complete(&self.key, self.seq);
    }
}

/// Keyed TTL cache with at most one in-flight fetch per key.
///
/// Cloning is cheap and clones share state.
pub struct FetchClient<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for FetchClient<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> FetchClient<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: CacheStore::new(default_ttl),
                coalescer: RequestCoalescer::new(),
                watches: DashMap::new(),
            }),
        }
    }

    /// Fresh cached value, no side effects.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        self.inner.store.get(key)
    }

    /// Cached value regardless of age.
    pub fn peek(&self, key: &str) -> Option<Arc<V>> {
        self.inner.store.peek(key)
    }

    /// Overwrite the entry. Wins over any fetch already in flight for `key`.
    pub fn set(&self, key: &str, value: V) {
        let payload = Arc::new(value);
        self.inner.store.set(key, Arc::clone(&payload));
        self.inner.notify(key, &payload);
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.inner.store.invalidate(key)
    }

    pub fn clear(&self) {
        self.inner.store.clear();
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.inner.coalescer.is_in_flight(key)
    }

    /// Return the fresh value for `key`, or fetch it.
    ///
    /// Concurrent callers for the same key share one fetch and receive the
    /// same value or the same error. A failed fetch writes nothing.
    pub async fn fetch<F, Fut>(&self, key: &str, fetcher: F, options: FetchOptions) -> SyncResult<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<V>> + Send + 'static,
    {
        if !options.skip_cache {
            let hit = self.inner.store.get(key);
            metrics::record_cache_lookup(hit.is_some());
            if let Some(payload) = hit {
                tracing::trace!(key, "Cache hit");
                return Ok(payload);
            }
        }

        let ttl = options.ttl.unwrap_or_else(|| self.inner.store.default_ttl());
        let outcome = if options.dedupe {
            let (outcome, joined) = self
                .inner
                .coalescer
                .join_or_launch(key, || self.launch(key, fetcher().boxed(), ttl));
            if joined {
                metrics::record_coalesced();
                tracing::debug!(key, "Joined in-flight fetch");
            }
            outcome
        } else {
            self.launch(key, fetcher().boxed(), ttl).1
        };

        outcome.await
    }

    fn launch(
        &self,
        key: &str,
        request: BoxFuture<'static, SyncResult<V>>,
        ttl: Duration,
    ) -> (u64, SharedOutcome<V>) {
        let seq = self.inner.store.next_seq();
        let inner = Arc::clone(&self.inner);
        let key = key.to_string();

        let task = tokio::spawn(async move {
            let _slot = SlotGuard {
                inner: Arc::clone(&inner),
                key: key.clone(),
                seq,
            };
            let started = Instant::now();
            let result = request.await;
            metrics::record_fetch(result.is_ok(), started.elapsed());

            match result {
                Ok(value) => {
                    let payload = Arc::new(value);
                    inner.store_result(&key, &payload, ttl, seq);
                    Ok(payload)
                }
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "Fetch failed");
                    Err(err)
                }
            }
        });

        let outcome = async move {
            match task.await {
                Ok(result) => result,
                Err(join_err) => Err(SyncError::Task(join_err.to_string())),
            }
        }
        .boxed()
        .shared();

        (seq, outcome)
    }

    /// Watch `key`. While at least one subscription is alive the key is
    /// re-fetched with `fetcher` on every [`FetchClient::revalidate`].
    ///
    /// The first subscriber's fetcher and TTL are kept for the key.
    pub fn subscribe(&self, key: &str, fetcher: Fetcher<V>, ttl: Option<Duration>) -> KeySubscription<V> {
        let rx = match self.inner.watches.entry(key.to_string()) {
            Entry::Occupied(mut existing) => {
                let watch = existing.get_mut();
                watch.subscribers += 1;
                watch.tx.subscribe()
            }
            Entry::Vacant(slot) => {
                let (tx, rx) = watch::channel(self.inner.store.peek(key));
                slot.insert(KeyWatch {
                    tx,
                    fetcher,
                    ttl,
                    subscribers: 1,
                });
                rx
            }
        };

        KeySubscription {
            client: self.clone(),
            key: key.to_string(),
            rx,
        }
    }

    fn release(&self, key: &str) {
        if let Entry::Occupied(mut existing) = self.inner.watches.entry(key.to_string()) {
            let watch = existing.get_mut();
            watch.subscribers = watch.subscribers.saturating_sub(1);
            if watch.subscribers == 0 {
                existing.remove();
            }
        }
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner
            .watches
            .get(key)
            .map(|w| w.subscribers)
            .unwrap_or(0)
    }

    /// Re-fetch every key that has at least one subscriber, bypassing freshness.
    ///
    /// Failures are logged; returns the number of keys revalidated.
    pub async fn revalidate(&self, trigger: RevalidateTrigger) -> usize {
        let targets: Vec<(String, Fetcher<V>, Option<Duration>)> = self
            .inner
            .watches
            .iter()
            .filter(|w| w.subscribers > 0)
            .map(|w| (w.key().clone(), Arc::clone(&w.fetcher), w.ttl))
            .collect();

        if targets.is_empty() {
            return 0;
        }
        tracing::debug!(%trigger, keys = targets.len(), "Revalidating subscribed keys");

        let fetches = targets.into_iter().map(|(key, fetcher, ttl)| async move {
            let options = FetchOptions {
                ttl,
                ..FetchOptions::forced()
            };
            let result = self.fetch(&key, move || fetcher(), options).await;
            (key, result)
        });

        let results = join_all(fetches).await;
        for (key, result) in &results {
            if let Err(e) = result {
                tracing::warn!(key = %key, %trigger, error = %e, "Revalidation failed");
            }
        }
        results.len()
    }
}

/// Live view of one cache key. Dropping it unsubscribes.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct KeySubscription<V>
where
    V: Send + Sync + 'static,
{
    client: FetchClient<V>,
    key: String,
    rx: watch::Receiver<Option<Arc<V>>>,
}

impl<V> KeySubscription<V>
where
    V: Send + Sync + 'static,
{
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Latest value written for the key (possibly stale).
    pub fn current(&self) -> Option<Arc<V>> {
        self.rx.borrow().clone()
    }

    /// Wait for the next write and return it.
    pub async fn changed(&mut self) -> Option<Arc<V>> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }
}

impl<V> Drop for KeySubscription<V>
where
    V: Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.client.release(&self.key);
    }
}
