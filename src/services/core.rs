//! Machinery shared by the domain services.
//!
//! # Responsibilities
//! - Hold the current snapshot (lock-free reads through `ArcSwapOption`)
//! - Rate-limit network fetches; inside the window republish the last snapshot
//! - Replace and publish snapshots under one lock so subscribers never see
//!   them out of order
//! - Drive periodic ticks until shutdown

use arc_swap::ArcSwapOption;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::bus::DataBus;
use crate::cache::{FetchClient, FetchOptions};
use crate::config::PollSettings;
use crate::domain::{DomainType, Snapshot, SnapshotItem};
use crate::error::SyncResult;
use crate::observability::metrics;

/// Snapshot state and refresh policy for one domain.
pub struct ServiceCore<T: SnapshotItem> {
    cache_key: String,
    cache: FetchClient<Vec<T>>,
    bus: Arc<DataBus>,
    current: ArcSwapOption<Snapshot<T>>,
    /// Completion time of the last successful fetch.
    last_fetch: Mutex<Option<Instant>>,
    /// Serializes snapshot replacement + publish. Never held across an await.
    publish_lock: Mutex<()>,
    settings: PollSettings,
}

impl<T: SnapshotItem> ServiceCore<T> {
    pub fn new(cache: FetchClient<Vec<T>>, bus: Arc<DataBus>, settings: PollSettings) -> Self {
        Self {
            cache_key: format!("domain:{}", T::DOMAIN),
            cache,
            bus,
            current: ArcSwapOption::empty(),
            last_fetch: Mutex::new(None),
            publish_lock: Mutex::new(()),
            settings,
        }
    }

    pub fn domain(&self) -> DomainType {
        T::DOMAIN
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    pub fn cache(&self) -> &FetchClient<Vec<T>> {
        &self.cache
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Current snapshot, if any fetch has succeeded yet.
    pub fn snapshot(&self) -> Option<Arc<Snapshot<T>>> {
        self.current.load_full()
    }

    fn within_rate_limit(&self) -> bool {
        let last = *self.last_fetch.lock().unwrap_or_else(PoisonError::into_inner);
        last.is_some_and(|at| at.elapsed() < self.settings.min_fetch_interval)
    }

    /// Fetch from the source and publish the result.
    ///
    /// Unless `force` is set, a call inside the minimum fetch interval skips
    /// the network and republishes the current snapshot. Past that gate the
    /// fetch always goes upstream: a cached vector is never restamped as a new
    /// snapshot. Concurrent refreshes still share one fetch through the cache.
    pub async fn refresh_with<F, Fut>(&self, force: bool, fetcher: F) -> SyncResult<Arc<Snapshot<T>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<Vec<T>>> + Send + 'static,
    {
        if !force && self.within_rate_limit() {
            if let Some(current) = self.snapshot() {
                metrics::record_refresh_skipped(T::DOMAIN.as_str());
                tracing::debug!(domain = %T::DOMAIN, "Refresh rate-limited, republishing last snapshot");
                self.bus.publish(T::wrap(Arc::clone(&current)));
                return Ok(current);
            }
        }

        let options = FetchOptions {
            ttl: Some(self.settings.cache_ttl),
            dedupe: true,
            skip_cache: true,
        };
        let items = self.cache.fetch(&self.cache_key, fetcher, options).await?;

        let _guard = self.publish_lock.lock().unwrap_or_else(PoisonError::into_inner);
        *self.last_fetch.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        let snapshot = Arc::new(Snapshot::fetched(items.as_ref().clone()));
        self.current.store(Some(Arc::clone(&snapshot)));
        self.bus.publish(T::wrap(Arc::clone(&snapshot)));
        tracing::debug!(domain = %T::DOMAIN, items = snapshot.len(), forced = force, "Snapshot refreshed");
        Ok(snapshot)
    }

    /// Recompute the current items locally and republish.
    ///
    /// When `recompute` yields items equal to the current ones the existing
    /// snapshot is republished as is. Returns `None` before the first fetch.
    pub fn republish_with<F>(&self, recompute: F) -> Option<Arc<Snapshot<T>>>
    where
        F: FnOnce(&Snapshot<T>) -> Vec<T>,
    {
        let _guard = self.publish_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current.load_full()?;
        let items = recompute(&current);

        let next = if items == current.items {
            current
        } else {
            let next = Arc::new(current.with_items(items));
            self.current.store(Some(Arc::clone(&next)));
            next
        };
        self.bus.publish(T::wrap(Arc::clone(&next)));
        Some(next)
    }
}

/// Run `tick` every `period` (first tick immediately) until `shutdown` fires.
///
/// A tick in progress is abandoned on shutdown. Ticks never overlap.
pub async fn run_periodic<F, Fut>(
    label: &'static str,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    tracing::info!(task = label, period_ms = period.as_millis() as u64, "Periodic task starting");
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            _ = tick() => {}
        }
    }
    tracing::info!(task = label, "Periodic task received shutdown signal, exiting loop");
}
