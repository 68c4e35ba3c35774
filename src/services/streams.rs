//! Payment stream service.
//!
//! Besides the authoritative poll, a faster local tick re-derives the
//! streamed amount of every active stream from the wall clock and
//! republishes without touching the network. The next fetch overwrites
//! the interpolated values.

use std::sync::Arc;
use std::time::Duration;

use crate::bus::DataBus;
use crate::cache::FetchClient;
use crate::config::PollSettings;
use crate::domain::{unix_now, Snapshot, StreamRecord};
use crate::error::SyncResult;
use crate::ledger::StreamSource;
use crate::services::core::ServiceCore;

pub struct StreamService {
    core: ServiceCore<StreamRecord>,
    source: Arc<dyn StreamSource>,
    interpolation_interval: Duration,
}

impl StreamService {
    pub fn new(
        source: Arc<dyn StreamSource>,
        cache: FetchClient<Vec<StreamRecord>>,
        bus: Arc<DataBus>,
        settings: PollSettings,
        interpolation_interval: Duration,
    ) -> Self {
        Self {
            core: ServiceCore::new(cache, bus, settings),
            source,
            interpolation_interval,
        }
    }

    pub fn core(&self) -> &ServiceCore<StreamRecord> {
        &self.core
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot<StreamRecord>>> {
        self.core.snapshot()
    }

    pub fn interpolation_interval(&self) -> Duration {
        self.interpolation_interval
    }

    async fn fetch(source: Arc<dyn StreamSource>) -> SyncResult<Vec<StreamRecord>> {
        let mut records = source.streams().await?;
        records.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    pub async fn refresh(&self) -> SyncResult<Arc<Snapshot<StreamRecord>>> {
        let source = Arc::clone(&self.source);
        self.core.refresh_with(false, move || Self::fetch(source)).await
    }

    pub async fn revalidate(&self) -> SyncResult<Arc<Snapshot<StreamRecord>>> {
        let source = Arc::clone(&self.source);
        self.core.refresh_with(true, move || Self::fetch(source)).await
    }

    /// Interpolate active streams at `now` (unix seconds) and republish.
    ///
    /// Returns `None` until the first successful fetch.
    pub fn interpolate_at(&self, now: u64) -> Option<Arc<Snapshot<StreamRecord>>> {
        self.core.republish_with(|current| {
            current
                .items
                .iter()
                .map(|stream| stream.interpolated_at(now))
                .collect()
        })
    }

    pub(crate) async fn poll_tick(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(domain = "streams", error = %e, "Poll tick failed, keeping last snapshot");
        }
    }

    pub(crate) fn interpolation_tick(&self) {
        if self.interpolate_at(unix_now()).is_none() {
            tracing::trace!("No stream snapshot yet, skipping interpolation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StreamState;
    use crate::error::SyncError;
    use alloy::primitives::{Address, U256};
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    struct FixedStreams(Vec<StreamRecord>);

    impl StreamSource for FixedStreams {
        fn streams(&self) -> BoxFuture<'_, SyncResult<Vec<StreamRecord>>> {
            let records = self.0.clone();
            async move { Ok::<_, SyncError>(records) }.boxed()
        }
    }

    fn stream(id: &str, start: u64, end: u64, state: StreamState) -> StreamRecord {
        StreamRecord {
            id: id.into(),
            sender: Address::repeat_byte(1),
            recipient: Address::repeat_byte(2),
            token: None,
            total_amount: U256::from(1_000u64),
            withdrawn_amount: U256::ZERO,
            streamed_amount: U256::ZERO,
            start_time: start,
            end_time: end,
            state,
        }
    }

    fn service(records: Vec<StreamRecord>) -> StreamService {
        StreamService::new(
            Arc::new(FixedStreams(records)),
            FetchClient::new(Duration::from_secs(30)),
            DataBus::new(),
            PollSettings {
                poll_interval: Duration::from_secs(120),
                min_fetch_interval: Duration::from_secs(30),
                cache_ttl: Duration::from_secs(30),
            },
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_fetch_sorts_by_start_time() {
        let svc = service(vec![
            stream("late", 500, 900, StreamState::Active),
            stream("early", 100, 900, StreamState::Active),
        ]);
        let snapshot = svc.refresh().await.unwrap();
        let ids: Vec<_> = snapshot.items.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["early", "late"]);
    }

    #[tokio::test]
    async fn test_interpolation_is_monotonic_and_local() {
        let svc = service(vec![
            stream("a", 1_000, 2_000, StreamState::Active),
            stream("p", 1_000, 2_000, StreamState::Paused),
        ]);
        assert!(svc.interpolate_at(1_500).is_none());
        svc.refresh().await.unwrap();

        let mut previous = U256::ZERO;
        for now in [900, 1_000, 1_250, 1_500, 1_999, 2_000, 5_000] {
            let snapshot = svc.interpolate_at(now).unwrap();
            let active = &snapshot.items[0];
            assert!(active.streamed_amount >= previous);
            previous = active.streamed_amount;
            assert_eq!(snapshot.items[1].streamed_amount, U256::ZERO);
        }
        assert_eq!(previous, U256::from(1_000u64));
    }

    #[tokio::test]
    async fn test_unchanged_interpolation_reuses_snapshot() {
        let svc = service(vec![stream("done", 0, 10, StreamState::Completed)]);
        let fetched = svc.refresh().await.unwrap();
        let interpolated = svc.interpolate_at(1_000_000).unwrap();
        assert!(Arc::ptr_eq(&fetched, &interpolated));
    }

    /// Reports a single active stream whose streamed amount the test controls.
    #[derive(Default)]
    struct LiveStream {
        calls: AtomicUsize,
        streamed: AtomicU64,
    }

    impl StreamSource for LiveStream {
        fn streams(&self) -> BoxFuture<'_, SyncResult<Vec<StreamRecord>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut record = stream("a", 1_000, 2_000, StreamState::Active);
            record.streamed_amount = U256::from(self.streamed.load(Ordering::SeqCst));
            async move { Ok::<_, SyncError>(vec![record]) }.boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_items_never_roll_back_interpolation() {
        let source = Arc::new(LiveStream::default());
        let svc = StreamService::new(
            source.clone(),
            FetchClient::new(Duration::from_secs(60)),
            DataBus::new(),
            PollSettings {
                poll_interval: Duration::from_secs(120),
                min_fetch_interval: Duration::from_secs(30),
                cache_ttl: Duration::from_secs(60),
            },
            Duration::from_secs(5),
        );

        svc.refresh().await.unwrap();
        let interpolated = svc.interpolate_at(1_500).unwrap();
        assert_eq!(interpolated.items[0].streamed_amount, U256::from(500u64));

        source.streamed.store(600, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(31)).await;
        let refreshed = svc.refresh().await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(refreshed.items[0].streamed_amount, U256::from(600u64));
    }

    #[tokio::test]
    async fn test_fetch_overwrites_interpolated_values() {
        let svc = service(vec![stream("a", 1_000, 2_000, StreamState::Active)]);
        svc.refresh().await.unwrap();
        svc.interpolate_at(1_500).unwrap();
        assert_eq!(svc.snapshot().unwrap().items[0].streamed_amount, U256::from(500u64));

        let fetched = svc.revalidate().await.unwrap();
        assert_eq!(fetched.items[0].streamed_amount, U256::ZERO);
    }
}
