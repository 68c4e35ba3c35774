//! Composition of the domain services.
//!
//! # Responsibilities
//! - Construct each domain service exactly once, each with its own cache
//! - Start the poll and interpolation tasks once, however often `initialize` is called
//! - Refresh every domain with failures isolated per domain
//! - Revalidate observed domains on focus/reconnect edges
//! - Stop and join every background task on shutdown
//!
//! # Design Decisions
//! - Dispatch is an exhaustive `match` over `DomainType`
//! - Each domain refreshes on its own task so a panic stays contained
//! - The registry is single-use: after `shutdown` it does not restart

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::bus::DataBus;
use crate::cache::{ConnectivityEdges, FetchClient, RevalidateTrigger};
use crate::config::{PollSettings, SyncConfig};
use crate::domain::{DomainSnapshot, DomainType, SnapshotItem, StreamRecord, TokenBalance, TransferRecord};
use crate::error::{SyncError, SyncResult};
use crate::ledger::{BalanceSource, StreamSource, TransferSource};
use crate::lifecycle::shutdown::Shutdown;
use crate::services::core::run_periodic;
use crate::services::{StreamService, TokenService, TransferService};

/// Upstream sources for every domain.
#[derive(Clone)]
pub struct DataSources {
    pub balances: Arc<dyn BalanceSource>,
    pub transfers: Arc<dyn TransferSource>,
    pub streams: Arc<dyn StreamSource>,
}

/// Timing for every service.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub tokens: PollSettings,
    pub transfers: PollSettings,
    pub max_transfers: usize,
    pub streams: PollSettings,
    pub interpolation_interval: Duration,
}

impl RegistrySettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            tokens: config.tokens.settings(),
            transfers: config.transfers.settings(),
            max_transfers: config.transfers.max_items,
            streams: config.streams.settings(),
            interpolation_interval: config.streams.interpolation_interval(),
        }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

/// Per-domain outcome of a refresh-all. `Ok` carries the item count.
#[derive(Debug)]
pub struct RefreshReport {
    pub results: Vec<(DomainType, SyncResult<usize>)>,
}

impl RefreshReport {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_ok())
    }

    pub fn failures(&self) -> Vec<(DomainType, &SyncError)> {
        self.results
            .iter()
            .filter_map(|(domain, r)| r.as_ref().err().map(|e| (*domain, e)))
            .collect()
    }

    pub fn succeeded(&self) -> Vec<DomainType> {
        self.results
            .iter()
            .filter(|(_, r)| r.is_ok())
            .map(|(domain, _)| *domain)
            .collect()
    }
}

/// Owns the domain services and their background tasks.
pub struct DataServiceRegistry {
    bus: Arc<DataBus>,
    tokens: Arc<TokenService>,
    transfers: Arc<TransferService>,
    streams: Arc<StreamService>,
    initialized: AtomicBool,
    shutdown: Shutdown,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    edges: ConnectivityEdges,
}

impl DataServiceRegistry {
    pub fn new(sources: DataSources, bus: Arc<DataBus>, settings: RegistrySettings) -> Self {
        let tokens = TokenService::new(
            sources.balances,
            FetchClient::new(settings.tokens.cache_ttl),
            Arc::clone(&bus),
            settings.tokens,
        );
        let transfers = TransferService::new(
            sources.transfers,
            FetchClient::new(settings.transfers.cache_ttl),
            Arc::clone(&bus),
            settings.transfers,
            settings.max_transfers,
        );
        let streams = StreamService::new(
            sources.streams,
            FetchClient::new(settings.streams.cache_ttl),
            Arc::clone(&bus),
            settings.streams,
            settings.interpolation_interval,
        );

        Self {
            bus,
            tokens: Arc::new(tokens),
            transfers: Arc::new(transfers),
            streams: Arc::new(streams),
            initialized: AtomicBool::new(false),
            shutdown: Shutdown::new(),
            tasks: Mutex::new(Vec::new()),
            edges: ConnectivityEdges::new(),
        }
    }

    pub fn bus(&self) -> &Arc<DataBus> {
        &self.bus
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    pub fn transfers(&self) -> &Arc<TransferService> {
        &self.transfers
    }

    pub fn streams(&self) -> &Arc<StreamService> {
        &self.streams
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Whether `shutdown` has been called. A shut-down registry stays stopped.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Start every background task. Later calls start nothing.
    ///
    /// Returns the registered domains, identical on every call. Must run
    /// inside a Tokio runtime.
    pub fn initialize(&self) -> Vec<DomainType> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Data services already initialized");
            return DomainType::ALL.to_vec();
        }

        // Checked under the task lock; `shutdown` triggers under the same lock,
        // so every task spawned here has subscribed before the signal is sent.
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if self.shutdown.is_triggered() {
            tracing::warn!("Data services already shut down, not starting tasks");
            return DomainType::ALL.to_vec();
        }

        let tokens = Arc::clone(&self.tokens);
        tasks.push(tokio::spawn(run_periodic(
            "tokens-poll",
            tokens.core().settings().poll_interval,
            self.shutdown.subscribe(),
            move || {
                let tokens = Arc::clone(&tokens);
                async move { tokens.poll_tick().await }
            },
        )));

        let transfers = Arc::clone(&self.transfers);
        tasks.push(tokio::spawn(run_periodic(
            "transfers-poll",
            transfers.core().settings().poll_interval,
            self.shutdown.subscribe(),
            move || {
                let transfers = Arc::clone(&transfers);
                async move { transfers.poll_tick().await }
            },
        )));

        let streams = Arc::clone(&self.streams);
        tasks.push(tokio::spawn(run_periodic(
            "streams-poll",
            streams.core().settings().poll_interval,
            self.shutdown.subscribe(),
            move || {
                let streams = Arc::clone(&streams);
                async move { streams.poll_tick().await }
            },
        )));

        let streams = Arc::clone(&self.streams);
        tasks.push(tokio::spawn(run_periodic(
            "streams-interpolation",
            streams.interpolation_interval(),
            self.shutdown.subscribe(),
            move || {
                streams.interpolation_tick();
                std::future::ready(())
            },
        )));

        tracing::info!(tasks = tasks.len(), "Data services initialized");
        DomainType::ALL.to_vec()
    }

    /// Background tasks still running.
    pub fn active_tasks(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|t| !t.is_finished())
            .count()
    }

    /// Current snapshot of `domain`, if one has been fetched.
    pub fn snapshot(&self, domain: DomainType) -> Option<DomainSnapshot> {
        match domain {
            DomainType::Tokens => self.tokens.snapshot().map(TokenBalance::wrap),
            DomainType::Transfers => self.transfers.snapshot().map(TransferRecord::wrap),
            DomainType::Streams => self.streams.snapshot().map(StreamRecord::wrap),
        }
    }

    /// Rate-limited refresh of one domain.
    pub async fn refresh(&self, domain: DomainType) -> SyncResult<DomainSnapshot> {
        match domain {
            DomainType::Tokens => self.tokens.refresh().await.map(TokenBalance::wrap),
            DomainType::Transfers => self.transfers.refresh().await.map(TransferRecord::wrap),
            DomainType::Streams => self.streams.refresh().await.map(StreamRecord::wrap),
        }
    }

    fn spawn_refresh(&self, domain: DomainType, force: bool) -> JoinHandle<SyncResult<usize>> {
        match domain {
            DomainType::Tokens => {
                let svc = Arc::clone(&self.tokens);
                tokio::spawn(async move {
                    let snapshot = if force { svc.revalidate().await } else { svc.refresh().await }?;
                    Ok::<_, SyncError>(snapshot.len())
                })
            }
            DomainType::Transfers => {
                let svc = Arc::clone(&self.transfers);
                tokio::spawn(async move {
                    let snapshot = if force { svc.revalidate().await } else { svc.refresh().await }?;
                    Ok::<_, SyncError>(snapshot.len())
                })
            }
            DomainType::Streams => {
                let svc = Arc::clone(&self.streams);
                tokio::spawn(async move {
                    let snapshot = if force { svc.revalidate().await } else { svc.refresh().await }?;
                    Ok::<_, SyncError>(snapshot.len())
                })
            }
        }
    }

    async fn refresh_domains(&self, domains: &[DomainType], force: bool) -> RefreshReport {
        let handles: Vec<_> = domains
            .iter()
            .map(|&domain| (domain, self.spawn_refresh(domain, force)))
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (domain, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(SyncError::Task(join_err.to_string())),
            };
            if let Err(e) = &outcome {
                tracing::warn!(domain = %domain, error = %e, "Domain refresh failed");
            }
            results.push((domain, outcome));
        }
        RefreshReport { results }
    }

    /// Refresh every domain; one domain's failure does not affect the others.
    pub async fn refresh_all(&self) -> RefreshReport {
        self.refresh_domains(&DomainType::ALL, false).await
    }

    /// Like [`refresh_all`](Self::refresh_all) but ignoring rate limits and caches.
    pub async fn force_refresh_all(&self) -> RefreshReport {
        self.refresh_domains(&DomainType::ALL, true).await
    }

    /// Force-refresh every domain someone is subscribed to, plus subscribed cache keys.
    ///
    /// Returns the number of domains and keys revalidated.
    pub async fn revalidate(&self, trigger: RevalidateTrigger) -> usize {
        let observed: Vec<DomainType> = DomainType::ALL
            .into_iter()
            .filter(|d| self.bus.subscriber_count(*d) > 0)
            .collect();

        tracing::info!(%trigger, domains = observed.len(), "Revalidating observed domains");
        let report = self.refresh_domains(&observed, true).await;

        let keys = self.tokens.core().cache().revalidate(trigger).await
            + self.transfers.core().cache().revalidate(trigger).await
            + self.streams.core().cache().revalidate(trigger).await;

        report.results.len() + keys
    }

    /// Report a focus observation; revalidates on a focus-gained edge.
    pub async fn on_focus_changed(&self, focused: bool) -> Option<usize> {
        let trigger = self.edges.observe_focus(focused)?;
        Some(self.revalidate(trigger).await)
    }

    /// Report a connectivity observation; revalidates on reconnect.
    pub async fn on_network_changed(&self, online: bool) -> Option<usize> {
        let trigger = self.edges.observe_online(online)?;
        Some(self.revalidate(trigger).await)
    }

    /// Stop every background task and wait for them to exit.
    pub async fn shutdown(&self) {
        let tasks: Vec<_> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            self.shutdown.trigger();
            std::mem::take(&mut *tasks)
        };
        let count = tasks.len();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }
        tracing::info!(tasks = count, "Data services stopped");
    }
}
