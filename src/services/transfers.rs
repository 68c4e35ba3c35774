//! Transfer history service.

use std::sync::Arc;

use crate::bus::DataBus;
use crate::cache::FetchClient;
use crate::config::PollSettings;
use crate::domain::transfers::newest_first;
use crate::domain::{Snapshot, TransferRecord};
use crate::error::SyncResult;
use crate::ledger::TransferSource;
use crate::services::core::ServiceCore;

/// Keeps recent transfers in sync, newest first, capped at `max_items`.
pub struct TransferService {
    core: ServiceCore<TransferRecord>,
    source: Arc<dyn TransferSource>,
    max_items: usize,
}

impl TransferService {
    pub fn new(
        source: Arc<dyn TransferSource>,
        cache: FetchClient<Vec<TransferRecord>>,
        bus: Arc<DataBus>,
        settings: PollSettings,
        max_items: usize,
    ) -> Self {
        Self {
            core: ServiceCore::new(cache, bus, settings),
            source,
            max_items,
        }
    }

    pub fn core(&self) -> &ServiceCore<TransferRecord> {
        &self.core
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot<TransferRecord>>> {
        self.core.snapshot()
    }

    async fn fetch(source: Arc<dyn TransferSource>, max_items: usize) -> SyncResult<Vec<TransferRecord>> {
        let records = source.transfers().await?;
        Ok(newest_first(records, max_items))
    }

    pub async fn refresh(&self) -> SyncResult<Arc<Snapshot<TransferRecord>>> {
        let source = Arc::clone(&self.source);
        let max_items = self.max_items;
        self.core
            .refresh_with(false, move || Self::fetch(source, max_items))
            .await
    }

    pub async fn revalidate(&self) -> SyncResult<Arc<Snapshot<TransferRecord>>> {
        let source = Arc::clone(&self.source);
        let max_items = self.max_items;
        self.core
            .refresh_with(true, move || Self::fetch(source, max_items))
            .await
    }

    pub(crate) async fn poll_tick(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(domain = "transfers", error = %e, "Poll tick failed, keeping last snapshot");
        }
    }
}
