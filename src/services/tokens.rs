//! Token balance service.

use std::sync::Arc;

use crate::bus::DataBus;
use crate::cache::FetchClient;
use crate::config::PollSettings;
use crate::domain::{Snapshot, TokenBalance};
use crate::error::SyncResult;
use crate::ledger::BalanceSource;
use crate::services::core::ServiceCore;

/// Keeps the account's token balances in sync. Items keep configured token order.
pub struct TokenService {
    core: ServiceCore<TokenBalance>,
    source: Arc<dyn BalanceSource>,
}

impl TokenService {
    pub fn new(
        source: Arc<dyn BalanceSource>,
        cache: FetchClient<Vec<TokenBalance>>,
        bus: Arc<DataBus>,
        settings: PollSettings,
    ) -> Self {
        Self {
            core: ServiceCore::new(cache, bus, settings),
            source,
        }
    }

    pub fn core(&self) -> &ServiceCore<TokenBalance> {
        &self.core
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot<TokenBalance>>> {
        self.core.snapshot()
    }

    async fn fetch(source: Arc<dyn BalanceSource>) -> SyncResult<Vec<TokenBalance>> {
        source.balances().await
    }

    pub async fn refresh(&self) -> SyncResult<Arc<Snapshot<TokenBalance>>> {
        let source = Arc::clone(&self.source);
        self.core.refresh_with(false, move || Self::fetch(source)).await
    }

    /// Refresh ignoring the rate limit and any cached value.
    pub async fn revalidate(&self) -> SyncResult<Arc<Snapshot<TokenBalance>>> {
        let source = Arc::clone(&self.source);
        self.core.refresh_with(true, move || Self::fetch(source)).await
    }

    pub(crate) async fn poll_tick(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(domain = "tokens", error = %e, "Poll tick failed, keeping last snapshot");
        }
    }
}
