//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from a validated `SyncConfig`, in dependency order
//! - Hand back the composition root; starting background tasks is the caller's call
//!
//! # Design Decisions
//! - Fail fast on malformed addresses or URLs
//! - A chain ID mismatch is logged, not fatal, so read paths keep working

use alloy::primitives::Address;
use std::sync::Arc;
use thiserror::Error;

use crate::bus::DataBus;
use crate::config::SyncConfig;
use crate::domain::TokenInfo;
use crate::error::SyncError;
use crate::ledger::{IndexerClient, RpcLedger};
use crate::modal::ModalCoordinator;
use crate::services::{DataServiceRegistry, DataSources, RegistrySettings};
use crate::transaction::TransactionTracker;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid account owner '{0}'")]
    InvalidOwner(String),

    #[error("Invalid token configuration: {0}")]
    InvalidToken(String),

    #[error("Ledger client error: {0}")]
    Ledger(#[from] SyncError),
}

/// Everything the host application talks to.
pub struct SyncRuntime {
    pub config: SyncConfig,
    pub owner: Address,
    pub bus: Arc<DataBus>,
    pub ledger: Arc<RpcLedger>,
    pub registry: Arc<DataServiceRegistry>,
    pub modals: Arc<ModalCoordinator>,
    pub tracker: TransactionTracker,
}

/// Construct the sync layer. Background tasks are not started.
pub async fn bootstrap(config: SyncConfig) -> Result<SyncRuntime, StartupError> {
    let owner: Address = config
        .account
        .owner
        .parse()
        .map_err(|_| StartupError::InvalidOwner(config.account.owner.clone()))?;

    let tokens = config
        .account
        .tokens
        .iter()
        .map(TokenInfo::from_config)
        .collect::<Result<Vec<_>, _>>()
        .map_err(StartupError::InvalidToken)?;

    // 1. Ledger adapters
    let ledger = Arc::new(RpcLedger::new(&config.ledger, owner, tokens)?);
    if let Err(e) = ledger.verify_chain_id().await {
        tracing::warn!(error = %e, "Ledger chain verification failed");
    }
    let indexer = Arc::new(IndexerClient::new(&config.indexer, owner)?);

    // 2. Bus and services
    let bus = DataBus::new();
    let sources = DataSources {
        balances: ledger.clone(),
        transfers: indexer.clone(),
        streams: indexer,
    };
    let registry = Arc::new(DataServiceRegistry::new(
        sources,
        Arc::clone(&bus),
        RegistrySettings::from_config(&config),
    ));

    // 3. Write-side coordination
    let modals = Arc::new(ModalCoordinator::new());
    let tracker = TransactionTracker::new(ledger.clone(), Some(Arc::clone(&modals)));

    tracing::info!(owner = %owner, chain_id = config.ledger.chain_id, "Sync layer constructed");

    Ok(SyncRuntime {
        config,
        owner,
        bus,
        ledger,
        registry,
        modals,
        tracker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;

    fn config() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.account.owner = "0x00000000000000000000000000000000000000aa".to_string();
        config.account.tokens.push(TokenConfig {
            symbol: "ETH".to_string(),
            address: None,
            decimals: 18,
        });
        config.ledger.rpc_url = "http://127.0.0.1:1".to_string();
        config.ledger.rpc_timeout_secs = 1;
        config
    }

    #[tokio::test]
    async fn test_bootstrap_tolerates_unreachable_ledger() {
        let runtime = bootstrap(config()).await.unwrap();
        assert!(!runtime.registry.is_initialized());
        assert_eq!(runtime.ledger.tokens().len(), 1);
        assert!(!runtime.tracker.is_busy());
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_bad_owner() {
        let mut config = config();
        config.account.owner = "nobody".to_string();
        assert!(matches!(
            bootstrap(config).await,
            Err(StartupError::InvalidOwner(_))
        ));
    }
}
