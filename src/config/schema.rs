//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the sync layer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    /// Account whose state is synchronized.
    pub account: AccountConfig,

    /// JSON-RPC ledger endpoint settings.
    pub ledger: LedgerConfig,

    /// HTTP indexer settings (transfers, streams).
    pub indexer: IndexerConfig,

    /// Token balance service.
    pub tokens: TokenPollConfig,

    /// Transfer history service.
    pub transfers: TransferPollConfig,

    /// Payment stream service.
    pub streams: StreamPollConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// The synchronized account and the tokens tracked for it.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AccountConfig {
    /// Owner address (0x-prefixed hex).
    pub owner: String,

    /// Tokens whose balances are polled.
    pub tokens: Vec<TokenConfig>,
}

/// A tracked token. Omitting `address` means the chain's native coin.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    pub symbol: String,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_decimals() -> u8 {
    18
}

/// Ledger (JSON-RPC) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Expected chain ID.
    pub chain_id: u64,

    /// Per-call RPC timeout in seconds (transport level).
    pub rpc_timeout_secs: u64,

    /// Delay between receipt polls while a write is confirming.
    pub receipt_poll_interval_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 1,
            rpc_timeout_secs: 10,
            receipt_poll_interval_ms: 2000,
        }
    }
}

/// Indexer (HTTP) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Base URL of the indexer API.
    pub base_url: String,

    /// Request timeout in seconds (transport level).
    pub request_timeout_secs: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000".to_string(),
            request_timeout_secs: 15,
        }
    }
}

/// Durations shared by every polling service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Background poll period.
    pub poll_interval: Duration,
    /// Minimum spacing between two network fetches. Refreshes inside this
    /// window republish the last snapshot instead of fetching.
    pub min_fetch_interval: Duration,
    /// Cache TTL for the service's key.
    pub cache_ttl: Duration,
}

/// Token balance service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenPollConfig {
    pub poll_interval_secs: u64,
    pub min_fetch_interval_secs: u64,
    pub cache_ttl_secs: u64,
}

impl TokenPollConfig {
    pub fn settings(&self) -> PollSettings {
        PollSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            min_fetch_interval: Duration::from_secs(self.min_fetch_interval_secs),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }
}

impl Default for TokenPollConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            min_fetch_interval_secs: 10,
            cache_ttl_secs: 10,
        }
    }
}

/// Transfer service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferPollConfig {
    pub poll_interval_secs: u64,
    pub min_fetch_interval_secs: u64,
    pub cache_ttl_secs: u64,

    /// Maximum number of transfers kept in a snapshot (newest first).
    pub max_items: usize,
}

impl TransferPollConfig {
    pub fn settings(&self) -> PollSettings {
        PollSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            min_fetch_interval: Duration::from_secs(self.min_fetch_interval_secs),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }
}

impl Default for TransferPollConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            min_fetch_interval_secs: 15,
            cache_ttl_secs: 15,
            max_items: 200,
        }
    }
}

/// Stream service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamPollConfig {
    pub poll_interval_secs: u64,
    pub min_fetch_interval_secs: u64,
    pub cache_ttl_secs: u64,

    /// Period of the local interpolation timer in seconds.
    pub interpolation_interval_secs: u64,
}

impl StreamPollConfig {
    pub fn settings(&self) -> PollSettings {
        PollSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            min_fetch_interval: Duration::from_secs(self.min_fetch_interval_secs),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }

    pub fn interpolation_interval(&self) -> Duration {
        Duration::from_secs(self.interpolation_interval_secs)
    }
}

impl Default for StreamPollConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 120,
            min_fetch_interval_secs: 30,
            cache_ttl_secs: 30,
            interpolation_interval_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format: "compact" or "pretty".
    pub log_format: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "compact".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
