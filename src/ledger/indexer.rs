//! HTTP indexer client for transfers and payment streams.
//!
//! One method per endpoint. Responses are decoded into wire types and
//! converted to domain types here, so services only see domain values.

use alloy::primitives::Address;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::IndexerConfig;
use crate::domain::{StreamRecord, TransferRecord};
use crate::error::{SyncError, SyncResult};
use crate::ledger::ports::{StreamSource, TransferSource};
use crate::ledger::wire::{StreamsResponse, TransfersResponse};

/// Read-only client for the account indexer.
#[derive(Debug, Clone)]
pub struct IndexerClient {
    base_url: String,
    client: Client,
    owner: Address,
}

impl IndexerClient {
    pub fn new(config: &IndexerConfig, owner: Address) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| SyncError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            owner,
        })
    }

    fn account_url(&self, resource: &str) -> String {
        format!(
            "{}/accounts/{}/{}",
            self.base_url,
            self.owner.to_string().to_lowercase(),
            resource
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> SyncResult<T> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();

        if status.is_success() {
            return Ok(resp.json::<T>().await?);
        }

        let body = resp.text().await.unwrap_or_default();
        tracing::warn!(url, status = status.as_u16(), "Indexer request failed");
        match status {
            StatusCode::NOT_FOUND => Err(SyncError::NotFound(format!("{url}: {body}"))),
            _ => Err(SyncError::Network(format!("HTTP {}: {}", status.as_u16(), body))),
        }
    }

    pub async fn fetch_transfers(&self) -> SyncResult<Vec<TransferRecord>> {
        let response: TransfersResponse = self.get_json(&self.account_url("transfers")).await?;
        response
            .transfers
            .into_iter()
            .map(|t| t.into_record(self.owner))
            .collect()
    }

    pub async fn fetch_streams(&self) -> SyncResult<Vec<StreamRecord>> {
        let response: StreamsResponse = self.get_json(&self.account_url("streams")).await?;
        response
            .streams
            .into_iter()
            .map(StreamRecord::try_from)
            .collect()
    }
}

impl TransferSource for IndexerClient {
    fn transfers(&self) -> BoxFuture<'_, SyncResult<Vec<TransferRecord>>> {
        self.fetch_transfers().boxed()
    }
}

impl StreamSource for IndexerClient {
    fn streams(&self) -> BoxFuture<'_, SyncResult<Vec<StreamRecord>>> {
        self.fetch_streams().boxed()
    }
}
