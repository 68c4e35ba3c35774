//! JSON-RPC ledger adapter with failover.
//!
//! # Responsibilities
//! - Query native and ERC-20 balances for the account
//! - Poll transaction receipts until the ledger reports an outcome
//! - Try each configured endpoint in order, each call bounded by the RPC timeout

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::config::LedgerConfig;
use crate::domain::{TokenBalance, TokenInfo};
use crate::error::{SyncError, SyncResult};
use crate::ledger::ports::{BalanceSource, ReceiptOutcome, ReceiptSource};

alloy::sol! {
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }
}

type DynProvider = Arc<dyn Provider + Send + Sync>;

/// Ledger reads over JSON-RPC.
#[derive(Clone)]
pub struct RpcLedger {
    /// Primary first, then failovers.
    providers: Vec<DynProvider>,
    owner: Address,
    tokens: Vec<TokenInfo>,
    chain_id: u64,
    call_timeout: Duration,
    receipt_poll_interval: Duration,
}

impl RpcLedger {
    pub fn new(config: &LedgerConfig, owner: Address, tokens: Vec<TokenInfo>) -> SyncResult<Self> {
        let primary: url::Url = config.rpc_url.parse().map_err(|e| {
            SyncError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        let mut providers: Vec<DynProvider> =
            vec![Arc::new(ProviderBuilder::new().connect_http(primary)) as DynProvider];

        for raw in &config.failover_urls {
            match raw.parse::<url::Url>() {
                Ok(url) => providers
                    .push(Arc::new(ProviderBuilder::new().connect_http(url)) as DynProvider),
                Err(_) => tracing::warn!(url = %raw, "Ignoring invalid failover RPC URL"),
            }
        }

        tracing::info!(
            rpc_url = %config.rpc_url,
            failovers = providers.len() - 1,
            tokens = tokens.len(),
            "Ledger RPC client initialized"
        );

        Ok(Self {
            providers,
            owner,
            tokens,
            chain_id: config.chain_id,
            call_timeout: Duration::from_secs(config.rpc_timeout_secs),
            receipt_poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
        })
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn tokens(&self) -> &[TokenInfo] {
        &self.tokens
    }

    /// Run `call` against each provider until one answers.
    async fn with_failover<T, E, F, Fut>(&self, op: &'static str, call: F) -> SyncResult<T>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.call_timeout, call(Arc::clone(provider))).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, op, error = %e, "RPC error, trying next provider")
                }
                Err(_) => tracing::warn!(provider_idx = i, op, "RPC timeout, trying next provider"),
            }
        }
        Err(SyncError::Rpc(format!("All RPC providers failed: {op}")))
    }

    /// Check the connected chain against configuration. Mismatch is reported, not fatal.
    pub async fn verify_chain_id(&self) -> SyncResult<()> {
        let actual = self
            .with_failover("eth_chainId", |p| async move { p.get_chain_id().await })
            .await?;
        if actual != self.chain_id {
            return Err(SyncError::Rpc(format!(
                "Chain ID mismatch: expected {}, got {}",
                self.chain_id, actual
            )));
        }
        Ok(())
    }

    pub async fn native_balance(&self) -> SyncResult<U256> {
        let owner = self.owner;
        self.with_failover("eth_getBalance", |p| async move { p.get_balance(owner).await })
            .await
    }

    pub async fn erc20_balance(&self, token: Address) -> SyncResult<U256> {
        let input = IERC20::balanceOfCall { account: self.owner }.abi_encode();
        let output = self
            .with_failover("eth_call", |p| {
                let request = TransactionRequest::default()
                    .with_to(token)
                    .with_input(input.clone());
                async move { p.call(request).await }
            })
            .await?;
        decode_uint256(&output)
    }

    async fn balance_of(&self, token: &TokenInfo) -> SyncResult<TokenBalance> {
        let balance = match token.address {
            None => self.native_balance().await?,
            Some(address) => self.erc20_balance(address).await?,
        };
        Ok(TokenBalance::new(token, balance))
    }

    pub async fn fetch_balances(&self) -> SyncResult<Vec<TokenBalance>> {
        join_all(self.tokens.iter().map(|t| self.balance_of(t)))
            .await
            .into_iter()
            .collect()
    }

    /// Poll until the receipt appears. There is no overall deadline.
    pub async fn poll_receipt(&self, tx_hash: &str) -> SyncResult<ReceiptOutcome> {
        let hash: TxHash = tx_hash
            .parse()
            .map_err(|e| SyncError::Decode(format!("Invalid transaction hash '{tx_hash}': {e}")))?;

        let mut ticker = interval(self.receipt_poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let receipt = self
                .with_failover("eth_getTransactionReceipt", |p| async move {
                    p.get_transaction_receipt(hash).await
                })
                .await?;

            let Some(receipt) = receipt else {
                tracing::debug!(tx_hash = %hash, "Transaction pending");
                continue;
            };

            return Ok(if receipt.status() {
                ReceiptOutcome::Confirmed {
                    block_number: receipt.block_number,
                }
            } else {
                ReceiptOutcome::Reverted {
                    reason: "Transaction reverted".to_string(),
                }
            });
        }
    }
}

/// Decode a single ABI-encoded `uint256` return value.
fn decode_uint256(output: &[u8]) -> SyncResult<U256> {
    if output.len() < 32 {
        return Err(SyncError::Decode(format!(
            "Expected 32-byte uint256, got {} bytes",
            output.len()
        )));
    }
    U256::try_from_be_slice(&output[..32])
        .ok_or_else(|| SyncError::Decode("uint256 out of range".to_string()))
}

impl BalanceSource for RpcLedger {
    fn balances(&self) -> BoxFuture<'_, SyncResult<Vec<TokenBalance>>> {
        self.fetch_balances().boxed()
    }
}

impl ReceiptSource for RpcLedger {
    fn wait_for_receipt<'a>(&'a self, tx_hash: &'a str) -> BoxFuture<'a, SyncResult<ReceiptOutcome>> {
        self.poll_receipt(tx_hash).boxed()
    }
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("providers", &self.providers.len())
            .field("owner", &self.owner)
            .field("chain_id", &self.chain_id)
            .field("tokens", &self.tokens.len())
            .finish()
    }
}
