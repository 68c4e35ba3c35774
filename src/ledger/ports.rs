//! Narrow interfaces the sync layer consumes.

use alloy::primitives::{Address, Bytes, U256};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::domain::{StreamRecord, TokenBalance, TransferRecord};
use crate::error::{SyncResult, WriteError};

/// Balances of the tracked tokens, in configured order.
pub trait BalanceSource: Send + Sync {
    fn balances(&self) -> BoxFuture<'_, SyncResult<Vec<TokenBalance>>>;
}

/// Transfers touching the account.
pub trait TransferSource: Send + Sync {
    fn transfers(&self) -> BoxFuture<'_, SyncResult<Vec<TransferRecord>>>;
}

/// Payment streams involving the account.
pub trait StreamSource: Send + Sync {
    fn streams(&self) -> BoxFuture<'_, SyncResult<Vec<StreamRecord>>>;
}

/// How a dispatched write settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptOutcome {
    Confirmed { block_number: Option<u64> },
    Reverted { reason: String },
}

/// Waits until the ledger reports a receipt for a transaction hash.
pub trait ReceiptSource: Send + Sync {
    fn wait_for_receipt<'a>(&'a self, tx_hash: &'a str) -> BoxFuture<'a, SyncResult<ReceiptOutcome>>;
}

/// A ledger write as handed to the signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    /// Human-readable label for logs ("withdraw stream 12").
    pub label: String,
    pub to: Address,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
}

/// Simulates and submits writes on behalf of the user's wallet.
pub trait LedgerWriter: Send + Sync {
    /// Dry-run; an error means the write would fail and nothing is dispatched.
    fn simulate<'a>(&'a self, request: &'a WriteRequest) -> BoxFuture<'a, Result<(), WriteError>>;

    /// Sign and dispatch; returns the transaction hash.
    fn submit<'a>(&'a self, request: &'a WriteRequest) -> BoxFuture<'a, Result<String, WriteError>>;
}
