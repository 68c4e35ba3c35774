//! Ledger integration: ports and adapters.
//!
//! # Data Flow
//! ```text
//! services (tokens)     → BalanceSource  ← rpc.rs (JSON-RPC, failover)
//! services (transfers)  → TransferSource ← indexer.rs (HTTP, wire.rs → domain)
//! services (streams)    → StreamSource   ← indexer.rs
//! transaction tracker   → ReceiptSource  ← rpc.rs (receipt polling)
//! write flow            → LedgerWriter   ← host wallet (signing lives outside this crate)
//! ```
//!
//! # Design Decisions
//! - Ports return boxed futures so they can be held as `Arc<dyn ...>`
//! - Timeouts are configured on the transports, never above them

pub mod indexer;
pub mod ports;
pub mod rpc;
pub mod wire;

pub use indexer::IndexerClient;
pub use ports::{
    BalanceSource, LedgerWriter, ReceiptOutcome, ReceiptSource, StreamSource, TransferSource,
    WriteRequest,
};
pub use rpc::RpcLedger;
