//! Lifecycle of a single ledger write.
//!
//! # Data Flow
//! ```text
//! flow.rs:    simulate → submit → set_hash → wait settled → refresh all domains
//! tracker.rs: idle → preparing → simulating → confirming → confirmed | failed
//! ```

pub mod flow;
pub mod tracker;

pub use flow::WriteFlow;
pub use tracker::{TransactionProgress, TransactionTracker, TxStatus};
