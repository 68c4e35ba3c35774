//! Client-side data synchronization for a ledger account.
//!
//! Keeps token balances, transfer history and payment streams fresh through a
//! TTL cache with request coalescing, fans snapshots out over an in-process
//! bus, and tracks a single in-flight ledger write at a time.

// Read side
pub mod cache;
pub mod domain;
pub mod ledger;
pub mod services;

// Distribution
pub mod bus;

// Write side
pub mod modal;
pub mod transaction;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use bus::DataBus;
pub use cache::FetchClient;
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult, WriteError};
pub use lifecycle::{Shutdown, SyncRuntime};
pub use modal::ModalCoordinator;
pub use services::DataServiceRegistry;
pub use transaction::{TransactionTracker, TxStatus};
