//! Keyed TTL cache with request coalescing.
//!
//! # Data Flow
//! ```text
//! FetchClient::fetch(key, fetcher)
//!     → store.rs (fresh hit? return)
//!     → coalescer.rs (fetch in flight for key? join it)
//!     → spawn fetcher → write store if not superseded → notify key watchers
//! ```
//!
//! # Design Decisions
//! - Each fetch runs on its own task; dropping a caller never cancels it
//! - Every write carries a sequence number; older results never overwrite newer ones
//! - No timeout here, transports own their timeouts

pub mod client;
pub mod coalescer;
pub mod revalidate;
pub mod store;

pub use client::{FetchClient, FetchOptions, Fetcher, KeySubscription};
pub use coalescer::RequestCoalescer;
pub use revalidate::{ConnectivityEdges, RevalidateTrigger};
pub use store::{CacheEntry, CacheStore};
