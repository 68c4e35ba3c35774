//! Immutable snapshots published on the data bus.

use std::sync::Arc;

use serde::Serialize;

use super::{unix_now_ms, DomainType, StreamRecord, TokenBalance, TransferRecord};

/// The most recently known complete value for one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot<T> {
    pub domain: DomainType,
    pub items: Vec<T>,
    /// When the authoritative fetch behind these items completed (unix ms).
    pub fetched_at_ms: u64,
}

impl<T: SnapshotItem> Snapshot<T> {
    /// Snapshot of freshly fetched items.
    pub fn fetched(items: Vec<T>) -> Self {
        Self {
            domain: T::DOMAIN,
            items,
            fetched_at_ms: unix_now_ms(),
        }
    }

    /// Same fetch time, locally recomputed items.
    pub fn with_items(&self, items: Vec<T>) -> Self {
        Self {
            domain: self.domain,
            items,
            fetched_at_ms: self.fetched_at_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Item types that can travel on the bus.
pub trait SnapshotItem: Clone + PartialEq + Send + Sync + 'static {
    const DOMAIN: DomainType;

    fn wrap(snapshot: Arc<Snapshot<Self>>) -> DomainSnapshot;
}

impl SnapshotItem for TokenBalance {
    const DOMAIN: DomainType = DomainType::Tokens;

    fn wrap(snapshot: Arc<Snapshot<Self>>) -> DomainSnapshot {
        DomainSnapshot::Tokens(snapshot)
    }
}

impl SnapshotItem for TransferRecord {
    const DOMAIN: DomainType = DomainType::Transfers;

    fn wrap(snapshot: Arc<Snapshot<Self>>) -> DomainSnapshot {
        DomainSnapshot::Transfers(snapshot)
    }
}

impl SnapshotItem for StreamRecord {
    const DOMAIN: DomainType = DomainType::Streams;

    fn wrap(snapshot: Arc<Snapshot<Self>>) -> DomainSnapshot {
        DomainSnapshot::Streams(snapshot)
    }
}

/// A snapshot tagged with its domain. Cloning is cheap.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainSnapshot {
    Tokens(Arc<Snapshot<TokenBalance>>),
    Transfers(Arc<Snapshot<TransferRecord>>),
    Streams(Arc<Snapshot<StreamRecord>>),
}

impl DomainSnapshot {
    pub fn domain_type(&self) -> DomainType {
        match self {
            DomainSnapshot::Tokens(_) => DomainType::Tokens,
            DomainSnapshot::Transfers(_) => DomainType::Transfers,
            DomainSnapshot::Streams(_) => DomainType::Streams,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DomainSnapshot::Tokens(s) => s.len(),
            DomainSnapshot::Transfers(s) => s.len(),
            DomainSnapshot::Streams(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fetched_at_ms(&self) -> u64 {
        match self {
            DomainSnapshot::Tokens(s) => s.fetched_at_ms,
            DomainSnapshot::Transfers(s) => s.fetched_at_ms,
            DomainSnapshot::Streams(s) => s.fetched_at_ms,
        }
    }

    pub fn as_tokens(&self) -> Option<&Snapshot<TokenBalance>> {
        match self {
            DomainSnapshot::Tokens(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_transfers(&self) -> Option<&Snapshot<TransferRecord>> {
        match self {
            DomainSnapshot::Transfers(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_streams(&self) -> Option<&Snapshot<StreamRecord>> {
        match self {
            DomainSnapshot::Streams(s) => Some(&**s),
            _ => None,
        }
    }

    /// JSON rendering of the inner snapshot.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            DomainSnapshot::Tokens(s) => serde_json::to_value(s.as_ref()),
            DomainSnapshot::Transfers(s) => serde_json::to_value(s.as_ref()),
            DomainSnapshot::Streams(s) => serde_json::to_value(s.as_ref()),
        }
    }
}
