//! Publish/subscribe bus for domain snapshots.
//!
//! # Responsibilities
//! - Fan out each published snapshot to the subscribers of its domain
//! - Keep the latest snapshot per domain for late readers
//!
//! # Design Decisions
//! - Callbacks run synchronously on the publishing task, once per live subscriber
//! - The subscriber list is cloned out of the lock before invoking, so a
//!   callback may subscribe or unsubscribe without deadlocking
//! - A publish with no subscribers is not an error

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::domain::{DomainSnapshot, DomainType};
use crate::observability::metrics;

/// Subscriber callback.
pub type BusCallback = Arc<dyn Fn(&DomainSnapshot) + Send + Sync>;

/// Snapshot fan-out keyed by domain.
#[derive(Default)]
pub struct DataBus {
    subscribers: RwLock<HashMap<DomainType, Vec<(u64, BusCallback)>>>,
    latest: RwLock<HashMap<DomainType, DomainSnapshot>>,
    next_id: AtomicU64,
}

impl DataBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver `snapshot` to every subscriber of its domain. Returns the number notified.
    pub fn publish(&self, snapshot: DomainSnapshot) -> usize {
        let domain = snapshot.domain_type();

        self.latest
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(domain, snapshot.clone());

        let callbacks: Vec<BusCallback> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&domain)
            .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        for callback in &callbacks {
            callback(&snapshot);
        }

        metrics::record_snapshot_published(domain.as_str());
        tracing::trace!(
            domain = %domain,
            items = snapshot.len(),
            subscribers = callbacks.len(),
            "Snapshot published"
        );
        callbacks.len()
    }

    /// Register `callback` for `domain`. Dropping the handle unsubscribes.
    pub fn subscribe<F>(self: &Arc<Self>, domain: DomainType, callback: F) -> BusSubscription
    where
        F: Fn(&DomainSnapshot) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let count = {
            let mut subscribers = self
                .subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let list = subscribers.entry(domain).or_default();
            list.push((id, Arc::new(callback)));
            list.len()
        };
        metrics::record_bus_subscribers(domain.as_str(), count);
        tracing::debug!(domain = %domain, subscriber_id = id, "Bus subscriber added");

        BusSubscription {
            bus: Arc::downgrade(self),
            domain,
            id,
            active: true,
        }
    }

    fn remove(&self, domain: DomainType, id: u64) {
        let count = {
            let mut subscribers = self
                .subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            match subscribers.get_mut(&domain) {
                Some(list) => {
                    list.retain(|(sub_id, _)| *sub_id != id);
                    list.len()
                }
                None => return,
            }
        };
        metrics::record_bus_subscribers(domain.as_str(), count);
    }

    /// Last snapshot published for `domain`.
    pub fn latest(&self, domain: DomainType) -> Option<DomainSnapshot> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&domain)
            .cloned()
    }

    pub fn subscriber_count(&self, domain: DomainType) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&domain)
            .map_or(0, Vec::len)
    }
}

/// Handle returned by [`DataBus::subscribe`].
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct BusSubscription {
    bus: Weak<DataBus>,
    domain: DomainType,
    id: u64,
    active: bool,
}

impl BusSubscription {
    pub fn domain(&self) -> DomainType {
        self.domain
    }

    /// Stop receiving snapshots. Idempotent.
    pub fn unsubscribe(&mut self) {
        if !std::mem::replace(&mut self.active, false) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.domain, self.id);
            tracing::debug!(domain = %self.domain, subscriber_id = self.id, "Bus subscriber removed");
        }
    }
}

impl Drop for BusSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
