//! TTL entry storage.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// A cached payload.
#[derive(Debug)]
pub struct CacheEntry<V> {
    pub key: String,
    pub payload: Arc<V>,
    pub written_at: Instant,
    pub ttl: Duration,
    /// Write sequence; an entry is only replaced by a write with a higher one.
    pub seq: u64,
}

impl<V> CacheEntry<V> {
    /// Fresh while `now - written_at <= ttl`.
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.written_at) <= self.ttl
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.written_at)
    }
}

/// Concurrent key → entry map.
///
/// Entries only leave through [`CacheStore::invalidate`] or [`CacheStore::clear`];
/// expired entries stay readable through [`CacheStore::peek`].
pub struct CacheStore<V> {
    entries: DashMap<String, CacheEntry<V>>,
    default_ttl: Duration,
    seq: AtomicU64,
}

impl<V> CacheStore<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            seq: AtomicU64::new(0),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Reserve the next write sequence number.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Payload if present and fresh.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let entry = self.entries.get(key)?;
        entry
            .is_fresh(Instant::now())
            .then(|| Arc::clone(&entry.payload))
    }

    /// Payload regardless of freshness.
    pub fn peek(&self, key: &str) -> Option<Arc<V>> {
        self.entries.get(key).map(|e| Arc::clone(&e.payload))
    }

    /// Unconditional overwrite with the default TTL.
    pub fn set(&self, key: &str, payload: Arc<V>) {
        self.set_with_ttl(key, payload, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: &str, payload: Arc<V>, ttl: Duration) {
        let seq = self.next_seq();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                payload,
                written_at: Instant::now(),
                ttl,
                seq,
            },
        );
    }

    /// Write unless the stored entry came from a later write. Returns whether it was stored.
    pub fn write_if_newer(&self, key: &str, payload: Arc<V>, ttl: Duration, seq: u64) -> bool {
        let fresh = CacheEntry {
            key: key.to_string(),
            payload,
            written_at: Instant::now(),
            ttl,
            seq,
        };
        match self.entries.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut existing) => {
                if existing.get().seq > seq {
                    return false;
                }
                existing.insert(fresh);
                true
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(fresh);
                true
            }
        }
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
