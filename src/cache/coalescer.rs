//! In-flight request registry.
//!
//! At most one fetch per key is registered at a time. Callers that arrive
//! while it runs receive a clone of the same [`Shared`] outcome, so the value
//! or the error is delivered identically to every waiter.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, Shared};
use std::sync::Arc;

use crate::error::SyncResult;

/// Outcome of one fetch, shareable between all waiters.
pub type SharedOutcome<V> = Shared<BoxFuture<'static, SyncResult<Arc<V>>>>;

struct InFlight<V> {
    seq: u64,
    outcome: SharedOutcome<V>,
}

/// Tracks which keys have a fetch running.
pub struct RequestCoalescer<V> {
    in_flight: DashMap<String, InFlight<V>>,
}

impl<V> RequestCoalescer<V>
where
    V: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
        }
    }

    /// Join the fetch registered for `key`, or register the one produced by `launch`.
    ///
    /// `launch` runs while the key's slot is locked, so two concurrent callers
    /// can never both launch. Returns the outcome and whether it was joined.
    pub fn join_or_launch<F>(&self, key: &str, launch: F) -> (SharedOutcome<V>, bool)
    where
        F: FnOnce() -> (u64, SharedOutcome<V>),
    {
        match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(existing) => (existing.get().outcome.clone(), true),
            Entry::Vacant(slot) => {
                let (seq, outcome) = launch();
                slot.insert(InFlight {
                    seq,
                    outcome: outcome.clone(),
                });
                (outcome, false)
            }
        }
    }

    /// Clear the slot for `key` if it still belongs to the fetch tagged `seq`.
    pub fn complete(&self, key: &str, seq: u64) {
        self.in_flight.remove_if(key, |_, f| f.seq == seq);
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

impl<V> Default for RequestCoalescer<V>
where
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;

    fn ready(value: u32) -> SharedOutcome<u32> {
        futures_util::future::ready(Ok(Arc::new(value))).boxed().shared()
    }

    #[tokio::test]
    async fn test_second_caller_joins() {
        let coalescer = RequestCoalescer::new();
        let (first, joined) = coalescer.join_or_launch("k", || (1, ready(7)));
        assert!(!joined);

        let (second, joined) = coalescer.join_or_launch("k", || panic!("must not launch twice"));
        assert!(joined);
        assert_eq!(*first.await.unwrap(), 7);
        assert_eq!(*second.await.unwrap(), 7);
    }

    #[test]
    fn test_complete_only_clears_matching_seq() {
        let coalescer = RequestCoalescer::new();
        let _outcome = coalescer.join_or_launch("k", || (2, ready(1)));

        coalescer.complete("k", 1);
        assert!(coalescer.is_in_flight("k"));

        coalescer.complete("k", 2);
        assert!(!coalescer.is_in_flight("k"));
        assert!(coalescer.is_empty());
    }
}
