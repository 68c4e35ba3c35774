//! Transaction state machine.
//!
//! # Responsibilities
//! - Hold the progress of the one in-flight write and expose it through a watch channel
//! - Wait for the receipt once a hash is known, on its own task
//! - Engage the modal safety net while a write is pending
//!
//! # Design Decisions
//! - Every `start` gets a fresh attempt id; receipt outcomes for any other
//!   attempt are discarded
//! - Terminal states never change on their own; only `start` or `reset` leave them
//! - `set_error` keeps the progress percentage of the step that failed

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{SyncResult, WriteError};
use crate::ledger::{ReceiptOutcome, ReceiptSource};
use crate::modal::ModalCoordinator;
use crate::observability::metrics;

/// Stage of the tracked write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    #[default]
    Idle,
    Preparing,
    Simulating,
    Confirming,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Idle => "idle",
            TxStatus::Preparing => "preparing",
            TxStatus::Simulating => "simulating",
            TxStatus::Confirming => "confirming",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed)
    }

    /// A write has started and not yet settled.
    pub fn is_pending(&self) -> bool {
        matches!(self, TxStatus::Preparing | TxStatus::Simulating | TxStatus::Confirming)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the tracked write.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TransactionProgress {
    pub status: TxStatus,
    pub hash: Option<String>,
    pub error: Option<String>,
    /// 0, 25 (simulating), 50 (confirming) or 100 (confirmed).
    pub progress_percent: u8,
    pub attempt: Option<Uuid>,
}

struct TrackerInner {
    state: watch::Sender<TransactionProgress>,
    receipts: Arc<dyn ReceiptSource>,
    modals: Option<Arc<ModalCoordinator>>,
    waiter: Mutex<Option<JoinHandle<()>>>,
    /// Serializes transitions that move the modal guard.
    transition: Mutex<()>,
}

impl TrackerInner {
    fn abort_waiter(&self) {
        if let Some(waiter) = self.waiter.lock().unwrap_or_else(PoisonError::into_inner).take() {
            waiter.abort();
        }
    }

    /// Apply a transition and re-derive the modal guard from the committed
    /// status, both under the transition lock.
    fn transition<R>(&self, apply: impl FnOnce(&watch::Sender<TransactionProgress>) -> R) -> R {
        let _lock = self.transition.lock().unwrap_or_else(PoisonError::into_inner);
        let result = apply(&self.state);
        if let Some(modals) = &self.modals {
            let pending = self.state.borrow().status.is_pending();
            modals.set_transaction_in_progress(pending);
        }
        result
    }

    fn settle(&self, attempt: Uuid, outcome: SyncResult<ReceiptOutcome>) {
        let mut settled = TxStatus::Confirming;
        let applied = self.transition(|state| {
            state.send_if_modified(|p| {
                if p.attempt != Some(attempt) || p.status != TxStatus::Confirming {
                    return false;
                }
                match &outcome {
                    Ok(ReceiptOutcome::Confirmed { .. }) => {
                        p.status = TxStatus::Confirmed;
                        p.progress_percent = 100;
                    }
                    Ok(ReceiptOutcome::Reverted { reason }) => {
                        p.status = TxStatus::Failed;
                        p.error = Some(WriteError::Confirmation(reason.clone()).to_string());
                    }
                    Err(e) => {
                        p.status = TxStatus::Failed;
                        p.error = Some(WriteError::Confirmation(e.to_string()).to_string());
                    }
                }
                settled = p.status;
                true
            })
        });

        if !applied {
            tracing::debug!(%attempt, "Discarding receipt for superseded attempt");
            return;
        }
        metrics::record_tx_transition(settled.as_str());
        match outcome {
            Ok(ReceiptOutcome::Confirmed { block_number }) => {
                tracing::info!(%attempt, ?block_number, "Transaction confirmed")
            }
            Ok(ReceiptOutcome::Reverted { reason }) => {
                tracing::warn!(%attempt, %reason, "Transaction reverted")
            }
            Err(e) => tracing::warn!(%attempt, error = %e, "Receipt wait failed"),
        }
    }
}

/// Tracks one ledger write at a time. Clones share state.
#[derive(Clone)]
pub struct TransactionTracker {
    inner: Arc<TrackerInner>,
}

impl TransactionTracker {
    pub fn new(receipts: Arc<dyn ReceiptSource>, modals: Option<Arc<ModalCoordinator>>) -> Self {
        let (state, _) = watch::channel(TransactionProgress::default());
        Self {
            inner: Arc::new(TrackerInner {
                state,
                receipts,
                modals,
                waiter: Mutex::new(None),
                transition: Mutex::new(()),
            }),
        }
    }

    /// Begin a new attempt from any state.
    pub fn start(&self) -> Uuid {
        let attempt = Uuid::new_v4();
        self.inner.abort_waiter();
        self.inner.transition(|state| {
            state.send_replace(TransactionProgress {
                status: TxStatus::Preparing,
                attempt: Some(attempt),
                ..TransactionProgress::default()
            })
        });
        metrics::record_tx_transition(TxStatus::Preparing.as_str());
        tracing::info!(%attempt, "Transaction started");
        attempt
    }

    /// Begin a new attempt unless one is already pending.
    pub fn try_start(&self) -> Option<Uuid> {
        let attempt = Uuid::new_v4();
        let started = self.inner.transition(|state| {
            state.send_if_modified(|p| {
                if p.status.is_pending() {
                    return false;
                }
                *p = TransactionProgress {
                    status: TxStatus::Preparing,
                    attempt: Some(attempt),
                    ..TransactionProgress::default()
                };
                true
            })
        });
        if !started {
            return None;
        }
        self.inner.abort_waiter();
        metrics::record_tx_transition(TxStatus::Preparing.as_str());
        tracing::info!(%attempt, "Transaction started");
        Some(attempt)
    }

    /// `preparing → simulating`. Returns false from any other state.
    pub fn mark_simulating(&self) -> bool {
        let moved = self.inner.state.send_if_modified(|p| {
            if p.status != TxStatus::Preparing {
                return false;
            }
            p.status = TxStatus::Simulating;
            p.progress_percent = 25;
            true
        });
        if moved {
            metrics::record_tx_transition(TxStatus::Simulating.as_str());
        }
        moved
    }

    /// Record the dispatched hash and start waiting for its receipt.
    ///
    /// Only accepted while preparing or simulating; returns whether it was.
    pub fn set_hash(&self, hash: &str) -> bool {
        let mut attempt = None;
        let accepted = self.inner.state.send_if_modified(|p| {
            if !matches!(p.status, TxStatus::Preparing | TxStatus::Simulating) {
                return false;
            }
            p.status = TxStatus::Confirming;
            p.hash = Some(hash.to_string());
            p.progress_percent = 50;
            attempt = p.attempt;
            true
        });
        let Some(attempt) = attempt.filter(|_| accepted) else {
            tracing::warn!(hash, "Ignoring transaction hash outside a pending attempt");
            return false;
        };

        metrics::record_tx_transition(TxStatus::Confirming.as_str());
        tracing::info!(%attempt, hash, "Transaction submitted, waiting for receipt");

        let inner = Arc::clone(&self.inner);
        let hash = hash.to_string();
        let waiter = tokio::spawn(async move {
            let outcome = inner.receipts.wait_for_receipt(&hash).await;
            inner.settle(attempt, outcome);
        });
        let previous = self
            .inner
            .waiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(waiter);
        if let Some(previous) = previous {
            previous.abort();
        }
        true
    }

    /// Move to `failed` from any state, recording `message`.
    pub fn set_error(&self, message: &str) {
        self.inner.abort_waiter();
        self.inner.transition(|state| {
            state.send_modify(|p| {
                p.status = TxStatus::Failed;
                p.error = Some(message.to_string());
            })
        });
        metrics::record_tx_transition(TxStatus::Failed.as_str());
        tracing::warn!(error = message, "Transaction failed");
    }

    /// Back to `idle` from any state.
    pub fn reset(&self) {
        self.inner.abort_waiter();
        self.inner.transition(|state| state.send_replace(TransactionProgress::default()));
        metrics::record_tx_transition(TxStatus::Idle.as_str());
    }

    pub fn progress(&self) -> TransactionProgress {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TransactionProgress> {
        self.inner.state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.state.borrow().status.is_pending()
    }

    /// Wait until nothing is pending and return the resulting progress.
    pub async fn wait_settled(&self) -> TransactionProgress {
        let mut rx = self.subscribe();
        let settled = rx.wait_for(|p| !p.status.is_pending()).await.map(|p| p.clone());
        settled.unwrap_or_else(|_| self.progress())
    }

    /// Wait until `attempt` settles or is superseded.
    pub async fn wait_for_attempt(&self, attempt: Uuid) -> TransactionProgress {
        let mut rx = self.subscribe();
        let settled = rx
            .wait_for(|p| p.attempt != Some(attempt) || !p.status.is_pending())
            .await
            .map(|p| p.clone());
        settled.unwrap_or_else(|_| self.progress())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use std::time::Duration;
    use std::collections::HashMap;
    use tokio::sync::oneshot;

    type ReceiptReply = oneshot::Sender<SyncResult<ReceiptOutcome>>;

    /// Receipt source that resolves when the test sends an outcome for a hash.
    #[derive(Default)]
    struct ScriptedReceipts {
        pending: Mutex<HashMap<String, oneshot::Receiver<SyncResult<ReceiptOutcome>>>>,
        requested: Mutex<Vec<String>>,
    }

    impl ScriptedReceipts {
        fn expect(&self, hash: &str) -> ReceiptReply {
            let (tx, rx) = oneshot::channel();
            self.pending.lock().unwrap().insert(hash.to_string(), rx);
            tx
        }
    }

    impl ReceiptSource for ScriptedReceipts {
        fn wait_for_receipt<'a>(&'a self, tx_hash: &'a str) -> BoxFuture<'a, SyncResult<ReceiptOutcome>> {
            self.requested.lock().unwrap().push(tx_hash.to_string());
            let rx = self.pending.lock().unwrap().remove(tx_hash);
            async move {
                match rx {
                    Some(rx) => rx
                        .await
                        .unwrap_or_else(|_| Err(SyncError::Network("receipt channel dropped".into()))),
                    None => Err(SyncError::NotFound(tx_hash.to_string())),
                }
            }
            .boxed()
        }
    }

    fn tracker() -> (TransactionTracker, Arc<ScriptedReceipts>, Arc<ModalCoordinator>) {
        let receipts = Arc::new(ScriptedReceipts::default());
        let modals = Arc::new(ModalCoordinator::new());
        let tracker = TransactionTracker::new(
            Arc::clone(&receipts) as Arc<dyn ReceiptSource>,
            Some(Arc::clone(&modals)),
        );
        (tracker, receipts, modals)
    }

    #[tokio::test]
    async fn test_successful_write_sequence() {
        let (tracker, receipts, modals) = tracker();
        let receipt = receipts.expect("0xabc");
        modals.open_modal("settings");

        tracker.start();
        assert_eq!(tracker.progress().status, TxStatus::Preparing);
        assert!(modals.is_transaction_in_progress());
        assert!(!modals.is_open("settings"));

        assert!(tracker.set_hash("0xabc"));
        let progress = tracker.progress();
        assert_eq!(progress.status, TxStatus::Confirming);
        assert_eq!(progress.hash.as_deref(), Some("0xabc"));
        assert_eq!(progress.progress_percent, 50);

        receipt
            .send(Ok(ReceiptOutcome::Confirmed { block_number: Some(7) }))
            .unwrap();
        let settled = tracker.wait_settled().await;
        assert_eq!(settled.status, TxStatus::Confirmed);
        assert_eq!(settled.progress_percent, 100);
        assert_eq!(settled.hash.as_deref(), Some("0xabc"));
        assert!(!modals.is_transaction_in_progress());
        assert_eq!(receipts.requested.lock().unwrap().as_slice(), ["0xabc"]);
    }

    #[tokio::test]
    async fn test_reverted_receipt_fails() {
        let (tracker, receipts, _) = tracker();
        let receipt = receipts.expect("0xdead");
        tracker.start();
        assert!(tracker.mark_simulating());
        assert_eq!(tracker.progress().progress_percent, 25);
        tracker.set_hash("0xdead");

        receipt
            .send(Ok(ReceiptOutcome::Reverted {
                reason: "out of gas".into(),
            }))
            .unwrap();
        let settled = tracker.wait_settled().await;
        assert_eq!(settled.status, TxStatus::Failed);
        assert!(settled.error.unwrap().contains("out of gas"));
    }

    #[tokio::test]
    async fn test_receipt_error_fails() {
        let (tracker, receipts, _) = tracker();
        let receipt = receipts.expect("0x01");
        tracker.start();
        tracker.set_hash("0x01");
        receipt.send(Err(SyncError::Rpc("boom".into()))).unwrap();
        let settled = tracker.wait_settled().await;
        assert_eq!(settled.status, TxStatus::Failed);
        assert!(settled.error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_hash_rejected_outside_pending_attempt() {
        let (tracker, _, _) = tracker();
        assert!(!tracker.set_hash("0xabc"));
        assert_eq!(tracker.progress().status, TxStatus::Idle);

        tracker.start();
        tracker.set_error("simulation failed");
        assert!(!tracker.set_hash("0xabc"));
        assert_eq!(tracker.progress().status, TxStatus::Failed);
    }

    #[tokio::test]
    async fn test_superseded_receipt_is_discarded() {
        let (tracker, receipts, _) = tracker();
        let first_receipt = receipts.expect("0x01");
        let second_receipt = receipts.expect("0x02");

        tracker.start();
        tracker.set_hash("0x01");
        tokio::task::yield_now().await;

        let second = tracker.start();
        assert_eq!(tracker.progress().hash, None);
        tracker.set_hash("0x02");

        // The first waiter was aborted; its outcome has nowhere to go.
        let _ = first_receipt.send(Ok(ReceiptOutcome::Reverted { reason: "late".into() }));
        second_receipt
            .send(Ok(ReceiptOutcome::Confirmed { block_number: None }))
            .unwrap();

        let settled = tracker.wait_for_attempt(second).await;
        assert_eq!(settled.status, TxStatus::Confirmed);
        assert_eq!(settled.hash.as_deref(), Some("0x02"));
    }

    #[tokio::test]
    async fn test_set_error_and_reset() {
        let (tracker, _, modals) = tracker();
        tracker.start();
        tracker.mark_simulating();
        tracker.set_error("Transaction was cancelled in your wallet");

        let progress = tracker.progress();
        assert_eq!(progress.status, TxStatus::Failed);
        assert_eq!(progress.progress_percent, 25);
        assert!(!modals.is_transaction_in_progress());

        tracker.reset();
        assert_eq!(tracker.progress(), TransactionProgress::default());
        assert!(!tracker.is_busy());
    }

    #[tokio::test]
    async fn test_terminal_state_is_sticky() {
        let (tracker, receipts, _) = tracker();
        let receipt = receipts.expect("0xabc");
        tracker.start();
        tracker.set_hash("0xabc");
        tracker.set_error("user gave up");

        let _ = receipt.send(Ok(ReceiptOutcome::Confirmed { block_number: None }));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(tracker.progress().status, TxStatus::Failed);
        assert!(!tracker.mark_simulating());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_modal_guard_follows_state_when_settle_races_start() {
        let (tracker, receipts, modals) = tracker();
        let mut replies = Vec::new();

        for i in 0..200 {
            let hash = format!("0x{i:x}");
            replies.push(receipts.expect(&hash));
            let attempt = tracker.start();
            assert!(tracker.set_hash(&hash));

            std::thread::scope(|scope| {
                let inner = Arc::clone(&tracker.inner);
                scope.spawn(move || {
                    inner.settle(attempt, Ok(ReceiptOutcome::Confirmed { block_number: None }))
                });
                scope.spawn(|| {
                    tracker.start();
                });
            });

            assert!(tracker.is_busy());
            assert!(modals.is_transaction_in_progress(), "iteration {i}");
        }
    }

    #[tokio::test]
    async fn test_try_start_refuses_while_pending() {
        let (tracker, _, _) = tracker();
        assert!(tracker.try_start().is_some());
        assert!(tracker.is_busy());
        assert!(tracker.try_start().is_none());
        tracker.set_error("done");
        assert!(tracker.try_start().is_some());
    }
}
