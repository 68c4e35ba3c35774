//! Dialog coordination.
//!
//! Tracks which dialogs are open and suppresses all of them while a ledger
//! write is in progress, so no dialog can obscure the signing prompt.
//!
//! Invariant: `transaction_in_progress` implies `open_ids` is empty.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;

/// Observable coordinator state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModalRegistryState {
    pub open_ids: BTreeSet<String>,
    pub transaction_in_progress: bool,
}

/// Registry of open dialogs.
pub struct ModalCoordinator {
    state: watch::Sender<ModalRegistryState>,
}

impl ModalCoordinator {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ModalRegistryState::default());
        Self { state }
    }

    /// Register `id` as open. Ignored while a transaction is in progress.
    pub fn open_modal(&self, id: &str) -> bool {
        self.state.send_if_modified(|s| {
            if s.transaction_in_progress {
                tracing::debug!(modal = id, "Modal open suppressed during transaction");
                return false;
            }
            s.open_ids.insert(id.to_string())
        })
    }

    pub fn close_modal(&self, id: &str) -> bool {
        self.state.send_if_modified(|s| s.open_ids.remove(id))
    }

    pub fn close_all_modals(&self) {
        self.state.send_if_modified(|s| {
            let had_any = !s.open_ids.is_empty();
            s.open_ids.clear();
            had_any
        });
    }

    /// Entering a transaction closes every dialog; leaving only lowers the flag.
    pub fn set_transaction_in_progress(&self, in_progress: bool) {
        self.state.send_if_modified(|s| {
            let closed = if in_progress && !s.open_ids.is_empty() {
                tracing::info!(closed = s.open_ids.len(), "Closing all modals for transaction");
                s.open_ids.clear();
                true
            } else {
                false
            };
            let flag_changed = s.transaction_in_progress != in_progress;
            s.transaction_in_progress = in_progress;
            closed || flag_changed
        });
    }

    pub fn is_transaction_in_progress(&self) -> bool {
        self.state.borrow().transaction_in_progress
    }

    pub fn is_open(&self, id: &str) -> bool {
        self.state.borrow().open_ids.contains(id)
    }

    /// Whether a dialog whose own flag is `local_open` may be shown.
    pub fn should_be_open(&self, id: &str, local_open: bool) -> bool {
        let state = self.state.borrow();
        local_open && state.open_ids.contains(id) && !state.transaction_in_progress
    }

    pub fn state(&self) -> ModalRegistryState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ModalRegistryState> {
        self.state.subscribe()
    }
}

impl Default for ModalCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// One dialog's local open flag bound to the coordinator. Closes on drop.
pub struct ModalSlot {
    id: String,
    coordinator: Arc<ModalCoordinator>,
    local_open: bool,
}

impl ModalSlot {
    pub fn new(id: impl Into<String>, coordinator: Arc<ModalCoordinator>) -> Self {
        Self {
            id: id.into(),
            coordinator,
            local_open: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn open(&mut self) {
        self.local_open = true;
        self.coordinator.open_modal(&self.id);
    }

    pub fn close(&mut self) {
        self.local_open = false;
        self.coordinator.close_modal(&self.id);
    }

    /// Whether the dialog should be rendered right now.
    pub fn is_visible(&self) -> bool {
        self.coordinator.should_be_open(&self.id, self.local_open)
    }
}

impl Drop for ModalSlot {
    fn drop(&mut self) {
        self.coordinator.close_modal(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_close() {
        let modals = ModalCoordinator::new();
        assert!(modals.open_modal("settings"));
        assert!(!modals.open_modal("settings"));
        assert!(modals.is_open("settings"));
        assert!(modals.close_modal("settings"));
        assert!(!modals.close_modal("settings"));
    }

    #[test]
    fn test_transaction_closes_and_blocks_modals() {
        let modals = ModalCoordinator::new();
        modals.open_modal("a");
        modals.open_modal("b");

        modals.set_transaction_in_progress(true);
        let state = modals.state();
        assert!(state.transaction_in_progress);
        assert!(state.open_ids.is_empty());

        assert!(!modals.open_modal("c"));
        assert!(modals.state().open_ids.is_empty());
        assert!(!modals.should_be_open("c", true));

        modals.set_transaction_in_progress(false);
        assert!(!modals.is_open("a"));
        assert!(modals.open_modal("c"));
        assert!(modals.should_be_open("c", true));
        assert!(!modals.should_be_open("c", false));
    }

    #[test]
    fn test_invariant_holds_under_any_sequence() {
        let modals = ModalCoordinator::new();
        let ops: [&dyn Fn(&ModalCoordinator); 6] = [
            &|m| {
                m.open_modal("x");
            },
            &|m| m.set_transaction_in_progress(true),
            &|m| {
                m.open_modal("y");
            },
            &|m| m.close_all_modals(),
            &|m| m.set_transaction_in_progress(false),
            &|m| {
                m.close_modal("x");
            },
        ];
        for round in 0..36usize {
            ops[round % 6](&modals);
            ops[(round * 5 + 1) % 6](&modals);
            let state = modals.state();
            assert!(!state.transaction_in_progress || state.open_ids.is_empty());
        }
    }

    #[test]
    fn test_subscribers_see_changes() {
        let modals = ModalCoordinator::new();
        let mut rx = modals.subscribe();
        modals.open_modal("a");
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().open_ids.contains("a"));

        modals.close_modal("missing");
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_slot_visibility_and_drop() {
        let modals = Arc::new(ModalCoordinator::new());
        let mut slot = ModalSlot::new("confirm", Arc::clone(&modals));
        assert!(!slot.is_visible());

        slot.open();
        assert!(slot.is_visible());

        modals.set_transaction_in_progress(true);
        assert!(!slot.is_visible());
        modals.set_transaction_in_progress(false);
        // Force-closed modals stay closed until reopened.
        assert!(!slot.is_visible());

        slot.open();
        assert!(slot.is_visible());
        drop(slot);
        assert!(!modals.is_open("confirm"));
    }
}
