//! Focus and connectivity edge detection.
//!
//! Hosts report raw observations ("window focused", "network online") as
//! often as they like; only a rising edge produces a revalidation trigger.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Why subscribed data is being revalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevalidateTrigger {
    FocusGained,
    Reconnected,
}

impl fmt::Display for RevalidateTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevalidateTrigger::FocusGained => f.write_str("focus"),
            RevalidateTrigger::Reconnected => f.write_str("reconnect"),
        }
    }
}

/// Last observed focus and connectivity. Starts focused and online.
#[derive(Debug)]
pub struct ConnectivityEdges {
    focused: AtomicBool,
    online: AtomicBool,
}

impl ConnectivityEdges {
    pub fn new() -> Self {
        Self {
            focused: AtomicBool::new(true),
            online: AtomicBool::new(true),
        }
    }

    /// Record a focus observation; returns a trigger on unfocused → focused.
    pub fn observe_focus(&self, focused: bool) -> Option<RevalidateTrigger> {
        let was = self.focused.swap(focused, Ordering::AcqRel);
        (focused && !was).then_some(RevalidateTrigger::FocusGained)
    }

    /// Record a connectivity observation; returns a trigger on offline → online.
    pub fn observe_online(&self, online: bool) -> Option<RevalidateTrigger> {
        let was = self.online.swap(online, Ordering::AcqRel);
        (online && !was).then_some(RevalidateTrigger::Reconnected)
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}

impl Default for ConnectivityEdges {
    fn default() -> Self {
        Self::new()
    }
}
