//! Payment streams and vesting interpolation.
//!
//! A stream releases `total_amount` linearly between `start_time` and
//! `end_time`. Between authoritative fetches the streamed amount of active
//! streams is interpolated locally from the wall clock.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Lifecycle of a payment stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    Pending,
    Active,
    Paused,
    Completed,
    Cancelled,
}

/// A payment stream involving the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub id: String,
    pub sender: Address,
    pub recipient: Address,
    pub token: Option<Address>,
    pub total_amount: U256,
    pub withdrawn_amount: U256,
    /// Amount released so far; authoritative after a fetch, interpolated between fetches.
    pub streamed_amount: U256,
    /// Unix seconds.
    pub start_time: u64,
    /// Unix seconds.
    pub end_time: u64,
    pub state: StreamState,
}

impl StreamRecord {
    pub fn is_active(&self) -> bool {
        self.state == StreamState::Active
    }

    /// Amount the recipient can withdraw right now.
    pub fn claimable(&self) -> U256 {
        self.streamed_amount.saturating_sub(self.withdrawn_amount)
    }

    /// Copy with `streamed_amount` interpolated at `now`. Non-active streams are returned unchanged.
    pub fn interpolated_at(&self, now: u64) -> StreamRecord {
        if !self.is_active() {
            return self.clone();
        }
        StreamRecord {
            streamed_amount: interpolate_streamed(
                self.total_amount,
                self.start_time,
                self.end_time,
                now,
            ),
            ..self.clone()
        }
    }
}

/// `total × clamp((now − start) / (end − start), 0, 1)`, exact in integer arithmetic.
///
/// Returns 0 at or before `start` and `total` at or after `end`. The result is
/// non-decreasing in `now`. Uses `total = q·d + r` so that `total·elapsed / d =
/// q·elapsed + r·elapsed / d` never overflows.
pub fn interpolate_streamed(total: U256, start: u64, end: u64, now: u64) -> U256 {
    if now >= end {
        return total;
    }
    if now <= start {
        return U256::ZERO;
    }
    let duration = U256::from(end - start);
    let elapsed = U256::from(now - start);
    let quotient = total / duration;
    let remainder = total % duration;
    quotient * elapsed + remainder * elapsed / duration
}
