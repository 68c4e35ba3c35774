//! Domain models (vertical slices): tokens, transfers, streams, snapshots.
//!
//! # Data Flow
//! ```text
//! ledger adapters (wire types)
//!     → domain items (TokenBalance, TransferRecord, StreamRecord)
//!     → Snapshot<T> (immutable, Arc-shared)
//!     → DomainSnapshot (tagged by DomainType, published on the bus)
//! ```

pub mod snapshot;
pub mod streams;
pub mod tokens;
pub mod transfers;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

pub use snapshot::{DomainSnapshot, Snapshot, SnapshotItem};
pub use streams::{interpolate_streamed, StreamRecord, StreamState};
pub use tokens::{TokenBalance, TokenInfo};
pub use transfers::{TransferDirection, TransferRecord};

/// The categories of remote-derived data kept in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainType {
    Tokens,
    Transfers,
    Streams,
}

impl DomainType {
    /// Every domain, in refresh order.
    pub const ALL: [DomainType; 3] = [DomainType::Tokens, DomainType::Transfers, DomainType::Streams];

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainType::Tokens => "tokens",
            DomainType::Transfers => "transfers",
            DomainType::Streams => "streams",
        }
    }
}

impl fmt::Display for DomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tokens" | "balances" => Ok(DomainType::Tokens),
            "transfers" => Ok(DomainType::Transfers),
            "streams" => Ok(DomainType::Streams),
            other => Err(format!("unknown domain '{other}'")),
        }
    }
}

/// Current wall-clock time in seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
