//! Transfer history.

use alloy::primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};

/// Direction of a transfer relative to the synchronized account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    Incoming,
    Outgoing,
    SelfTransfer,
}

/// A completed token transfer touching the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: String,
    pub tx_hash: TxHash,
    pub token: Option<Address>,
    pub from: Address,
    pub to: Address,
    pub amount: U256,
    /// Block timestamp (unix seconds).
    pub timestamp: u64,
    pub direction: TransferDirection,
}

impl TransferRecord {
    /// Direction of a transfer as seen by `owner`.
    pub fn direction_for(owner: Address, from: Address, to: Address) -> TransferDirection {
        match (from == owner, to == owner) {
            (true, true) => TransferDirection::SelfTransfer,
            (true, false) => TransferDirection::Outgoing,
            _ => TransferDirection::Incoming,
        }
    }
}

/// Sort newest first (ties broken by id for a stable order) and keep `max_items`.
pub fn newest_first(mut records: Vec<TransferRecord>, max_items: usize) -> Vec<TransferRecord> {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
    records.truncate(max_items);
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, timestamp: u64) -> TransferRecord {
        TransferRecord {
            id: id.to_string(),
            tx_hash: TxHash::ZERO,
            token: None,
            from: Address::ZERO,
            to: Address::repeat_byte(1),
            amount: U256::from(1),
            timestamp,
            direction: TransferDirection::Outgoing,
        }
    }

    #[test]
    fn test_direction() {
        let me = Address::repeat_byte(0xaa);
        let other = Address::repeat_byte(0xbb);
        assert_eq!(TransferRecord::direction_for(me, me, other), TransferDirection::Outgoing);
        assert_eq!(TransferRecord::direction_for(me, other, me), TransferDirection::Incoming);
        assert_eq!(TransferRecord::direction_for(me, me, me), TransferDirection::SelfTransfer);
    }

    #[test]
    fn test_newest_first_caps() {
        let records = vec![record("a", 10), record("b", 30), record("c", 20), record("d", 30)];
        let sorted = newest_first(records, 3);
        let ids: Vec<_> = sorted.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["b", "d", "c"]);
    }
}
