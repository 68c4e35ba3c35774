//! Indexer wire types and their conversion to domain types.
//!
//! Amounts travel as decimal strings so values above 2^53 survive JSON.

use alloy::primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::domain::{interpolate_streamed, unix_now, StreamRecord, StreamState, TransferRecord};
use crate::error::{SyncError, SyncResult};

/// `GET /accounts/{owner}/transfers`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransfersResponse {
    pub transfers: Vec<TransferWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferWire {
    pub id: String,
    pub tx_hash: String,
    #[serde(default)]
    pub token: Option<String>,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub timestamp: u64,
}

/// `GET /accounts/{owner}/streams`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamsResponse {
    pub streams: Vec<StreamWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamWire {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    #[serde(default)]
    pub token: Option<String>,
    pub total_amount: String,
    #[serde(default)]
    pub withdrawn_amount: Option<String>,
    #[serde(default)]
    pub streamed_amount: Option<String>,
    pub start_time: u64,
    pub end_time: u64,
    pub status: String,
}

fn parse_address(field: &str, value: &str) -> SyncResult<Address> {
    value
        .parse()
        .map_err(|e| SyncError::Decode(format!("{field}: invalid address '{value}': {e}")))
}

fn parse_amount(field: &str, value: &str) -> SyncResult<U256> {
    value
        .parse()
        .map_err(|e| SyncError::Decode(format!("{field}: invalid amount '{value}': {e}")))
}

fn parse_state(value: &str) -> SyncResult<StreamState> {
    match value.to_ascii_lowercase().as_str() {
        "pending" | "scheduled" => Ok(StreamState::Pending),
        "active" | "streaming" => Ok(StreamState::Active),
        "paused" => Ok(StreamState::Paused),
        "completed" | "depleted" => Ok(StreamState::Completed),
        "cancelled" | "canceled" => Ok(StreamState::Cancelled),
        other => Err(SyncError::Decode(format!("status: unknown stream status '{other}'"))),
    }
}

impl TransferWire {
    /// Convert, deriving the direction relative to `owner`.
    pub fn into_record(self, owner: Address) -> SyncResult<TransferRecord> {
        let from = parse_address("from", &self.from)?;
        let to = parse_address("to", &self.to)?;
        let tx_hash: TxHash = self
            .tx_hash
            .parse()
            .map_err(|e| SyncError::Decode(format!("tx_hash: invalid '{}': {e}", self.tx_hash)))?;
        let token = self
            .token
            .as_deref()
            .map(|t| parse_address("token", t))
            .transpose()?;

        Ok(TransferRecord {
            id: self.id,
            tx_hash,
            token,
            from,
            to,
            amount: parse_amount("amount", &self.amount)?,
            timestamp: self.timestamp,
            direction: TransferRecord::direction_for(owner, from, to),
        })
    }
}

impl TryFrom<StreamWire> for StreamRecord {
    type Error = SyncError;

    fn try_from(wire: StreamWire) -> SyncResult<Self> {
        if wire.end_time < wire.start_time {
            return Err(SyncError::Decode(format!(
                "stream {}: end_time before start_time",
                wire.id
            )));
        }
        let state = parse_state(&wire.status)?;
        let total_amount = parse_amount("total_amount", &wire.total_amount)?;
        let withdrawn_amount = wire
            .withdrawn_amount
            .as_deref()
            .map(|v| parse_amount("withdrawn_amount", v))
            .transpose()?
            .unwrap_or_default();

        // Indexers that omit the streamed amount get it derived from the schedule.
        let streamed_amount = match wire.streamed_amount.as_deref() {
            Some(v) => parse_amount("streamed_amount", v)?,
            None => match state {
                StreamState::Active => {
                    interpolate_streamed(total_amount, wire.start_time, wire.end_time, unix_now())
                }
                StreamState::Completed => total_amount,
                _ => withdrawn_amount,
            },
        };

        Ok(StreamRecord {
            id: wire.id,
            sender: parse_address("sender", &wire.sender)?,
            recipient: parse_address("recipient", &wire.recipient)?,
            token: wire
                .token
                .as_deref()
                .map(|t| parse_address("token", t))
                .transpose()?,
            total_amount,
            withdrawn_amount,
            streamed_amount,
            start_time: wire.start_time,
            end_time: wire.end_time,
            state,
        })
    }
}
