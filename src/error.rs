//! Error types shared across the sync layer.
//!
//! # Taxonomy
//! - `SyncError`: read-side failures (fetch, decode, task). Cloneable so a
//!   single coalesced outcome can be handed to every waiter.
//! - `WriteError`: write-side failures surfaced by the transaction flow.

use thiserror::Error;

/// Errors produced while fetching remote state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// Transport-level failure (connection refused, HTTP error status, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// JSON-RPC failure after every provider was tried.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Payload could not be decoded into domain types.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The requested resource does not exist upstream.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The background fetch task panicked or was aborted.
    #[error("Fetch task failed: {0}")]
    Task(String),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::Decode(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

/// Result type for read-side operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that end a ledger write.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteError {
    /// Simulation rejected the write before anything was dispatched.
    #[error("Transaction simulation failed: {0}")]
    PreflightValidation(String),

    /// The write was dispatched but its receipt reports failure.
    #[error("Transaction failed on-chain: {0}")]
    Confirmation(String),

    /// The user declined to sign.
    #[error("Transaction was cancelled in your wallet")]
    UserCancelled,

    /// Another write is still pending.
    #[error("Another transaction is already in progress")]
    AlreadyPending,

    /// Submission failed in transport.
    #[error("Network error: {0}")]
    Network(String),
}

const USER_REJECTION_MARKERS: &[&str] = &[
    "user rejected",
    "user denied",
    "rejected by user",
    "request rejected",
    "cancelled by user",
    "code 4001",
];

impl WriteError {
    /// Classify a raw signer/transport message.
    ///
    /// Wallets report a declined signature in many wordings; all of them map
    /// to `UserCancelled`. Anything else is treated as a transport failure.
    pub fn classify(raw: &str) -> Self {
        let lowered = raw.to_ascii_lowercase();
        if USER_REJECTION_MARKERS.iter().any(|m| lowered.contains(m)) {
            WriteError::UserCancelled
        } else {
            WriteError::Network(raw.to_string())
        }
    }

    /// Whether the failure should be shown as non-fatal.
    pub fn is_user_cancellation(&self) -> bool {
        matches!(self, WriteError::UserCancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::Network("connection refused".into());
        assert_eq!(err.to_string(), "Network error: connection refused");

        let err = WriteError::PreflightValidation("insufficient funds".into());
        assert!(err.to_string().contains("insufficient funds"));
    }

    #[test]
    fn test_classify_user_rejection() {
        assert_eq!(
            WriteError::classify("MetaMask Tx Signature: User denied transaction signature."),
            WriteError::UserCancelled
        );
        assert_eq!(
            WriteError::classify("error code 4001: request rejected"),
            WriteError::UserCancelled
        );
        assert!(WriteError::classify("User Rejected the request").is_user_cancellation());
    }

    #[test]
    fn test_classify_other_failures() {
        let err = WriteError::classify("nonce too low");
        assert_eq!(err, WriteError::Network("nonce too low".into()));
        assert!(!err.is_user_cancellation());
    }
}
