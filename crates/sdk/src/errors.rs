use std::time::Duration;

use pm_types::MarketError;
use thiserror::Error;

use crate::client::TransactionId;

/// Errors surfaced by the SDK: core market errors plus everything that can
/// go wrong talking to the ledger.
#[derive(Error, Debug)]
pub enum SdkError {
    /// Pricing, pool, oracle or state machine error
    #[error(transparent)]
    Market(#[from] MarketError),

    /// The ledger client could not broadcast the transaction
    #[error("Broadcast failed: {0}")]
    BroadcastError(String),

    /// The ledger confirmed the transaction as invalid
    #[error("Transaction {txid} rejected by ledger: {reason}")]
    LedgerRejected { txid: TransactionId, reason: String },

    /// No confirmation within the configured timeout
    #[error("Transaction {txid} not confirmed after {elapsed:?}")]
    ConfirmationTimeout {
        txid: TransactionId,
        elapsed: Duration,
    },

    /// The caller stopped waiting for a confirmation
    #[error("Confirmation wait for {txid} cancelled")]
    Cancelled { txid: TransactionId },

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SdkError {
    /// Transient transport failures worth retrying as-is
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BroadcastError(_) | Self::RpcError(_))
    }

    /// The ledger itself refused the transaction
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::LedgerRejected { .. })
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type for SDK operations
pub type SdkResult<T> = std::result::Result<T, SdkError>;
