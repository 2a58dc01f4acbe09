use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use num_bigint::BigUint;
use pm_math::ReservePool;
use pm_types::{Asset, ContractCreation, MarketResult, TransactionDescriptor};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::ConfirmationPolicy;
use crate::errors::{SdkError, SdkResult};

// ============================================================================
// Ledger Types
// ============================================================================

/// Ledger transaction id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(txid: &str) -> Self {
        Self(txid.to_string())
    }
}

impl From<String> for TransactionId {
    fn from(txid: String) -> Self {
        Self(txid)
    }
}

/// A message the ledger has accepted into a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedMessage {
    pub txid: TransactionId,
    /// `"<block>:<order>"` position of the transaction
    pub block_tx: String,
    /// The ledger's view of the message
    #[serde(default)]
    pub message: serde_json::Value,
}

impl ConfirmedMessage {
    /// Asset identifier of a contract created by this message
    pub fn location(&self) -> MarketResult<Asset> {
        Asset::from_block_tx(&self.block_tx)
    }
}

// ============================================================================
// Ledger Client
// ============================================================================

/// Port to the ledger. Implementations own UTXO selection, fee handling,
/// signing and broadcast; the SDK only hands them descriptors.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Broadcast a contract call
    async fn submit_transaction(&self, descriptor: &TransactionDescriptor)
        -> SdkResult<TransactionId>;

    /// Broadcast a contract creation
    async fn submit_contract_creation(&self, creation: &ContractCreation)
        -> SdkResult<TransactionId>;

    /// Single poll: `Ok(None)` until the transaction is in a block.
    /// Transactions the ledger marks invalid yield `SdkError::LedgerRejected`.
    async fn fetch_confirmation(&self, txid: &TransactionId) -> SdkResult<Option<ConfirmedMessage>>;

    /// Current reserves of an AMM contract
    async fn get_pool_state(&self, contract: &Asset) -> SdkResult<ReservePool>;

    /// Wallet balance of an asset
    async fn asset_balance(&self, asset: &Asset) -> SdkResult<BigUint>;
}

// ============================================================================
// Confirmation
// ============================================================================

/// Poll until `txid` confirms.
///
/// Transient client errors are logged and polled through. Ends early with
/// `ConfirmationTimeout` when the policy's timeout elapses, or `Cancelled`
/// when `cancel` completes first.
pub async fn await_confirmation<C, F>(
    client: &C,
    txid: &TransactionId,
    policy: &ConfirmationPolicy,
    cancel: F,
) -> SdkResult<ConfirmedMessage>
where
    C: LedgerClient + ?Sized,
    F: Future<Output = ()>,
{
    let started = Instant::now();

    let poll = async {
        let mut attempt = 0u32;
        loop {
            match client.fetch_confirmation(txid).await {
                Ok(Some(confirmed)) => {
                    debug!(%txid, block_tx = %confirmed.block_tx, attempt, "transaction confirmed");
                    return Ok(confirmed);
                }
                Ok(None) => debug!(%txid, attempt, "transaction not confirmed yet"),
                Err(e) if e.is_retryable() => {
                    warn!(%txid, attempt, error = %e, "confirmation poll failed, retrying")
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
            attempt = attempt.saturating_add(1);
        }
    };

    let deadline = async {
        match policy.timeout() {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = poll => result,
        _ = cancel => {
            warn!(%txid, "confirmation wait cancelled");
            Err(SdkError::Cancelled { txid: txid.clone() })
        }
        _ = deadline => {
            let elapsed = started.elapsed();
            warn!(%txid, ?elapsed, "confirmation timed out");
            Err(SdkError::ConfirmationTimeout { txid: txid.clone(), elapsed })
        }
    }
}

/// A cancellation future that never fires
pub fn never_cancel() -> impl Future<Output = ()> + Send {
    std::future::pending()
}
