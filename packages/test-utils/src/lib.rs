//! Test support: an in-memory ledger implementing `LedgerClient`, the
//! oracle signing fixture and market builders.

pub mod constants;
pub mod helpers;

pub use constants::*;
pub use helpers::*;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use num_bigint::BigUint;
use pm_math::{quote_swap, ReservePool};
use pm_sdk::{ConfirmedMessage, LedgerClient, SdkError, SdkResult, TransactionId};
use pm_types::{Asset, CallKind, ContractCreation, OracleCommitment, TransactionDescriptor};

/// What a pending transaction does once mined
#[derive(Debug, Clone)]
enum Submission {
    Call(TransactionDescriptor),
    Creation(ContractCreation),
}

#[derive(Debug)]
struct PendingTx {
    submission: Submission,
    remaining_polls: u32,
    /// Filled on the first poll after mining
    result: Option<Result<ConfirmedMessage, String>>,
}

#[derive(Debug)]
struct LedgerState {
    next_block: u64,
    next_txid: u64,
    confirmation_delay: u32,
    transactions: HashMap<TransactionId, PendingTx>,
    pools: BTreeMap<Asset, ReservePool>,
    mintable: BTreeMap<Asset, BigUint>,
    balances: BTreeMap<Asset, BigUint>,
    resolutions: BTreeMap<Asset, OracleCommitment>,
    submitted: Vec<TransactionDescriptor>,
    creations: Vec<ContractCreation>,
    broadcast_failures: u32,
    poll_failures: u32,
    reject_next: Option<String>,
    polls: u64,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            next_block: MOCK_START_BLOCK,
            next_txid: 1,
            confirmation_delay: 0,
            transactions: HashMap::new(),
            pools: BTreeMap::new(),
            mintable: BTreeMap::new(),
            balances: BTreeMap::new(),
            resolutions: BTreeMap::new(),
            submitted: Vec::new(),
            creations: Vec::new(),
            broadcast_failures: 0,
            poll_failures: 0,
            reject_next: None,
            polls: 0,
        }
    }
}

/// In-memory ledger. Transactions are mined after a configurable number of
/// polls and executed against mock contract state at that point, so pool
/// reads only change once a transaction confirms.
#[derive(Debug, Default)]
pub struct MockLedgerClient {
    state: Mutex<LedgerState>,
}

impl MockLedgerClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Number of `Ok(None)` polls before each transaction confirms
    pub fn set_confirmation_delay(&self, polls: u32) {
        self.lock().confirmation_delay = polls;
    }

    /// Never confirm anything submitted from now on
    pub fn stall(&self) {
        self.set_confirmation_delay(u32::MAX);
    }

    pub fn set_balance(&self, asset: Asset, amount: impl Into<BigUint>) {
        self.lock().balances.insert(asset, amount.into());
    }

    pub fn insert_pool(&self, contract: Asset, pool: ReservePool) {
        self.lock().pools.insert(contract, pool);
    }

    /// Fail the next `count` broadcasts with `BroadcastError`
    pub fn fail_next_broadcasts(&self, count: u32) {
        self.lock().broadcast_failures = count;
    }

    /// Fail the next `count` polls with `RpcError`
    pub fn fail_next_polls(&self, count: u32) {
        self.lock().poll_failures = count;
    }

    /// Mine the next submitted transaction as invalid
    pub fn reject_next(&self, reason: &str) {
        self.lock().reject_next = Some(reason.to_string());
    }

    /// Execute a contract call against the pool immediately, as another
    /// wallet's already-mined trade would
    pub fn apply_external(&self, descriptor: &TransactionDescriptor) -> Result<(), String> {
        let mut state = self.lock();
        execute_call(&mut state, descriptor)
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn balance(&self, asset: &Asset) -> BigUint {
        self.lock().balances.get(asset).cloned().unwrap_or_default()
    }

    pub fn pool(&self, contract: &Asset) -> Option<ReservePool> {
        self.lock().pools.get(contract).cloned()
    }

    pub fn resolution(&self, contract: &Asset) -> Option<OracleCommitment> {
        self.lock().resolutions.get(contract).cloned()
    }

    /// Every contract call accepted for broadcast, in order
    pub fn submitted(&self) -> Vec<TransactionDescriptor> {
        self.lock().submitted.clone()
    }

    pub fn creations(&self) -> Vec<ContractCreation> {
        self.lock().creations.clone()
    }

    pub fn poll_count(&self) -> u64 {
        self.lock().polls
    }

    fn broadcast(&self, submission: Submission) -> SdkResult<TransactionId> {
        let mut state = self.lock();
        if state.broadcast_failures > 0 {
            state.broadcast_failures -= 1;
            return Err(SdkError::BroadcastError("mock broadcast failure".to_string()));
        }
        match &submission {
            Submission::Call(descriptor) => state.submitted.push(descriptor.clone()),
            Submission::Creation(creation) => state.creations.push(creation.clone()),
        }

        let txid = TransactionId(format!("{:064x}", state.next_txid));
        state.next_txid += 1;
        let result = state.reject_next.take().map(Err);
        let remaining_polls = state.confirmation_delay;
        state.transactions.insert(
            txid.clone(),
            PendingTx {
                submission,
                remaining_polls,
                result,
            },
        );
        Ok(txid)
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn submit_transaction(
        &self,
        descriptor: &TransactionDescriptor,
    ) -> SdkResult<TransactionId> {
        self.broadcast(Submission::Call(descriptor.clone()))
    }

    async fn submit_contract_creation(
        &self,
        creation: &ContractCreation,
    ) -> SdkResult<TransactionId> {
        self.broadcast(Submission::Creation(creation.clone()))
    }

    async fn fetch_confirmation(&self, txid: &TransactionId) -> SdkResult<Option<ConfirmedMessage>> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.polls += 1;
        if state.poll_failures > 0 {
            state.poll_failures -= 1;
            return Err(SdkError::RpcError("mock poll failure".to_string()));
        }

        let mut pending = state
            .transactions
            .remove(txid)
            .ok_or_else(|| SdkError::LedgerRejected {
                txid: txid.clone(),
                reason: "unknown transaction".to_string(),
            })?;
        if pending.remaining_polls > 0 {
            pending.remaining_polls -= 1;
            state.transactions.insert(txid.clone(), pending);
            return Ok(None);
        }

        let result = match pending.result.clone() {
            Some(result) => result,
            None => {
                let block = state.next_block;
                state.next_block += 1;
                mine(state, &pending.submission, txid, block)
            }
        };
        pending.result = Some(result.clone());
        state.transactions.insert(txid.clone(), pending);
        result.map(Some).map_err(|reason| SdkError::LedgerRejected {
            txid: txid.clone(),
            reason,
        })
    }

    async fn get_pool_state(&self, contract: &Asset) -> SdkResult<ReservePool> {
        self.lock()
            .pools
            .get(contract)
            .cloned()
            .ok_or_else(|| SdkError::RpcError(format!("no AMM contract at {}", contract)))
    }

    async fn asset_balance(&self, asset: &Asset) -> SdkResult<BigUint> {
        Ok(self.balance(asset))
    }
}

// ============================================================================
// Mock Execution
// ============================================================================

fn mine(
    state: &mut LedgerState,
    submission: &Submission,
    txid: &TransactionId,
    block: u64,
) -> Result<ConfirmedMessage, String> {
    let message = match submission {
        Submission::Call(descriptor) => {
            execute_call(state, descriptor)?;
            descriptor.to_ledger_message()
        }
        Submission::Creation(creation) => {
            let location = Asset::ledger(block, 1);
            match creation {
                ContractCreation::OutcomeAsset {
                    amount_per_mint, ..
                } => {
                    state.mintable.insert(location, amount_per_mint.clone());
                }
                ContractCreation::Amm { input_assets, .. } => {
                    let pool = ReservePool::empty(input_assets[0], input_assets[1])
                        .map_err(|e| e.to_string())?;
                    state.pools.insert(location, pool);
                }
            }
            creation.to_ledger_message()
        }
    };
    tracing::debug!(%txid, block, "mock ledger mined transaction");
    Ok(ConfirmedMessage {
        txid: txid.clone(),
        block_tx: format!("{}:1", block),
        message,
    })
}

fn execute_call(state: &mut LedgerState, descriptor: &TransactionDescriptor) -> Result<(), String> {
    let contract = descriptor.contract;
    match descriptor.call_kind {
        CallKind::Mint => {
            if let Some(per_mint) = state.mintable.get(&contract).cloned() {
                *state.balances.entry(contract).or_default() += per_mint;
                return Ok(());
            }
            let mut pool = state
                .pools
                .get(&contract)
                .cloned()
                .ok_or_else(|| format!("no contract at {}", contract))?;
            // Liquidity mint: all wallet balance of each pool asset is
            // consumed except what the transfers send back as change.
            let mut deposits = BTreeMap::new();
            let mut change = BTreeMap::new();
            for asset in pool.assets() {
                let available = state.balances.get(&asset).cloned().unwrap_or_default();
                let kept: BigUint = descriptor
                    .transfers
                    .iter()
                    .filter(|t| t.asset == asset)
                    .map(|t| t.amount.clone())
                    .sum();
                if kept > available {
                    return Err(format!("insufficient {} for change output", asset));
                }
                deposits.insert(asset, &available - &kept);
                change.insert(asset, kept);
            }
            pool.deposit(&deposits).map_err(|e| e.to_string())?;
            state.pools.insert(contract, pool);
            state.balances.extend(change);
            Ok(())
        }
        CallKind::Swap => {
            let mut pool = state
                .pools
                .get(&contract)
                .cloned()
                .ok_or_else(|| format!("no AMM contract at {}", contract))?;
            let transfer = descriptor
                .transfers
                .first()
                .ok_or_else(|| "swap without input transfer".to_string())?;
            let available = state.balances.get(&transfer.asset).cloned().unwrap_or_default();
            if available < transfer.amount {
                return Err(format!("insufficient {} for swap input", transfer.asset));
            }
            let quote = quote_swap(&pool, &transfer.asset, &transfer.amount).map_err(|e| e.to_string())?;
            let min_out = descriptor.asserted_min_output.clone().unwrap_or_default();
            if quote.output_amount < min_out {
                return Err(format!(
                    "min_out_value {} not met: output {}",
                    min_out, quote.output_amount
                ));
            }
            pool.apply(&quote.pool_delta()).map_err(|e| e.to_string())?;
            state.pools.insert(contract, pool);
            state.balances.insert(transfer.asset, available - &transfer.amount);
            *state.balances.entry(quote.output_asset).or_default() += &quote.output_amount;
            Ok(())
        }
        CallKind::Resolve => {
            if !state.pools.contains_key(&contract) {
                return Err(format!("no AMM contract at {}", contract));
            }
            if state.resolutions.contains_key(&contract) {
                return Err("market already resolved".to_string());
            }
            let commitment = descriptor
                .oracle_commitment
                .clone()
                .ok_or_else(|| "resolve without oracle commitment".to_string())?;
            state.resolutions.insert(contract, commitment);
            Ok(())
        }
    }
}
