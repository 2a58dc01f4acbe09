/// Market lifecycle orchestration against a ledger client
///
/// Each operation follows the same shape: check the market's state, build a
/// descriptor from a fresh pool snapshot, submit, await confirmation, then
/// record the confirmed reserves. Markets are only mutated after the ledger
/// confirms, so a failed call leaves them where they were (except for
/// unrecoverable rejections, which move the market to `Failed`).

use std::future::Future;
use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::Zero;
use pm_math::{build_swap_descriptor, quote_deposit, quote_swap, SlippageTolerance, SwapQuote};
use pm_types::{
    Asset, ContractCreation, MarketError, MarketState, OracleCommitment, Outcome,
    TransactionDescriptor, Transfer,
};
use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::client::{await_confirmation, never_cancel, ConfirmedMessage, LedgerClient, TransactionId};
use crate::config::SdkConfig;
use crate::errors::{SdkError, SdkResult};
use crate::market::Market;
use crate::oracle::{build_message, verify_for_market, OracleKey};

/// A confirmed swap or collateral deposit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapReceipt {
    /// Quote the trade was submitted with, slippage bound applied
    pub quote: SwapQuote,
    pub txid: TransactionId,
    pub confirmed: ConfirmedMessage,
}

/// Drives markets through their lifecycle
pub struct MarketLifecycle<C: LedgerClient> {
    client: Arc<C>,
    config: SdkConfig,
    oracle_public_key: Option<XOnlyPublicKey>,
}

impl<C: LedgerClient> MarketLifecycle<C> {
    pub fn new(client: Arc<C>, config: SdkConfig) -> SdkResult<Self> {
        config.validate()?;
        let oracle_public_key = config.oracle_key()?;
        Ok(Self {
            client,
            config,
            oracle_public_key,
        })
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Submit a contract call and wait for it under the configured policy
    pub async fn submit_and_confirm(
        &self,
        descriptor: &TransactionDescriptor,
    ) -> SdkResult<(TransactionId, ConfirmedMessage)> {
        let txid = self.client.submit_transaction(descriptor).await?;
        info!(%txid, contract = %descriptor.contract, call = ?descriptor.call_kind, "submitted contract call");
        let confirmed = self.confirm(&txid).await?;
        Ok((txid, confirmed))
    }

    async fn confirm(&self, txid: &TransactionId) -> SdkResult<ConfirmedMessage> {
        await_confirmation(self.client.as_ref(), txid, &self.config.confirmation, never_cancel()).await
    }

    async fn create_contract(&self, creation: &ContractCreation) -> SdkResult<Asset> {
        let txid = self.client.submit_contract_creation(creation).await?;
        info!(%txid, ticker = creation.ticker(), "submitted contract creation");
        let confirmed = self.confirm(&txid).await?;
        let location = confirmed.location()?;
        info!(%txid, ticker = creation.ticker(), contract = %location, "contract created");
        Ok(location)
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Create an outcome asset contract; returns its ledger location
    #[instrument(skip(self))]
    pub async fn create_outcome_asset(&self, ticker: &str) -> SdkResult<Asset> {
        self.create_contract(&ContractCreation::outcome_asset(ticker)).await
    }

    /// Free-mint an outcome asset into the wallet
    #[instrument(skip(self))]
    pub async fn mint_outcome(&self, asset: Asset) -> SdkResult<TransactionId> {
        let (txid, _) = self.submit_and_confirm(&TransactionDescriptor::mint(asset)).await?;
        Ok(txid)
    }

    /// Create the AMM contract pairing a market's outcome assets
    #[instrument(skip(self))]
    pub async fn create_amm(
        &self,
        market_id: &str,
        yes_asset: Asset,
        no_asset: Asset,
        ticker: &str,
    ) -> SdkResult<Market> {
        // Validate the pair before paying for a contract.
        Market::new(market_id, Asset::Collateral, yes_asset, no_asset)?;
        let contract = self
            .create_contract(&ContractCreation::amm(ticker, yes_asset, no_asset))
            .await?;
        Ok(Market::new(market_id, contract, yes_asset, no_asset)?)
    }

    /// Deposit `amount` of each outcome asset into the market's pool.
    ///
    /// The mint call consumes the wallet's outcome balances; everything above
    /// `amount` is transferred back to the liquidity output as change.
    #[instrument(skip(self, market), fields(market = %market.id))]
    pub async fn deposit_liquidity(
        &self,
        market: &mut Market,
        amount: &BigUint,
    ) -> SdkResult<TransactionId> {
        market.ensure_accepts_liquidity()?;

        let mut descriptor = TransactionDescriptor::mint(market.contract);
        for asset in [market.yes_asset, market.no_asset] {
            let available = self.client.asset_balance(&asset).await?;
            if available < *amount {
                return Err(MarketError::InsufficientBalance {
                    asset,
                    available,
                    required: amount.clone(),
                }
                .into());
            }
            let change = available - amount;
            if !change.is_zero() {
                descriptor = descriptor.with_transfer(Transfer {
                    asset,
                    destination_output_index: self.config.liquidity_output_index,
                    amount: change,
                });
            }
        }

        let (txid, _) = match self.submit_and_confirm(&descriptor).await {
            Ok(submitted) => submitted,
            Err(e) => return Err(self.fail_if_unfunded(market, e)),
        };
        let pool = self.client.get_pool_state(&market.contract).await?;
        market.record_liquidity(pool)?;
        info!(%txid, %amount, state = %market.state(), "liquidity deposited");
        Ok(txid)
    }

    /// A rejected first deposit leaves a contract nobody can fund
    fn fail_if_unfunded(&self, market: &mut Market, err: SdkError) -> SdkError {
        if err.is_rejection() && market.state() == MarketState::Created {
            warn!(market = %market.id, error = %err, "initial funding rejected");
            if let Err(transition) = market.fail() {
                warn!(market = %market.id, error = %transition, "could not mark market failed");
            }
        }
        err
    }

    // ========================================================================
    // Trading
    // ========================================================================

    /// Quote a swap against the current on-ledger reserves
    pub async fn quote(
        &self,
        market: &Market,
        input_asset: &Asset,
        amount: &BigUint,
        tolerance: Option<SlippageTolerance>,
    ) -> SdkResult<SwapQuote> {
        market.ensure_trading()?;
        let pool = self.client.get_pool_state(&market.contract).await?;
        let quote = quote_swap(&pool, input_asset, amount)?;
        Ok(quote.with_slippage(tolerance.unwrap_or(self.config.default_slippage)))
    }

    /// Swap one outcome asset for the other
    #[instrument(skip(self, market, amount), fields(market = %market.id, %amount))]
    pub async fn swap(
        &self,
        market: &mut Market,
        input_asset: Asset,
        amount: BigUint,
        tolerance: Option<SlippageTolerance>,
    ) -> SdkResult<SwapReceipt> {
        let quote = self.quote(market, &input_asset, &amount, tolerance).await?;
        let receipt = self.execute(market.contract, quote).await?;
        let pool = self.client.get_pool_state(&market.contract).await?;
        market.record_trade(pool)?;
        Ok(receipt)
    }

    /// Deposit collateral into a collateral/outcome pool and receive one of
    /// the market's outcome assets.
    #[instrument(skip(self, market, amount), fields(market = %market.id, %amount))]
    pub async fn deposit_collateral(
        &self,
        market: &Market,
        collateral_contract: Asset,
        collateral: Asset,
        amount: BigUint,
        tolerance: Option<SlippageTolerance>,
    ) -> SdkResult<SwapReceipt> {
        market.ensure_trading()?;
        let pool = self.client.get_pool_state(&collateral_contract).await?;
        let quote = quote_deposit(&pool, &collateral, &amount)?;
        if market.outcome_of(&quote.output_asset).is_none() {
            return Err(MarketError::UnknownAsset {
                asset: quote.output_asset,
                tracked: vec![market.yes_asset, market.no_asset],
            }
            .into());
        }
        let quote = quote.with_slippage(tolerance.unwrap_or(self.config.default_slippage));
        self.execute(collateral_contract, quote).await
    }

    async fn execute(&self, contract: Asset, quote: SwapQuote) -> SdkResult<SwapReceipt> {
        let descriptor = build_swap_descriptor(
            contract,
            quote.input_asset,
            quote.input_amount.clone(),
            quote.min_output_amount.clone(),
            self.config.destination_output_index,
        );
        info!(
            input = %quote.input_asset,
            output = %quote.output_asset,
            input_amount = %quote.input_amount,
            output_amount = %quote.output_amount,
            min_output = %quote.min_output_amount,
            "submitting swap"
        );
        let (txid, confirmed) = self.submit_and_confirm(&descriptor).await?;
        Ok(SwapReceipt {
            quote,
            txid,
            confirmed,
        })
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Sign, submit and confirm the market's resolution
    #[instrument(skip(self, market, key), fields(market = %market.id))]
    pub async fn resolve(
        &self,
        market: &mut Market,
        outcome: Outcome,
        block_height: u64,
        key: &OracleKey,
    ) -> SdkResult<ConfirmedMessage> {
        let commitment = key.sign(&build_message(&market.id, outcome, block_height));
        let txid = self.submit_resolution(market, commitment).await?;
        self.confirm_resolution(market, &txid, never_cancel()).await
    }

    /// Verify and submit a signed commitment. The market moves to
    /// `ResolutionPending` once the ledger accepts the broadcast.
    pub async fn submit_resolution(
        &self,
        market: &mut Market,
        commitment: OracleCommitment,
    ) -> SdkResult<TransactionId> {
        if market.state() != MarketState::Trading {
            return Err(MarketError::InvalidTransition {
                market_id: market.id.clone(),
                from: market.state(),
                to: MarketState::ResolutionPending,
            }
            .into());
        }
        let public_key = self.oracle_public_key.ok_or_else(|| {
            SdkError::InvalidConfig("oracle_public_key is required to resolve markets".to_string())
        })?;
        verify_for_market(&commitment, &market.id, &public_key)?;

        let descriptor = TransactionDescriptor::resolve(market.contract, commitment.clone());
        let txid = self.client.submit_transaction(&descriptor).await?;
        market.begin_resolution(commitment)?;
        info!(%txid, market = %market.id, "resolution submitted");
        Ok(txid)
    }

    /// Wait for a submitted resolution. Timeouts and cancellation leave the
    /// market pending; a ledger rejection fails it.
    pub async fn confirm_resolution<F>(
        &self,
        market: &mut Market,
        txid: &TransactionId,
        cancel: F,
    ) -> SdkResult<ConfirmedMessage>
    where
        F: Future<Output = ()>,
    {
        match await_confirmation(self.client.as_ref(), txid, &self.config.confirmation, cancel).await {
            Ok(confirmed) => {
                market.confirm_resolution()?;
                Ok(confirmed)
            }
            Err(e) if e.is_rejection() => {
                warn!(market = %market.id, %txid, error = %e, "resolution rejected");
                market.fail()?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Mark a resolved market settled once claims are processed
    pub fn settle(&self, market: &mut Market) -> SdkResult<()> {
        market.settle()?;
        Ok(())
    }

    /// Balance of a winning asset the wallet can claim against
    pub async fn claim_winnings(&self, market: &Market, asset: &Asset) -> SdkResult<BigUint> {
        if !market.is_winning_asset(asset) {
            return Err(MarketError::NotWinningAsset {
                market_id: market.id.clone(),
                asset: *asset,
            }
            .into());
        }
        self.client.asset_balance(asset).await
    }
}
