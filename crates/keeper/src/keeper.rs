use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pm_math::spot_price_bps;
use pm_sdk::{
    build_message, never_cancel, parse_public_key, ConfirmedMessage, LedgerClient, Market,
    MarketLifecycle, OracleKey, TransactionId,
};
use pm_types::{MarketState, OracleCommitment, Outcome, TransactionDescriptor};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::KeeperConfig;
use crate::error::{KeeperError, KeeperResult};

/// Run-loop iterations between health checks
const HEALTH_CHECK_EVERY: u64 = 100;

/// What a resolution request ended in
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionReport {
    /// Signed and verified but not broadcast
    DryRun(TransactionDescriptor),
    /// Broadcast and confirmed by the ledger
    Confirmed(ConfirmedMessage),
}

/// Market counts by state, from the last refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthSummary {
    pub awaiting_liquidity: usize,
    pub trading: usize,
    pub resolution_pending: usize,
    pub resolved: usize,
    pub settled: usize,
    pub failed: usize,
}

impl HealthSummary {
    pub fn total(&self) -> usize {
        self.awaiting_liquidity
            + self.trading
            + self.resolution_pending
            + self.resolved
            + self.settled
            + self.failed
    }
}

/// Keeper service that tracks configured markets and publishes oracle
/// resolutions for them
pub struct Keeper<C: LedgerClient> {
    /// Lifecycle driver bound to the ledger client
    lifecycle: MarketLifecycle<C>,

    /// Oracle signing key; `None` runs the keeper watch-only
    oracle_key: Option<OracleKey>,

    /// Keeper configuration
    config: KeeperConfig,

    /// Tracked markets by id
    markets: HashMap<String, Market>,

    /// Dry run mode flag
    dry_run: bool,
}

impl<C: LedgerClient> Keeper<C> {
    /// Create a new keeper instance
    pub fn new(
        client: Arc<C>,
        oracle_key: Option<OracleKey>,
        config: KeeperConfig,
        dry_run: bool,
    ) -> KeeperResult<Self> {
        config.validate()?;

        let mut sdk_config = config.sdk_config();
        if let Some(key) = &oracle_key {
            match &sdk_config.oracle_public_key {
                Some(expected) => {
                    if parse_public_key(expected)? != key.public_key() {
                        return Err(KeeperError::InvalidConfig(format!(
                            "oracle key does not match oracle_public_key {}",
                            expected
                        )));
                    }
                }
                None => sdk_config.oracle_public_key = Some(key.public_key().to_string()),
            }
        }

        let mut markets = HashMap::new();
        for market_config in config.get_enabled_markets() {
            let market = Market::new(
                market_config.market_id.clone(),
                market_config.contract,
                market_config.yes_asset,
                market_config.no_asset,
            )?;
            markets.insert(market_config.market_id.clone(), market);
        }

        Ok(Self {
            lifecycle: MarketLifecycle::new(client, sdk_config)?,
            oracle_key,
            config,
            markets,
            dry_run,
        })
    }

    pub fn market(&self, market_id: &str) -> Option<&Market> {
        self.markets.get(market_id)
    }

    pub fn lifecycle(&self) -> &MarketLifecycle<C> {
        &self.lifecycle
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Refresh markets every `poll_interval_secs` until `shutdown` completes.
    /// Returns the number of iterations run.
    pub async fn run<F>(&mut self, shutdown: F) -> KeeperResult<u64>
    where
        F: Future<Output = ()>,
    {
        let mut interval_timer =
            tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        let mut iteration = 0u64;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(iteration, "keeper stopping");
                    return Ok(iteration);
                }
                _ = interval_timer.tick() => {}
            }
            iteration += 1;
            debug!(iteration, "starting keeper iteration");

            match self.refresh_all_markets().await {
                Ok(updates) if updates > 0 => info!(iteration, updates, "markets refreshed"),
                Ok(_) => debug!(iteration, "no market changes"),
                Err(e) => error!(iteration, error = %e, "keeper iteration failed"),
            }

            if iteration % HEALTH_CHECK_EVERY == 0 {
                if let Err(e) = self.health_check().await {
                    warn!(error = %e, "health check failed");
                }
            }
        }
    }

    /// Refresh every enabled market, highest priority first. Returns the
    /// number of markets whose reserves changed.
    pub async fn refresh_all_markets(&mut self) -> KeeperResult<usize> {
        let mut updates = 0;

        let ids: Vec<String> = self
            .config
            .get_enabled_markets()
            .into_iter()
            .map(|m| m.market_id.clone())
            .collect();
        for market_id in &ids {
            match self.refresh_market(market_id).await {
                Ok(true) => updates += 1,
                Ok(false) => {}
                Err(e) => {
                    // Continue with other markets
                    error!(market = %market_id, error = %e, "failed to refresh market");
                }
            }
        }

        Ok(updates)
    }

    /// Pull the confirmed reserves of one market from the ledger
    pub async fn refresh_market(&mut self, market_id: &str) -> KeeperResult<bool> {
        let market = self
            .markets
            .get_mut(market_id)
            .ok_or_else(|| KeeperError::UnknownMarket(market_id.to_string()))?;

        if !market.state().accepts_liquidity() {
            debug!(market = %market_id, state = %market.state(), "market no longer trading, skipping refresh");
            return Ok(false);
        }

        let pool = self.lifecycle.client().get_pool_state(&market.contract).await?;
        if pool == *market.pool() {
            return Ok(false);
        }

        if market.state() == MarketState::Trading {
            market.record_trade(pool)?;
        } else {
            market.record_liquidity(pool)?;
        }

        if market.pool().is_funded() {
            let yes_price = spot_price_bps(market.pool(), &market.yes_asset)?;
            info!(market = %market_id, state = %market.state(), yes_price_bps = yes_price, "reserves updated");
        } else {
            info!(market = %market_id, state = %market.state(), "reserves updated, pool not yet funded");
        }
        Ok(true)
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Sign the outcome of a market and publish it
    pub async fn resolve_market(
        &mut self,
        market_id: &str,
        outcome: Outcome,
        block_height: u64,
    ) -> KeeperResult<ResolutionReport> {
        let key = self.oracle_key.as_ref().ok_or_else(|| {
            KeeperError::MissingOracleKey(format!("set {} to resolve markets", self.config.oracle_key_env))
        })?;
        let market = self
            .markets
            .get_mut(market_id)
            .ok_or_else(|| KeeperError::UnknownMarket(market_id.to_string()))?;
        market.ensure_trading()?;

        let commitment = key.sign(&build_message(&market.id, outcome, block_height));
        info!(market = %market_id, %outcome, block_height, "signed resolution");

        if self.dry_run {
            let descriptor = TransactionDescriptor::resolve(market.contract, commitment);
            info!(market = %market_id, "DRY RUN: would submit resolution");
            return Ok(ResolutionReport::DryRun(descriptor));
        }

        let txid = submit_with_retry(&self.lifecycle, &self.config, market, commitment).await?;
        let confirmed = self
            .lifecycle
            .confirm_resolution(market, &txid, never_cancel())
            .await?;
        info!(market = %market_id, %txid, location = %confirmed.block_tx, "resolution confirmed");
        Ok(ResolutionReport::Confirmed(confirmed))
    }

    /// Mark a resolved market settled
    pub fn settle_market(&mut self, market_id: &str) -> KeeperResult<()> {
        let market = self
            .markets
            .get_mut(market_id)
            .ok_or_else(|| KeeperError::UnknownMarket(market_id.to_string()))?;
        self.lifecycle.settle(market)?;
        Ok(())
    }

    // ========================================================================
    // Health
    // ========================================================================

    /// Summarize tracked markets; failed markets are logged
    pub async fn health_check(&self) -> KeeperResult<HealthSummary> {
        let mut summary = HealthSummary::default();
        for market in self.markets.values() {
            match market.state() {
                MarketState::Created | MarketState::Funded => summary.awaiting_liquidity += 1,
                MarketState::Trading => summary.trading += 1,
                MarketState::ResolutionPending => summary.resolution_pending += 1,
                MarketState::Resolved => summary.resolved += 1,
                MarketState::Settled => summary.settled += 1,
                MarketState::Failed => {
                    warn!(market = %market.id, "market failed");
                    summary.failed += 1;
                }
            }
        }
        info!(?summary, "keeper health");
        Ok(summary)
    }
}

/// Submit a resolution, retrying broadcast and RPC failures with backoff
async fn submit_with_retry<C: LedgerClient>(
    lifecycle: &MarketLifecycle<C>,
    config: &KeeperConfig,
    market: &mut Market,
    commitment: OracleCommitment,
) -> KeeperResult<TransactionId> {
    let mut attempt = 0;
    loop {
        match lifecycle.submit_resolution(market, commitment.clone()).await {
            Ok(txid) => return Ok(txid),
            Err(e) if e.is_retryable() && attempt < config.retry.max_retries => {
                let delay = config.retry.delay_for_attempt(attempt);
                warn!(market = %market.id, attempt, delay_ms = delay, error = %e, "resolution broadcast failed, retrying");
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
