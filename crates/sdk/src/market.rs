/// Market aggregate and its state machine
///
/// A [`Market`] is owned by a single task. Every mutation goes through a
/// method that checks the transition first, so an error never leaves the
/// market half-updated.

use pm_math::ReservePool;
use pm_types::{Asset, MarketError, MarketResult, MarketState, OracleCommitment, Outcome};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A binary-outcome market backed by one AMM contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// Identifier oracle messages refer to
    pub id: String,
    /// AMM contract holding the reserves
    pub contract: Asset,
    pub yes_asset: Asset,
    pub no_asset: Asset,
    /// Last confirmed reserves
    pool: ReservePool,
    state: MarketState,
    /// Set once when resolution is submitted, never replaced
    resolution: Option<OracleCommitment>,
}

impl Market {
    /// Market for a freshly created AMM contract
    pub fn new(
        id: impl Into<String>,
        contract: Asset,
        yes_asset: Asset,
        no_asset: Asset,
    ) -> MarketResult<Self> {
        let pool = ReservePool::empty(yes_asset, no_asset)?;
        Ok(Self {
            id: id.into(),
            contract,
            yes_asset,
            no_asset,
            pool,
            state: MarketState::Created,
            resolution: None,
        })
    }

    pub fn state(&self) -> MarketState {
        self.state
    }

    pub fn pool(&self) -> &ReservePool {
        &self.pool
    }

    pub fn resolution(&self) -> Option<&OracleCommitment> {
        self.resolution.as_ref()
    }

    pub fn outcome_asset(&self, outcome: Outcome) -> Asset {
        match outcome {
            Outcome::Yes => self.yes_asset,
            Outcome::No => self.no_asset,
        }
    }

    /// Which side `asset` represents, if either
    pub fn outcome_of(&self, asset: &Asset) -> Option<Outcome> {
        if *asset == self.yes_asset {
            Some(Outcome::Yes)
        } else if *asset == self.no_asset {
            Some(Outcome::No)
        } else {
            None
        }
    }

    /// Outcome named by the confirmed resolution
    pub fn resolved_outcome(&self) -> Option<Outcome> {
        match self.state {
            MarketState::Resolved | MarketState::Settled => {
                self.resolution.as_ref().map(|c| c.message.outcome)
            }
            _ => None,
        }
    }

    // ========================================================================
    // Guards
    // ========================================================================

    pub fn ensure_trading(&self) -> MarketResult<()> {
        if !self.state.accepts_trades() {
            return Err(self.closed());
        }
        Ok(())
    }

    pub fn ensure_accepts_liquidity(&self) -> MarketResult<()> {
        if !self.state.accepts_liquidity() {
            return Err(self.closed());
        }
        Ok(())
    }

    fn closed(&self) -> MarketError {
        MarketError::MarketClosed {
            market_id: self.id.clone(),
            state: self.state,
        }
    }

    fn transition(&mut self, to: MarketState) -> MarketResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(MarketError::InvalidTransition {
                market_id: self.id.clone(),
                from: self.state,
                to,
            });
        }
        info!(market = %self.id, from = %self.state, %to, "market transition");
        self.state = to;
        Ok(())
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Record confirmed reserves after a liquidity deposit. The first deposit
    /// that funds both sides opens trading.
    pub fn record_liquidity(&mut self, pool: ReservePool) -> MarketResult<()> {
        self.ensure_accepts_liquidity()?;
        self.check_pool_assets(&pool)?;
        let funded = pool.is_funded();
        self.pool = pool;
        if funded && self.state == MarketState::Created {
            self.transition(MarketState::Funded)?;
        }
        if funded && self.state == MarketState::Funded {
            self.transition(MarketState::Trading)?;
        }
        Ok(())
    }

    /// Record confirmed reserves after a swap or collateral deposit
    pub fn record_trade(&mut self, pool: ReservePool) -> MarketResult<()> {
        self.ensure_trading()?;
        self.check_pool_assets(&pool)?;
        self.pool = pool;
        Ok(())
    }

    /// Attach the oracle commitment and move to `ResolutionPending`
    pub fn begin_resolution(&mut self, commitment: OracleCommitment) -> MarketResult<()> {
        if self.resolution.is_some() {
            return Err(MarketError::InvalidTransition {
                market_id: self.id.clone(),
                from: self.state,
                to: MarketState::ResolutionPending,
            });
        }
        self.transition(MarketState::ResolutionPending)?;
        self.resolution = Some(commitment);
        Ok(())
    }

    /// The ledger confirmed the resolution
    pub fn confirm_resolution(&mut self) -> MarketResult<()> {
        self.transition(MarketState::Resolved)
    }

    /// Winners have been paid out
    pub fn settle(&mut self) -> MarketResult<()> {
        self.transition(MarketState::Settled)
    }

    /// Unrecoverable ledger failure
    pub fn fail(&mut self) -> MarketResult<()> {
        self.transition(MarketState::Failed)
    }

    /// True only after resolution is confirmed, and only for the asset of
    /// the resolved outcome.
    pub fn is_winning_asset(&self, asset: &Asset) -> bool {
        self.resolved_outcome()
            .map(|outcome| self.outcome_asset(outcome) == *asset)
            .unwrap_or(false)
    }

    /// Reject a reserve snapshot for a different pair of assets
    fn check_pool_assets(&self, pool: &ReservePool) -> MarketResult<()> {
        let expected = self.pool.assets();
        if pool.assets() != expected {
            return Err(MarketError::PoolArityError {
                tracked: expected,
                rejected: pool.assets().into_iter().find(|a| !self.pool.contains(a)),
            });
        }
        Ok(())
    }
}

/// Whether `asset` is the winning side of a resolved market
pub fn is_winning_asset(market: &Market, asset: &Asset) -> bool {
    market.is_winning_asset(asset)
}
