/// Rebuild market state from confirmed ledger events
///
/// Markets are not persisted. After a restart the owning task folds the
/// market's confirmed events back into a [`Market`]; the first event that
/// does not apply stops the fold and is reported with its index.

use std::collections::BTreeMap;

use num_bigint::BigUint;
use pm_math::quote_swap;
use pm_types::{Asset, MarketError, MarketResult, OracleCommitment};

use crate::market::Market;

/// A confirmed ledger event affecting one market
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    AmmCreated {
        market_id: String,
        contract: Asset,
        yes_asset: Asset,
        no_asset: Asset,
    },
    LiquidityAdded {
        amounts: BTreeMap<Asset, BigUint>,
    },
    Swapped {
        input_asset: Asset,
        input_amount: BigUint,
        output_amount: BigUint,
    },
    ResolutionSubmitted {
        commitment: OracleCommitment,
    },
    ResolutionConfirmed,
    Settled,
    Failed,
}

/// Fold confirmed events into the market they describe
pub fn replay<'a, I>(events: I) -> MarketResult<Market>
where
    I: IntoIterator<Item = &'a LedgerEvent>,
{
    let mut events = events.into_iter().enumerate();

    let mut market = match events.next() {
        Some((
            _,
            LedgerEvent::AmmCreated {
                market_id,
                contract,
                yes_asset,
                no_asset,
            },
        )) => Market::new(market_id.clone(), *contract, *yes_asset, *no_asset)
            .map_err(|e| MarketError::replay(0, e))?,
        Some((index, other)) => {
            return Err(MarketError::replay(
                index,
                format!("first event must be AmmCreated, got {:?}", other),
            ))
        }
        None => return Err(MarketError::replay(0, "no events")),
    };

    for (index, event) in events {
        apply(&mut market, event).map_err(|e| match e {
            MarketError::ReplayError { reason, .. } => MarketError::replay(index, reason),
            other => MarketError::replay(index, other),
        })?;
    }
    Ok(market)
}

fn apply(market: &mut Market, event: &LedgerEvent) -> MarketResult<()> {
    match event {
        LedgerEvent::AmmCreated { .. } => Err(MarketError::replay(0, "duplicate AmmCreated")),
        LedgerEvent::LiquidityAdded { amounts } => {
            let mut pool = market.pool().clone();
            pool.deposit(amounts)?;
            market.record_liquidity(pool)
        }
        LedgerEvent::Swapped {
            input_asset,
            input_amount,
            output_amount,
        } => {
            market.ensure_trading()?;
            let quote = quote_swap(market.pool(), input_asset, input_amount)?;
            // The ledger priced this trade; any other output means the
            // events do not belong to this pool history.
            if quote.output_amount != *output_amount {
                return Err(MarketError::replay(
                    0,
                    format!(
                        "recorded output {} does not match priced output {}",
                        output_amount, quote.output_amount
                    ),
                ));
            }
            let mut pool = market.pool().clone();
            pool.apply(&quote.pool_delta())?;
            market.record_trade(pool)
        }
        LedgerEvent::ResolutionSubmitted { commitment } => market.begin_resolution(commitment.clone()),
        LedgerEvent::ResolutionConfirmed => market.confirm_resolution(),
        LedgerEvent::Settled => market.settle(),
        LedgerEvent::Failed => market.fail(),
    }
}
