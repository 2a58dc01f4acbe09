/// Two-asset reserve pool backing a market's AMM contract
///
/// Reserves are exact integers. A pool is a value: the swap engine prices
/// against a snapshot, and the pool is only mutated through [`ReservePool::apply`]
/// (and the helpers built on it), which either applies every delta or none.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use pm_types::{Asset, MarketError, MarketResult};

/// Number of assets every pool tracks
pub const POOL_ARITY: usize = 2;

/// Reserves of a market's AMM contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservePool {
    /// Asset key -> reserve, in the ledger's contract-state shape
    /// (`{"<block>:<order>": "<amount>"}`)
    #[serde(with = "amounts_serde")]
    amounts: BTreeMap<Asset, BigUint>,
}

impl ReservePool {
    /// Create a pool tracking two distinct assets
    pub fn new(
        first: Asset,
        first_reserve: BigUint,
        second: Asset,
        second_reserve: BigUint,
    ) -> MarketResult<Self> {
        Self::from_reserves([(first, first_reserve), (second, second_reserve)])
    }

    /// Pool for a freshly created AMM contract, before any deposit
    pub fn empty(first: Asset, second: Asset) -> MarketResult<Self> {
        Self::new(first, BigUint::zero(), second, BigUint::zero())
    }

    /// Build a pool from exactly two `(asset, reserve)` pairs
    pub fn from_reserves<I>(reserves: I) -> MarketResult<Self>
    where
        I: IntoIterator<Item = (Asset, BigUint)>,
    {
        let mut pool = Self {
            amounts: BTreeMap::new(),
        };
        for (asset, reserve) in reserves {
            pool.track(asset, reserve)?;
        }
        if pool.amounts.len() != POOL_ARITY {
            return Err(MarketError::PoolArityError {
                tracked: pool.assets(),
                rejected: None,
            });
        }
        Ok(pool)
    }

    /// Start tracking `asset`. Fails once two assets are tracked, and for an
    /// asset that is already tracked.
    pub fn track(&mut self, asset: Asset, reserve: BigUint) -> MarketResult<()> {
        if self.amounts.len() >= POOL_ARITY || self.amounts.contains_key(&asset) {
            return Err(MarketError::PoolArityError {
                tracked: self.assets(),
                rejected: Some(asset),
            });
        }
        self.amounts.insert(asset, reserve);
        Ok(())
    }

    /// Read-only snapshot of the reserves
    pub fn reserves(&self) -> BTreeMap<Asset, BigUint> {
        self.amounts.clone()
    }

    /// Tracked assets in ascending order
    pub fn assets(&self) -> Vec<Asset> {
        self.amounts.keys().copied().collect()
    }

    pub fn contains(&self, asset: &Asset) -> bool {
        self.amounts.contains_key(asset)
    }

    pub fn reserve_of(&self, asset: &Asset) -> MarketResult<&BigUint> {
        self.amounts.get(asset).ok_or_else(|| MarketError::AssetNotInPool {
            asset: *asset,
            tracked: self.assets(),
        })
    }

    /// The pool's other asset
    pub fn counterpart(&self, asset: &Asset) -> MarketResult<Asset> {
        if !self.contains(asset) {
            return Err(MarketError::AssetNotInPool {
                asset: *asset,
                tracked: self.assets(),
            });
        }
        self.amounts
            .keys()
            .find(|candidate| *candidate != asset)
            .copied()
            .ok_or_else(|| MarketError::PoolArityError {
                tracked: self.assets(),
                rejected: None,
            })
    }

    /// Constant-product invariant `k = reserve_a * reserve_b`
    pub fn product(&self) -> BigUint {
        self.amounts.values().fold(BigUint::from(1u32), |k, r| k * r)
    }

    /// Both reserves are positive
    pub fn is_funded(&self) -> bool {
        self.amounts.len() == POOL_ARITY && self.amounts.values().all(|r| !r.is_zero())
    }

    /// Apply a signed delta to each named reserve, atomically.
    ///
    /// Every delta is validated before any reserve changes; on error the pool
    /// is left untouched.
    pub fn apply(&mut self, delta: &BTreeMap<Asset, BigInt>) -> MarketResult<()> {
        let mut updated = Vec::with_capacity(delta.len());
        for (asset, change) in delta {
            let reserve = self.amounts.get(asset).ok_or_else(|| MarketError::UnknownAsset {
                asset: *asset,
                tracked: self.assets(),
            })?;
            let next = BigInt::from(reserve.clone()) + change;
            let next = match next.to_biguint() {
                Some(value) => value,
                None => {
                    return Err(MarketError::InvariantViolation {
                        asset: *asset,
                        reserve: reserve.clone(),
                        delta: change.clone(),
                    })
                }
            };
            updated.push((*asset, next));
        }

        for (asset, value) in updated {
            self.amounts.insert(asset, value);
        }
        Ok(())
    }

    /// Add liquidity to both sides
    pub fn deposit(&mut self, amounts: &BTreeMap<Asset, BigUint>) -> MarketResult<()> {
        let delta = amounts
            .iter()
            .map(|(asset, amount)| (*asset, BigInt::from(amount.clone())))
            .collect();
        self.apply(&delta)
    }

    /// Remove liquidity from both sides
    pub fn withdraw(&mut self, amounts: &BTreeMap<Asset, BigUint>) -> MarketResult<()> {
        let delta = amounts
            .iter()
            .map(|(asset, amount)| (*asset, BigInt::from_biguint(Sign::Minus, amount.clone())))
            .collect();
        self.apply(&delta)
    }
}

mod amounts_serde {
    use super::*;
    use serde::{Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(amounts: &BTreeMap<Asset, BigUint>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(
            amounts
                .iter()
                .map(|(asset, amount)| (asset.to_string(), amount.to_str_radix(10))),
        )
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<Asset, BigUint>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        let mut amounts = BTreeMap::new();
        for (key, value) in raw {
            let asset = Asset::from_str(&key).map_err(serde::de::Error::custom)?;
            let amount = BigUint::from_str(&value).map_err(serde::de::Error::custom)?;
            amounts.insert(asset, amount);
        }
        if amounts.len() != POOL_ARITY {
            return Err(serde::de::Error::invalid_length(
                amounts.len(),
                &"exactly two pool reserves",
            ));
        }
        Ok(amounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yes() -> Asset {
        Asset::ledger(880_001, 1)
    }

    fn no() -> Asset {
        Asset::ledger(880_002, 1)
    }

    fn pool(yes_reserve: u64, no_reserve: u64) -> ReservePool {
        ReservePool::new(yes(), yes_reserve.into(), no(), no_reserve.into()).unwrap()
    }

    fn delta(entries: &[(Asset, i64)]) -> BTreeMap<Asset, BigInt> {
        entries.iter().map(|(a, d)| (*a, BigInt::from(*d))).collect()
    }

    #[test]
    fn test_rejects_duplicate_and_third_asset() {
        let err = ReservePool::new(yes(), 1u32.into(), yes(), 1u32.into()).unwrap_err();
        assert!(matches!(err, MarketError::PoolArityError { rejected: Some(a), .. } if a == yes()));

        let mut p = pool(10, 10);
        let err = p.track(Asset::Collateral, 5u32.into()).unwrap_err();
        assert!(matches!(err, MarketError::PoolArityError { .. }));
        assert_eq!(p.assets(), vec![yes(), no()]);
    }

    #[test]
    fn test_from_reserves_requires_two() {
        let err = ReservePool::from_reserves([(yes(), BigUint::from(1u32))]).unwrap_err();
        assert!(matches!(err, MarketError::PoolArityError { rejected: None, .. }));
    }

    #[test]
    fn test_apply_is_atomic() {
        let mut p = pool(100, 50);
        let before = p.clone();

        let err = p.apply(&delta(&[(yes(), 10), (no(), -51)])).unwrap_err();
        assert_eq!(
            err,
            MarketError::InvariantViolation {
                asset: no(),
                reserve: 50u32.into(),
                delta: BigInt::from(-51),
            }
        );
        assert_eq!(p, before);

        let err = p.apply(&delta(&[(yes(), 10), (Asset::Collateral, 1)])).unwrap_err();
        assert!(matches!(err, MarketError::UnknownAsset { asset: Asset::Collateral, .. }));
        assert_eq!(p, before);

        p.apply(&delta(&[(yes(), 10), (no(), -50)])).unwrap();
        assert_eq!(p.reserve_of(&yes()).unwrap(), &BigUint::from(110u32));
        assert!(p.reserve_of(&no()).unwrap().is_zero());
    }

    #[test]
    fn test_reads_do_not_mutate() {
        let p = pool(7, 9);
        let mut snapshot = p.reserves();
        snapshot.insert(yes(), 0u32.into());
        assert_eq!(p.reserve_of(&yes()).unwrap(), &BigUint::from(7u32));
        assert_eq!(p.product(), BigUint::from(63u32));
    }

    #[test]
    fn test_counterpart() {
        let p = pool(1, 1);
        assert_eq!(p.counterpart(&yes()).unwrap(), no());
        assert_eq!(p.counterpart(&no()).unwrap(), yes());
        assert!(matches!(
            p.counterpart(&Asset::Collateral),
            Err(MarketError::AssetNotInPool { .. })
        ));
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let mut p = ReservePool::empty(yes(), no()).unwrap();
        assert!(!p.is_funded());

        let amounts: BTreeMap<_, _> = [(yes(), BigUint::from(100u32)), (no(), BigUint::from(100u32))]
            .into_iter()
            .collect();
        p.deposit(&amounts).unwrap();
        assert!(p.is_funded());

        p.withdraw(&amounts).unwrap();
        assert!(!p.is_funded());
        assert!(p.withdraw(&amounts).is_err());
    }

    #[test]
    fn test_contract_state_shape() {
        let p = pool(1000, 2500);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "amounts": { "880001:1": "1000", "880002:1": "2500" } })
        );
        let back: ReservePool = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);

        let three = serde_json::json!({ "amounts": { "1:1": "1", "2:1": "1", "BTC": "1" } });
        assert!(serde_json::from_value::<ReservePool>(three).is_err());
    }
}
