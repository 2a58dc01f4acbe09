/// Asset identifiers for outcome tokens, AMM contracts and collateral

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::COLLATERAL_TICKER;
use crate::errors::{MarketError, MarketResult};

/// A fungible asset known to the ledger.
///
/// Ledger-native assets (and contracts) are addressed by the location of the
/// transaction that created them: the block height and the transaction's
/// position within that block. The base collateral currency has no creating
/// transaction and uses a sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Asset {
    /// Asset created by a contract-creation transaction
    Ledger { block: u64, order: u32 },
    /// Base collateral currency
    Collateral,
}

impl Asset {
    pub const fn ledger(block: u64, order: u32) -> Self {
        Self::Ledger { block, order }
    }

    pub fn is_collateral(&self) -> bool {
        matches!(self, Self::Collateral)
    }

    /// Parse the `"<block>:<order>"` location reported for confirmed
    /// transactions
    pub fn from_block_tx(block_tx: &str) -> MarketResult<Self> {
        let (block, order) = block_tx
            .split_once(':')
            .ok_or_else(|| MarketError::invalid_asset(block_tx, "expected '<block>:<order>'"))?;
        let block = block
            .trim()
            .parse::<u64>()
            .map_err(|e| MarketError::invalid_asset(block_tx, &format!("bad block: {}", e)))?;
        let order = order
            .trim()
            .parse::<u32>()
            .map_err(|e| MarketError::invalid_asset(block_tx, &format!("bad order: {}", e)))?;
        Ok(Self::ledger(block, order))
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ledger { block, order } => write!(f, "{}:{}", block, order),
            Self::Collateral => f.write_str(COLLATERAL_TICKER),
        }
    }
}

impl FromStr for Asset {
    type Err = MarketError;

    fn from_str(s: &str) -> MarketResult<Self> {
        if s.eq_ignore_ascii_case(COLLATERAL_TICKER) {
            return Ok(Self::Collateral);
        }
        Self::from_block_tx(s)
    }
}

// The ledger spells assets as two-element arrays: `[block, order]` for
// ledger assets and `["BTC", "0"]` for collateral. Config files use the
// `"block:order"` string form.
#[derive(Deserialize)]
#[serde(untagged)]
enum AssetRepr {
    Location(u64, u32),
    Named(String, String),
    Key(String),
}

impl Serialize for Asset {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeTuple;

        let mut tuple = serializer.serialize_tuple(2)?;
        match self {
            Self::Ledger { block, order } => {
                tuple.serialize_element(block)?;
                tuple.serialize_element(order)?;
            }
            Self::Collateral => {
                tuple.serialize_element(COLLATERAL_TICKER)?;
                tuple.serialize_element("0")?;
            }
        }
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for Asset {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match AssetRepr::deserialize(deserializer)? {
            AssetRepr::Location(block, order) => Ok(Self::ledger(block, order)),
            AssetRepr::Named(ticker, _) if ticker.eq_ignore_ascii_case(COLLATERAL_TICKER) => {
                Ok(Self::Collateral)
            }
            AssetRepr::Named(block, order) => {
                Self::from_str(&format!("{}:{}", block, order)).map_err(serde::de::Error::custom)
            }
            AssetRepr::Key(key) => Self::from_str(&key).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let asset = Asset::ledger(880_012, 7);
        assert_eq!(asset.to_string(), "880012:7");
        assert_eq!("880012:7".parse::<Asset>().unwrap(), asset);
        assert_eq!("BTC".parse::<Asset>().unwrap(), Asset::Collateral);
        assert_eq!(Asset::Collateral.to_string(), "BTC");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("880012".parse::<Asset>().is_err());
        assert!("a:b".parse::<Asset>().is_err());
        assert!("1:-2".parse::<Asset>().is_err());
    }

    #[test]
    fn test_wire_form() {
        let json = serde_json::to_string(&Asset::ledger(100, 2)).unwrap();
        assert_eq!(json, "[100,2]");
        let json = serde_json::to_string(&Asset::Collateral).unwrap();
        assert_eq!(json, r#"["BTC","0"]"#);

        assert_eq!(serde_json::from_str::<Asset>("[100,2]").unwrap(), Asset::ledger(100, 2));
        assert_eq!(serde_json::from_str::<Asset>(r#"["BTC","0"]"#).unwrap(), Asset::Collateral);
        assert_eq!(serde_json::from_str::<Asset>(r#""100:2""#).unwrap(), Asset::ledger(100, 2));
    }

    #[test]
    fn test_ordering_is_stable() {
        let mut assets = vec![Asset::Collateral, Asset::ledger(5, 1), Asset::ledger(2, 9)];
        assets.sort();
        assert_eq!(assets, vec![Asset::ledger(2, 9), Asset::ledger(5, 1), Asset::Collateral]);
    }
}
