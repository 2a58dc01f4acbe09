/// Market outcome and lifecycle state types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{MarketError, MarketResult};

// ============================================================================
// Outcome
// ============================================================================

/// Side of a binary prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    /// Wire spelling used in oracle messages
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "YES",
            Self::No => "NO",
        }
    }

    pub const fn opposite(&self) -> Self {
        match self {
            Self::Yes => Self::No,
            Self::No => Self::Yes,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = MarketError;

    fn from_str(s: &str) -> MarketResult<Self> {
        match s.to_ascii_uppercase().as_str() {
            "YES" => Ok(Self::Yes),
            "NO" => Ok(Self::No),
            _ => Err(MarketError::invalid_asset(s, "outcome must be YES or NO")),
        }
    }
}

// ============================================================================
// Market State
// ============================================================================

/// Lifecycle of a market.
///
/// ```text
/// Created -> Funded -> Trading -> ResolutionPending -> Resolved -> Settled
///    \          \          \               \
///     +----------+----------+---------------+--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketState {
    Created,
    Funded,
    Trading,
    ResolutionPending,
    Resolved,
    Settled,
    Failed,
}

impl MarketState {
    /// The single forward successor, if any
    pub const fn successor(&self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::Funded),
            Self::Funded => Some(Self::Trading),
            Self::Trading => Some(Self::ResolutionPending),
            Self::ResolutionPending => Some(Self::Resolved),
            Self::Resolved => Some(Self::Settled),
            Self::Settled | Self::Failed => None,
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Failed)
    }

    /// Forward one step, or into `Failed` from any non-terminal state.
    /// `Resolved` only moves to `Settled`: a resolved outcome is final even
    /// if a later ledger call fails.
    pub fn can_transition_to(&self, next: Self) -> bool {
        if next == Self::Failed {
            return !self.is_terminal() && *self != Self::Resolved;
        }
        self.successor() == Some(next)
    }

    /// Swaps and collateral deposits are only accepted while trading
    pub const fn accepts_trades(&self) -> bool {
        matches!(self, Self::Trading)
    }

    /// Liquidity may be added before and during trading
    pub const fn accepts_liquidity(&self) -> bool {
        matches!(self, Self::Created | Self::Funded | Self::Trading)
    }
}

impl fmt::Display for MarketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [MarketState; 7] = [
        MarketState::Created,
        MarketState::Funded,
        MarketState::Trading,
        MarketState::ResolutionPending,
        MarketState::Resolved,
        MarketState::Settled,
        MarketState::Failed,
    ];

    #[test]
    fn test_no_transition_skips_a_state() {
        for (i, from) in ALL.iter().enumerate() {
            for (j, to) in ALL.iter().enumerate() {
                if *to == MarketState::Failed {
                    continue;
                }
                let allowed = from.can_transition_to(*to);
                assert_eq!(allowed, j == i + 1 && *from != MarketState::Failed, "{:?} -> {:?}", from, to);
            }
        }
    }

    #[test]
    fn test_failed_reachable_from_open_states_only() {
        assert!(MarketState::Created.can_transition_to(MarketState::Failed));
        assert!(MarketState::Trading.can_transition_to(MarketState::Failed));
        assert!(MarketState::ResolutionPending.can_transition_to(MarketState::Failed));
        assert!(!MarketState::Resolved.can_transition_to(MarketState::Failed));
        assert!(!MarketState::Settled.can_transition_to(MarketState::Failed));
        assert!(!MarketState::Failed.can_transition_to(MarketState::Failed));
    }

    #[test]
    fn test_only_trading_accepts_trades() {
        let open: Vec<_> = ALL.iter().filter(|s| s.accepts_trades()).collect();
        assert_eq!(open, vec![&MarketState::Trading]);
    }

    #[test]
    fn test_outcome_wire_spelling() {
        assert_eq!(serde_json::to_string(&Outcome::Yes).unwrap(), r#""YES""#);
        assert_eq!("no".parse::<Outcome>().unwrap(), Outcome::No);
        assert_eq!(Outcome::Yes.opposite(), Outcome::No);
        assert!("MAYBE".parse::<Outcome>().is_err());
    }
}
