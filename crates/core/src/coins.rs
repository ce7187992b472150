//! Coin vocabulary, ledger reason codes, and the coin → USD conversion.
//!
//! Balances are split into two sub-balances: `paid` coins (earned, USD-
//! convertible) and `free` coins (promotional, never withdrawable). Only
//! paid coins participate in payouts.

use serde::{Deserialize, Serialize};

use crate::types::UsdCents;

// ---------------------------------------------------------------------------
// Coin types
// ---------------------------------------------------------------------------

/// Which sub-balance a ledger entry applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinType {
    /// Earned, withdrawable coins.
    Paid,
    /// Promotional coins, excluded from payout eligibility.
    Free,
}

impl CoinType {
    /// Database text representation (`ledger_entries.coin_type`).
    pub fn as_str(self) -> &'static str {
        match self {
            CoinType::Paid => "paid",
            CoinType::Free => "free",
        }
    }
}

impl std::str::FromStr for CoinType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(CoinType::Paid),
            "free" => Ok(CoinType::Free),
            other => Err(format!("Unknown coin type '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger reason codes
// ---------------------------------------------------------------------------

/// Coins reserved when a payout request is accepted.
pub const REASON_PAYOUT_RESERVE: &str = "payout_reserve";

/// Reserved coins returned after a deny, cancel, or dispatch failure.
pub const REASON_PAYOUT_REFUND: &str = "payout_refund";

/// Coins earned from the gift/economy engine (external source).
pub const REASON_EARNED: &str = "earned";

/// Manual correction entry written by an operator.
pub const REASON_ADJUSTMENT: &str = "adjustment";

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Conversion rate: one paid coin is worth 3/10 of a cent.
///
/// 7,000 coins (the payout minimum) converts to exactly $21.00.
const USD_CENTS_PER_COIN_NUM: i64 = 3;
const USD_CENTS_PER_COIN_DEN: i64 = 10;

/// Convert a paid-coin amount to USD cents, rounding down.
pub fn coins_to_usd_cents(coins: i64) -> UsdCents {
    coins * USD_CENTS_PER_COIN_NUM / USD_CENTS_PER_COIN_DEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_payout_converts_to_21_dollars() {
        assert_eq!(coins_to_usd_cents(7_000), 2_100);
    }

    #[test]
    fn conversion_rounds_down() {
        // 33 coins * 3 / 10 = 9.9 cents -> 9
        assert_eq!(coins_to_usd_cents(33), 9);
    }

    #[test]
    fn zero_coins_is_zero_cents() {
        assert_eq!(coins_to_usd_cents(0), 0);
    }

    #[test]
    fn coin_type_round_trips_through_str() {
        for ct in [CoinType::Paid, CoinType::Free] {
            assert_eq!(ct.as_str().parse::<CoinType>().unwrap(), ct);
        }
    }

    #[test]
    fn unknown_coin_type_is_rejected() {
        assert!("bonus".parse::<CoinType>().is_err());
    }
}
