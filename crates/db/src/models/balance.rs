//! Balance and ledger entity models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use glowcast_core::types::{DbId, Timestamp};

/// A row from the `balances` table: one per user, split into the two coin
/// sub-balances. Only `paid_coins` is withdrawable.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Balance {
    pub user_id: DbId,
    pub paid_coins: i64,
    pub free_coins: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the append-only `ledger_entries` table.
///
/// Entries are never mutated or deleted; corrections are new offsetting
/// entries. `balance_after` snapshots the sub-balance inside the same
/// transaction that applied `delta`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LedgerEntry {
    pub id: DbId,
    pub user_id: DbId,
    pub delta: i64,
    pub coin_type: String,
    pub reason: String,
    pub request_id: Option<DbId>,
    pub balance_after: i64,
    pub created_at: Timestamp,
}

/// DTO for crediting earned coins from the economy engine (external source),
/// via `POST /api/v1/ledger/credits`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreditCoins {
    pub user_id: DbId,
    #[validate(range(min = 1))]
    pub coins: i64,
    /// `paid` or `free`.
    pub coin_type: String,
    #[validate(length(min = 1, max = 100))]
    pub reason: Option<String>,
}
