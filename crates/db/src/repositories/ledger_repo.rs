//! Repository for the `balances` and `ledger_entries` tables.
//!
//! The ledger is the single mutable shared resource of the engine: every
//! other component changes a balance strictly through [`LedgerRepo::debit`]
//! and [`LedgerRepo::credit`], never by direct column writes. Entries are
//! append-only; the running invariant `sum(delta) == balance` is what the
//! invariant tests assert.

use sqlx::{PgConnection, PgPool};

use glowcast_core::coins::CoinType;
use glowcast_core::types::DbId;

use crate::models::balance::{Balance, LedgerEntry};

/// Column list for `ledger_entries` queries.
const ENTRY_COLUMNS: &str = "\
    id, user_id, delta, coin_type, reason, request_id, balance_after, created_at";

/// Column list for `balances` queries.
const BALANCE_COLUMNS: &str = "user_id, paid_coins, free_coins, created_at, updated_at";

/// Result of a debit attempt.
///
/// Insufficient funds is an expected domain outcome, not a database error,
/// so it is modeled in the return value rather than the error channel.
#[derive(Debug)]
pub enum DebitOutcome {
    /// The debit was applied; the appended entry carries `balance_after`.
    Applied(LedgerEntry),
    /// The paid balance was too low; nothing was persisted.
    Insufficient { available: i64 },
}

/// Provides balance reads and the only two balance mutations in the system.
pub struct LedgerRepo;

impl LedgerRepo {
    /// Current balance for a user. Users without any ledger history read as
    /// zero on both sub-balances.
    pub async fn balance(pool: &PgPool, user_id: DbId) -> Result<Balance, sqlx::Error> {
        let query = format!("SELECT {BALANCE_COLUMNS} FROM balances WHERE user_id = $1");
        let existing = sqlx::query_as::<_, Balance>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        match existing {
            Some(balance) => Ok(balance),
            None => {
                // Materialize the zero row so the caller gets timestamps.
                let insert = format!(
                    "INSERT INTO balances (user_id) VALUES ($1) \
                     ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id \
                     RETURNING {BALANCE_COLUMNS}"
                );
                sqlx::query_as::<_, Balance>(&insert)
                    .bind(user_id)
                    .fetch_one(pool)
                    .await
            }
        }
    }

    /// Debit paid coins, reserving them for a payout request.
    ///
    /// The conditional `UPDATE ... WHERE paid_coins >= $n` makes the check
    /// and the decrement one atomic statement: two concurrent submissions
    /// can never both reserve the same coins. Fails with
    /// [`DebitOutcome::Insufficient`] and persists nothing when the balance
    /// is too low.
    pub async fn debit(
        pool: &PgPool,
        user_id: DbId,
        coins: i64,
        reason: &str,
        request_id: Option<DbId>,
    ) -> Result<DebitOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let outcome = Self::debit_with(&mut tx, user_id, coins, reason, request_id).await?;
        match outcome {
            DebitOutcome::Applied(_) => tx.commit().await?,
            DebitOutcome::Insufficient { .. } => tx.rollback().await?,
        }
        Ok(outcome)
    }

    /// Transaction-composable variant of [`debit`](Self::debit).
    ///
    /// On `Insufficient` the caller must roll the transaction back; the
    /// balance row has not been touched but any earlier statements in the
    /// caller's transaction (e.g. the request insert) must be discarded.
    pub async fn debit_with(
        conn: &mut PgConnection,
        user_id: DbId,
        coins: i64,
        reason: &str,
        request_id: Option<DbId>,
    ) -> Result<DebitOutcome, sqlx::Error> {
        sqlx::query("INSERT INTO balances (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        let updated: Option<(i64,)> = sqlx::query_as(
            "UPDATE balances \
             SET paid_coins = paid_coins - $2 \
             WHERE user_id = $1 AND paid_coins >= $2 \
             RETURNING paid_coins",
        )
        .bind(user_id)
        .bind(coins)
        .fetch_optional(&mut *conn)
        .await?;

        let Some((balance_after,)) = updated else {
            let (available,): (i64,) =
                sqlx::query_as("SELECT paid_coins FROM balances WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_one(&mut *conn)
                    .await?;
            return Ok(DebitOutcome::Insufficient { available });
        };

        let insert = format!(
            "INSERT INTO ledger_entries (user_id, delta, coin_type, reason, request_id, balance_after) \
             VALUES ($1, $2, 'paid', $3, $4, $5) \
             RETURNING {ENTRY_COLUMNS}"
        );
        let entry = sqlx::query_as::<_, LedgerEntry>(&insert)
            .bind(user_id)
            .bind(-coins)
            .bind(reason)
            .bind(request_id)
            .bind(balance_after)
            .fetch_one(&mut *conn)
            .await?;

        Ok(DebitOutcome::Applied(entry))
    }

    /// Credit coins to a sub-balance (refunds, earned-coin events).
    pub async fn credit(
        pool: &PgPool,
        user_id: DbId,
        coins: i64,
        coin_type: CoinType,
        reason: &str,
        request_id: Option<DbId>,
    ) -> Result<LedgerEntry, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let entry =
            Self::credit_with(&mut tx, user_id, coins, coin_type, reason, request_id).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Transaction-composable variant of [`credit`](Self::credit).
    ///
    /// Used by the request repo so a refund commits atomically with the
    /// status write that caused it (both or neither).
    pub async fn credit_with(
        conn: &mut PgConnection,
        user_id: DbId,
        coins: i64,
        coin_type: CoinType,
        reason: &str,
        request_id: Option<DbId>,
    ) -> Result<LedgerEntry, sqlx::Error> {
        sqlx::query("INSERT INTO balances (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        let column = match coin_type {
            CoinType::Paid => "paid_coins",
            CoinType::Free => "free_coins",
        };
        let update = format!(
            "UPDATE balances SET {column} = {column} + $2 WHERE user_id = $1 RETURNING {column}"
        );
        let (balance_after,): (i64,) = sqlx::query_as(&update)
            .bind(user_id)
            .bind(coins)
            .fetch_one(&mut *conn)
            .await?;

        let insert = format!(
            "INSERT INTO ledger_entries (user_id, delta, coin_type, reason, request_id, balance_after) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {ENTRY_COLUMNS}"
        );
        sqlx::query_as::<_, LedgerEntry>(&insert)
            .bind(user_id)
            .bind(coins)
            .bind(coin_type.as_str())
            .bind(reason)
            .bind(request_id)
            .bind(balance_after)
            .fetch_one(&mut *conn)
            .await
    }

    /// Entries for a user, newest first.
    pub async fn entries_for_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries \
             WHERE user_id = $1 ORDER BY id DESC LIMIT $2"
        );
        sqlx::query_as::<_, LedgerEntry>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Sum of all entry deltas for one sub-balance.
    ///
    /// Exists for the invariant check `sum(delta) == balance`; production
    /// code reads `balances`, never this aggregate.
    pub async fn sum_entries(
        pool: &PgPool,
        user_id: DbId,
        coin_type: CoinType,
    ) -> Result<i64, sqlx::Error> {
        let (sum,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(delta), 0)::BIGINT FROM ledger_entries \
             WHERE user_id = $1 AND coin_type = $2",
        )
        .bind(user_id)
        .bind(coin_type.as_str())
        .fetch_one(pool)
        .await?;
        Ok(sum)
    }
}
