//! Integration tests for the ledger: balance invariants, atomic debits,
//! and the debit/refund round trip.

use assert_matches::assert_matches;
use sqlx::PgPool;

use glowcast_core::coins::{CoinType, REASON_EARNED, REASON_PAYOUT_RESERVE};
use glowcast_db::repositories::{DebitOutcome, LedgerRepo};

// ---------------------------------------------------------------------------
// Basic credit / debit
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn fresh_user_has_zero_balances(pool: PgPool) {
    let balance = LedgerRepo::balance(&pool, 1).await.unwrap();
    assert_eq!(balance.paid_coins, 0);
    assert_eq!(balance.free_coins, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn credit_raises_balance_and_appends_entry(pool: PgPool) {
    let entry = LedgerRepo::credit(&pool, 1, 10_000, CoinType::Paid, REASON_EARNED, None)
        .await
        .unwrap();
    assert_eq!(entry.delta, 10_000);
    assert_eq!(entry.balance_after, 10_000);

    let balance = LedgerRepo::balance(&pool, 1).await.unwrap();
    assert_eq!(balance.paid_coins, 10_000);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn debit_reserves_and_records_negative_delta(pool: PgPool) {
    LedgerRepo::credit(&pool, 1, 10_000, CoinType::Paid, REASON_EARNED, None)
        .await
        .unwrap();

    let outcome = LedgerRepo::debit(&pool, 1, 7_000, REASON_PAYOUT_RESERVE, None)
        .await
        .unwrap();
    let entry = assert_matches!(outcome, DebitOutcome::Applied(entry) => entry);
    assert_eq!(entry.delta, -7_000);
    assert_eq!(entry.balance_after, 3_000);

    let balance = LedgerRepo::balance(&pool, 1).await.unwrap();
    assert_eq!(balance.paid_coins, 3_000);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn overdraft_is_rejected_and_persists_nothing(pool: PgPool) {
    LedgerRepo::credit(&pool, 1, 5_000, CoinType::Paid, REASON_EARNED, None)
        .await
        .unwrap();

    let outcome = LedgerRepo::debit(&pool, 1, 7_000, REASON_PAYOUT_RESERVE, None)
        .await
        .unwrap();
    assert_matches!(outcome, DebitOutcome::Insufficient { available: 5_000 });

    // Balance untouched, no entry appended.
    let balance = LedgerRepo::balance(&pool, 1).await.unwrap();
    assert_eq!(balance.paid_coins, 5_000);
    let entries = LedgerRepo::entries_for_user(&pool, 1, 50).await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn free_coins_are_not_debitable(pool: PgPool) {
    LedgerRepo::credit(&pool, 1, 50_000, CoinType::Free, REASON_EARNED, None)
        .await
        .unwrap();

    // Debit only touches the paid sub-balance.
    let outcome = LedgerRepo::debit(&pool, 1, 7_000, REASON_PAYOUT_RESERVE, None)
        .await
        .unwrap();
    assert_matches!(outcome, DebitOutcome::Insufficient { available: 0 });
}

// ---------------------------------------------------------------------------
// Invariant: sum(deltas) == balance
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn entry_sum_equals_balance_after_mixed_activity(pool: PgPool) {
    LedgerRepo::credit(&pool, 1, 20_000, CoinType::Paid, REASON_EARNED, None)
        .await
        .unwrap();
    LedgerRepo::debit(&pool, 1, 7_000, REASON_PAYOUT_RESERVE, None)
        .await
        .unwrap();
    LedgerRepo::credit(&pool, 1, 7_000, CoinType::Paid, "payout_refund", None)
        .await
        .unwrap();
    LedgerRepo::debit(&pool, 1, 9_000, REASON_PAYOUT_RESERVE, None)
        .await
        .unwrap();

    let balance = LedgerRepo::balance(&pool, 1).await.unwrap();
    let sum = LedgerRepo::sum_entries(&pool, 1, CoinType::Paid).await.unwrap();
    assert_eq!(balance.paid_coins, sum);
    assert_eq!(balance.paid_coins, 11_000);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn debit_then_refund_restores_exact_balance(pool: PgPool) {
    LedgerRepo::credit(&pool, 1, 10_000, CoinType::Paid, REASON_EARNED, None)
        .await
        .unwrap();

    LedgerRepo::debit(&pool, 1, 7_000, REASON_PAYOUT_RESERVE, None)
        .await
        .unwrap();
    LedgerRepo::credit(&pool, 1, 7_000, CoinType::Paid, "payout_refund", None)
        .await
        .unwrap();

    let balance = LedgerRepo::balance(&pool, 1).await.unwrap();
    assert_eq!(balance.paid_coins, 10_000);
}

// ---------------------------------------------------------------------------
// Concurrency: at-most-one reservation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_debits_cannot_both_reserve(pool: PgPool) {
    LedgerRepo::credit(&pool, 1, 10_000, CoinType::Paid, REASON_EARNED, None)
        .await
        .unwrap();

    // Two 6,000-coin reservations against a 10,000 balance: exactly one
    // must win, whatever the interleaving.
    let (a, b) = tokio::join!(
        LedgerRepo::debit(&pool, 1, 6_000, REASON_PAYOUT_RESERVE, None),
        LedgerRepo::debit(&pool, 1, 6_000, REASON_PAYOUT_RESERVE, None),
    );

    let applied = [a.unwrap(), b.unwrap()]
        .iter()
        .filter(|o| matches!(o, DebitOutcome::Applied(_)))
        .count();
    assert_eq!(applied, 1, "exactly one concurrent reservation may win");

    let balance = LedgerRepo::balance(&pool, 1).await.unwrap();
    assert_eq!(balance.paid_coins, 4_000);

    let sum = LedgerRepo::sum_entries(&pool, 1, CoinType::Paid).await.unwrap();
    assert_eq!(sum, balance.paid_coins);
}
