//! Integration tests for threshold records: additive updates, the sticky
//! 1099 latch, and the legacy-schema adapter.

use sqlx::PgPool;

use glowcast_db::repositories::{ThresholdRepo, ThresholdSchema};

async fn record(pool: &PgPool, repo: &ThresholdRepo, user: i64, year: i32, cents: i64) {
    let mut tx = pool.begin().await.unwrap();
    repo.record_success_with(&mut tx, user, year, cents).await.unwrap();
    tx.commit().await.unwrap();
}

// ---------------------------------------------------------------------------
// Additive updates
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn totals_accumulate_additively(pool: PgPool) {
    let repo = ThresholdRepo::detect(&pool).await.unwrap();
    assert_eq!(repo.schema(), ThresholdSchema::V2);

    record(&pool, &repo, 1, 2026, 2_100).await;
    record(&pool, &repo, 1, 2026, 3_000).await;

    let rec = repo.find(&pool, 1, 2026).await.unwrap().unwrap();
    assert_eq!(rec.total_paid_usd_cents, 5_100);
    assert_eq!(rec.payout_count, 2);
    assert!(!rec.requires_1099);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn years_are_tracked_independently(pool: PgPool) {
    let repo = ThresholdRepo::detect(&pool).await.unwrap();
    record(&pool, &repo, 1, 2025, 59_000).await;
    record(&pool, &repo, 1, 2026, 2_100).await;

    assert_eq!(
        repo.find(&pool, 1, 2025).await.unwrap().unwrap().total_paid_usd_cents,
        59_000
    );
    assert_eq!(
        repo.find(&pool, 1, 2026).await.unwrap().unwrap().total_paid_usd_cents,
        2_100
    );
}

// ---------------------------------------------------------------------------
// The sticky latch
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn latch_sets_when_cumulative_total_crosses_600(pool: PgPool) {
    let repo = ThresholdRepo::detect(&pool).await.unwrap();

    record(&pool, &repo, 1, 2026, 59_999).await;
    assert!(!repo.find(&pool, 1, 2026).await.unwrap().unwrap().requires_1099);

    record(&pool, &repo, 1, 2026, 1).await;
    assert!(repo.find(&pool, 1, 2026).await.unwrap().unwrap().requires_1099);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn latch_survives_downward_correction(pool: PgPool) {
    let repo = ThresholdRepo::detect(&pool).await.unwrap();
    record(&pool, &repo, 1, 2026, 75_000).await;

    let mut tx = pool.begin().await.unwrap();
    let rec = repo.record_correction_with(&mut tx, 1, 2026, -75_000).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(rec.total_paid_usd_cents, 0);
    assert!(rec.requires_1099, "regulatory status must not silently disappear");
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn report_orders_by_total_descending(pool: PgPool) {
    let repo = ThresholdRepo::detect(&pool).await.unwrap();
    record(&pool, &repo, 1, 2026, 2_000).await;
    record(&pool, &repo, 2, 2026, 90_000).await;
    record(&pool, &repo, 3, 2026, 40_000).await;
    record(&pool, &repo, 4, 2025, 99_000).await;

    let report = repo.report_for_year(&pool, 2026).await.unwrap();
    let users: Vec<i64> = report.iter().map(|r| r.user_id).collect();
    assert_eq!(users, vec![2, 3, 1]);
    assert!(report[0].requires_1099);
    assert!(!report[2].requires_1099);
}

// ---------------------------------------------------------------------------
// Legacy schema adapter
// ---------------------------------------------------------------------------

/// Recreate the pre-migration deployment shape: `creator_payout_totals`
/// exists, `threshold_records` does not.
async fn install_legacy_schema(pool: &PgPool) {
    sqlx::query("DROP TABLE threshold_records")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE creator_payout_totals ( \
             id BIGSERIAL PRIMARY KEY, \
             user_id BIGINT NOT NULL, \
             year INTEGER NOT NULL, \
             total_cents BIGINT NOT NULL DEFAULT 0, \
             payouts INTEGER NOT NULL DEFAULT 0, \
             needs_1099 BOOLEAN NOT NULL DEFAULT FALSE, \
             last_paid_at TIMESTAMPTZ, \
             created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
             updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
             CONSTRAINT uq_creator_payout_totals_user_year UNIQUE (user_id, year) \
         )",
    )
    .execute(pool)
    .await
    .unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn probe_selects_legacy_adapter_when_v2_is_absent(pool: PgPool) {
    install_legacy_schema(&pool).await;

    let repo = ThresholdRepo::detect(&pool).await.unwrap();
    assert_eq!(repo.schema(), ThresholdSchema::V1Legacy);

    // Same behaviour through the v1 adapter, including the latch.
    record(&pool, &repo, 1, 2026, 61_000).await;
    let rec = repo.find(&pool, 1, 2026).await.unwrap().unwrap();
    assert_eq!(rec.total_paid_usd_cents, 61_000);
    assert_eq!(rec.payout_count, 1);
    assert!(rec.requires_1099);

    let report = repo.report_for_year(&pool, 2026).await.unwrap();
    assert_eq!(report.len(), 1);
}
