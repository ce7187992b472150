//! End-to-end engine scenarios against the mock payout partner.

use std::sync::Arc;

use assert_matches::assert_matches;
use sqlx::PgPool;

use glowcast_core::coins::{CoinType, REASON_EARNED};
use glowcast_core::error::CoreError;
use glowcast_db::models::payout_request::SubmitPayout;
use glowcast_db::models::status::{PayoutRequestStatus, PayoutRunStatus};
use glowcast_db::repositories::{
    FulfillmentRepo, LedgerRepo, PayoutRequestRepo, PayoutRunRepo, ThresholdRepo,
};
use glowcast_engine::{batch, reconcile, refund, requests, EngineContext};
use glowcast_events::EventBus;
use glowcast_provider::{ItemOutcome, ItemStatus, MockProvider};

async fn make_ctx(pool: &PgPool) -> (EngineContext, Arc<MockProvider>) {
    let provider = Arc::new(MockProvider::new());
    let thresholds = ThresholdRepo::detect(pool).await.unwrap();
    let ctx = EngineContext::new(
        pool.clone(),
        Arc::clone(&provider) as Arc<dyn glowcast_provider::PayoutProvider>,
        thresholds,
        Arc::new(EventBus::default()),
        "tango".to_string(),
    );
    (ctx, provider)
}

async fn seed(pool: &PgPool, user_id: i64, coins: i64) {
    LedgerRepo::credit(pool, user_id, coins, CoinType::Paid, REASON_EARNED, None)
        .await
        .unwrap();
}

fn direct(user_id: i64, coins: i64) -> SubmitPayout {
    SubmitPayout {
        user_id,
        coins,
        method: "direct".to_string(),
        destination: format!("user-{user_id}@example.com"),
    }
}

async fn paid_coins(pool: &PgPool, user_id: i64) -> i64 {
    LedgerRepo::balance(pool, user_id).await.unwrap().paid_coins
}

// ---------------------------------------------------------------------------
// Scenario A: submit then deny restores the balance
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn submit_then_deny_round_trips_the_balance(pool: PgPool) {
    let (ctx, _) = make_ctx(&pool).await;
    seed(&pool, 1, 10_000).await;

    let request = requests::submit(&ctx, &direct(1, 7_000)).await.unwrap();
    assert_eq!(request.status_id, PayoutRequestStatus::Pending.id());
    assert_eq!(request.usd_cents, 2_100);
    assert_eq!(paid_coins(&pool, 1).await, 3_000);

    let denied = requests::deny(&ctx, request.id, 99, "W-9 not on file").await.unwrap();
    assert_eq!(denied.status_id, PayoutRequestStatus::Denied.id());
    assert_eq!(paid_coins(&pool, 1).await, 10_000);
}

// ---------------------------------------------------------------------------
// Scenario B: concurrent submissions reserve at most once
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_submissions_reserve_at_most_once(pool: PgPool) {
    let (ctx, _) = make_ctx(&pool).await;
    seed(&pool, 1, 10_000).await;

    // Two 7,000-coin submissions against 10,000: exactly one succeeds.
    // (7,000 is also the business minimum, so both pass validation.)
    let req_a = direct(1, 7_000);
    let req_b = direct(1, 7_000);
    let (a, b) = tokio::join!(
        requests::submit(&ctx, &req_a),
        requests::submit(&ctx, &req_b),
    );

    let outcomes = [a, b];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one submission may reserve");
    let loss = outcomes.into_iter().find(|r| r.is_err()).unwrap();
    assert_matches!(loss, Err(CoreError::InsufficientBalance { available: 3_000, .. }));

    assert_eq!(paid_coins(&pool, 1).await, 3_000);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn below_minimum_submission_is_rejected_synchronously(pool: PgPool) {
    let (ctx, _) = make_ctx(&pool).await;
    seed(&pool, 1, 10_000).await;

    let result = requests::submit(&ctx, &direct(1, 6_999)).await;
    assert_matches!(result, Err(CoreError::Validation(_)));
    assert_eq!(paid_coins(&pool, 1).await, 10_000);
}

// ---------------------------------------------------------------------------
// Scenario C: successful batch settlement
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn successful_run_fulfills_and_records_threshold(pool: PgPool) {
    let (ctx, provider) = make_ctx(&pool).await;
    seed(&pool, 1, 10_000).await;

    let request = requests::submit(&ctx, &direct(1, 7_000)).await.unwrap();
    requests::approve(&ctx, request.id, 99).await.unwrap();

    let report = batch::run_batch(&ctx).await.unwrap().expect("one eligible request");
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.run.status_id, PayoutRunStatus::Completed.id());

    let settled = PayoutRequestRepo::find_by_id(&pool, request.id).await.unwrap().unwrap();
    assert_eq!(settled.status_id, PayoutRequestStatus::Fulfilled.id());

    // $21.00 recorded for the year.
    let year = chrono::Datelike::year(&chrono::Utc::now());
    let record = ctx.thresholds.find(&pool, 1, year).await.unwrap().unwrap();
    assert_eq!(record.total_paid_usd_cents, 2_100);

    // One real payment at the partner.
    assert_eq!(provider.payments().len(), 1);

    // Reserved coins are gone for good.
    assert_eq!(paid_coins(&pool, 1).await, 3_000);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn empty_trigger_is_a_no_op(pool: PgPool) {
    let (ctx, provider) = make_ctx(&pool).await;
    assert!(batch::run_batch(&ctx).await.unwrap().is_none());
    assert!(provider.submissions().is_empty());
}

// ---------------------------------------------------------------------------
// Scenario D: provider failure refunds and leaves the threshold untouched
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn failed_item_refunds_and_skips_threshold(pool: PgPool) {
    let (ctx, provider) = make_ctx(&pool).await;
    seed(&pool, 1, 10_000).await;
    provider.fail_destination("user-1@example.com", "RECEIVER_INVALID");

    let request = requests::submit(&ctx, &direct(1, 7_000)).await.unwrap();
    requests::approve(&ctx, request.id, 99).await.unwrap();

    let report = batch::run_batch(&ctx).await.unwrap().unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.run.status_id, PayoutRunStatus::Failed.id());

    let failed = PayoutRequestRepo::find_by_id(&pool, request.id).await.unwrap().unwrap();
    assert_eq!(failed.status_id, PayoutRequestStatus::Failed.id());

    // Coins restored; no threshold record; no payment made.
    assert_eq!(paid_coins(&pool, 1).await, 10_000);
    let year = chrono::Datelike::year(&chrono::Utc::now());
    assert!(ctx.thresholds.find(&pool, 1, year).await.unwrap().is_none());
    assert!(provider.payments().is_empty());

    // Failure reason was mapped through the taxonomy.
    let items = PayoutRunRepo::items_for_run(&pool, report.run.id).await.unwrap();
    assert_eq!(items[0].failure_reason.as_deref(), Some("invalid_destination"));
}

// ---------------------------------------------------------------------------
// Scenario E: holds gate batch pickup
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn held_request_skips_batch_until_released(pool: PgPool) {
    let (ctx, _) = make_ctx(&pool).await;
    seed(&pool, 1, 10_000).await;

    let request = requests::submit(&ctx, &direct(1, 7_000)).await.unwrap();
    requests::hold(&ctx, request.id, 99, "manual KYC check", None).await.unwrap();
    requests::approve(&ctx, request.id, 99).await.unwrap();

    // Approved but held: the scheduled batch must skip it.
    assert!(batch::run_batch(&ctx).await.unwrap().is_none());

    // Released: the following batch picks it up.
    requests::release(&ctx, request.id, 99).await.unwrap();
    let report = batch::run_batch(&ctx).await.unwrap().expect("released request is eligible");
    assert_eq!(report.succeeded, 1);
}

// ---------------------------------------------------------------------------
// Idempotent dispatch & crash recovery
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn interrupted_dispatch_retries_without_double_payment(pool: PgPool) {
    let (ctx, provider) = make_ctx(&pool).await;
    seed(&pool, 1, 10_000).await;

    let request = requests::submit(&ctx, &direct(1, 7_000)).await.unwrap();
    requests::approve(&ctx, request.id, 99).await.unwrap();

    // The submission dies in transit: items stay queued, run stays open.
    provider.set_fail_submission(true);
    let report = batch::run_batch(&ctx).await.unwrap().unwrap();
    assert_eq!(report.succeeded + report.failed, 0);
    assert_eq!(report.run.status_id, PayoutRunStatus::Processing.id());

    // First retry settles; a second retry finds nothing to resubmit.
    provider.set_fail_submission(false);
    let retry = batch::retry_run(&ctx, report.run.id).await.unwrap();
    assert_eq!(retry.succeeded, 1);
    let retry_again = batch::retry_run(&ctx, report.run.id).await.unwrap();
    assert_eq!(retry_again.direct_items, 0);

    // The partner saw multiple submissions but paid exactly once.
    assert!(provider.submissions().len() >= 2);
    assert_eq!(provider.payments().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn replayed_callback_settles_exactly_once(pool: PgPool) {
    let (ctx, provider) = make_ctx(&pool).await;
    seed(&pool, 1, 10_000).await;
    provider.pend_destination("user-1@example.com");

    let request = requests::submit(&ctx, &direct(1, 7_000)).await.unwrap();
    requests::approve(&ctx, request.id, 99).await.unwrap();

    let report = batch::run_batch(&ctx).await.unwrap().unwrap();
    assert_eq!(report.pending, 1);

    let run = PayoutRunRepo::find_by_id(&pool, report.run.id).await.unwrap().unwrap();
    let batch_id = run.provider_batch_id.clone().expect("batch was acknowledged");
    let items = PayoutRunRepo::items_for_run(&pool, run.id).await.unwrap();

    let callback = vec![ItemOutcome {
        idempotency_key: items[0].idempotency_key.clone(),
        provider_item_id: items[0].provider_item_id.clone(),
        status: ItemStatus::Succeeded,
        failure_code: None,
    }];

    let first = reconcile::ingest_callback(&ctx, &batch_id, &callback)
        .await
        .unwrap()
        .expect("known batch");
    assert_eq!(first.succeeded, 1);

    // Replay: fully absorbed.
    let replay = reconcile::ingest_callback(&ctx, &batch_id, &callback)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(replay.succeeded, 0);

    let year = chrono::Datelike::year(&chrono::Utc::now());
    let record = ctx.thresholds.find(&pool, 1, year).await.unwrap().unwrap();
    assert_eq!(record.total_paid_usd_cents, 2_100, "no double counting on replay");
    assert_eq!(record.payout_count, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn callback_for_unknown_batch_is_rejected(pool: PgPool) {
    let (ctx, _) = make_ctx(&pool).await;
    let result = reconcile::ingest_callback(&ctx, "not-a-batch", &[]).await.unwrap();
    assert!(result.is_none());
}

// ---------------------------------------------------------------------------
// Gift-card path
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn gift_card_requests_stage_fulfillments_and_wait(pool: PgPool) {
    let (ctx, provider) = make_ctx(&pool).await;
    seed(&pool, 1, 10_000).await;

    let input = SubmitPayout {
        user_id: 1,
        coins: 7_000,
        method: "gift_card".to_string(),
        destination: "user-1@example.com".to_string(),
    };
    let request = requests::submit(&ctx, &input).await.unwrap();
    requests::approve(&ctx, request.id, 99).await.unwrap();

    let report = batch::run_batch(&ctx).await.unwrap().unwrap();
    assert_eq!(report.gift_card_items, 1);
    assert_eq!(report.direct_items, 0);
    // Never dispatched to the payments partner.
    assert!(provider.submissions().is_empty());
    // The run waits for the human.
    assert_eq!(report.run.status_id, PayoutRunStatus::Processing.id());

    let staged = FulfillmentRepo::list_pending(&pool).await.unwrap();
    assert_eq!(staged.len(), 1);
    assert_eq!(staged[0].request_id, request.id);
    assert_eq!(staged[0].amount_usd_cents, 2_100);
    assert_eq!(staged[0].provider, "tango");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sweep_leaves_gift_card_runs_to_the_fulfillment_queue(pool: PgPool) {
    let (ctx, _) = make_ctx(&pool).await;
    seed(&pool, 1, 10_000).await;

    let input = SubmitPayout {
        user_id: 1,
        coins: 7_000,
        method: "gift_card".to_string(),
        destination: "user-1@example.com".to_string(),
    };
    let request = requests::submit(&ctx, &input).await.unwrap();
    requests::approve(&ctx, request.id, 99).await.unwrap();
    let report = batch::run_batch(&ctx).await.unwrap().unwrap();

    sqlx::query("UPDATE payout_runs SET started_at = NOW() - INTERVAL '3 hours' WHERE id = $1")
        .bind(report.run.id)
        .execute(&pool)
        .await
        .unwrap();

    let sweep = reconcile::sweep(&ctx, 2).await.unwrap();
    assert_eq!(sweep.runs_waiting_on_fulfillment, 1);
    assert_eq!(sweep.runs_escalated, 0, "waiting on a human is not stuck");
}

// ---------------------------------------------------------------------------
// Refund sweep
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn refund_sweep_unwinds_unacknowledged_items_only(pool: PgPool) {
    let (ctx, provider) = make_ctx(&pool).await;
    seed(&pool, 1, 10_000).await;

    let request = requests::submit(&ctx, &direct(1, 7_000)).await.unwrap();
    requests::approve(&ctx, request.id, 99).await.unwrap();

    provider.set_fail_submission(true);
    let report = batch::run_batch(&ctx).await.unwrap().unwrap();

    let sweep = refund::refund_run(&ctx, report.run.id, 99).await.unwrap();
    assert_eq!(sweep.refunded, 1);
    assert_eq!(sweep.skipped_acknowledged, 0);

    // Coins restored; the run is closed failed; request can be requeued.
    assert_eq!(paid_coins(&pool, 1).await, 10_000);
    let run = PayoutRunRepo::find_by_id(&pool, report.run.id).await.unwrap().unwrap();
    assert_eq!(run.status_id, PayoutRunStatus::Failed.id());
    let req = PayoutRequestRepo::find_by_id(&pool, request.id).await.unwrap().unwrap();
    assert_eq!(req.status_id, PayoutRequestStatus::Failed.id());
}

// ---------------------------------------------------------------------------
// Reconciliation sweep
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn sweep_escalates_unacknowledged_runs_without_guessing(pool: PgPool) {
    let (ctx, provider) = make_ctx(&pool).await;
    seed(&pool, 1, 10_000).await;

    let request = requests::submit(&ctx, &direct(1, 7_000)).await.unwrap();
    requests::approve(&ctx, request.id, 99).await.unwrap();

    provider.set_fail_submission(true);
    let report = batch::run_batch(&ctx).await.unwrap().unwrap();

    // Age the run past the stale window.
    sqlx::query("UPDATE payout_runs SET started_at = NOW() - INTERVAL '3 hours' WHERE id = $1")
        .bind(report.run.id)
        .execute(&pool)
        .await
        .unwrap();

    let sweep = reconcile::sweep(&ctx, 2).await.unwrap();
    assert_eq!(sweep.runs_examined, 1);
    assert_eq!(sweep.runs_escalated, 1);
    assert_eq!(sweep.runs_resolved, 0);

    // Nothing was auto-resolved: items still queued, request still processing.
    let req = PayoutRequestRepo::find_by_id(&pool, request.id).await.unwrap().unwrap();
    assert_eq!(req.status_id, PayoutRequestStatus::Processing.id());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sweep_resolves_runs_the_partner_can_account_for(pool: PgPool) {
    let (ctx, provider) = make_ctx(&pool).await;
    seed(&pool, 1, 10_000).await;
    provider.pend_destination("user-1@example.com");

    let request = requests::submit(&ctx, &direct(1, 7_000)).await.unwrap();
    requests::approve(&ctx, request.id, 99).await.unwrap();
    let report = batch::run_batch(&ctx).await.unwrap().unwrap();
    assert_eq!(report.pending, 1);

    // The partner settles the item after the fact; clear the script so the
    // recorded batch poll now reports success.
    let run = PayoutRunRepo::find_by_id(&pool, report.run.id).await.unwrap().unwrap();
    let batch_id = run.provider_batch_id.clone().unwrap();
    let items = PayoutRunRepo::items_for_run(&pool, run.id).await.unwrap();
    let settled = glowcast_provider::BatchOutcome {
        provider_batch_id: batch_id.clone(),
        items: vec![ItemOutcome {
            idempotency_key: items[0].idempotency_key.clone(),
            provider_item_id: items[0].provider_item_id.clone(),
            status: ItemStatus::Succeeded,
            failure_code: None,
        }],
    };
    provider.record_batch(settled);

    sqlx::query("UPDATE payout_runs SET started_at = NOW() - INTERVAL '3 hours' WHERE id = $1")
        .bind(run.id)
        .execute(&pool)
        .await
        .unwrap();

    let sweep = reconcile::sweep(&ctx, 2).await.unwrap();
    assert_eq!(sweep.runs_resolved, 1);

    let req = PayoutRequestRepo::find_by_id(&pool, request.id).await.unwrap().unwrap();
    assert_eq!(req.status_id, PayoutRequestStatus::Fulfilled.id());
}
