//! Batch run creation and dispatch.
//!
//! The ordering here is the crash-safety contract of the whole engine:
//!
//! 1. Select eligible requests, create the run + items, flip requests to
//!    `processing`: one transaction, **committed before** any network I/O.
//! 2. Call the partner with the full batch, outside any transaction.
//! 3. Apply per-item outcomes, each in its own idempotent transaction.
//! 4. Close the run once no item is left `queued`.
//!
//! A crash between 1 and 3 leaves queued items with no `provider_item_id`;
//! the reconciliation sweep or a retry resubmits them under the same
//! idempotency keys, which the partner deduplicates.

use chrono::{Datelike, Utc};
use serde_json::json;

use glowcast_core::dispatch::DispatchFailure;
use glowcast_core::error::CoreError;
use glowcast_core::payout::METHOD_GIFT_CARD;
use glowcast_core::types::DbId;

use glowcast_db::models::payout_run::{PayoutItem, PayoutRun};
use glowcast_db::repositories::{FulfillmentRepo, PayoutRunRepo};
use glowcast_events::PlatformEvent;
use glowcast_provider::{BatchItem, BatchSubmission, ItemOutcome, ItemStatus};

use crate::context::EngineContext;

/// What a trigger accomplished, for logs and the API response.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunReport {
    pub run: PayoutRun,
    pub direct_items: usize,
    pub gift_card_items: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pending: usize,
}

/// Trigger a payout run over all currently eligible requests.
///
/// Returns `Ok(None)` when nothing is eligible (no empty run row is ever
/// created). Both the worker cron and `POST /payout-runs` land here.
pub async fn run_batch(ctx: &EngineContext) -> Result<Option<RunReport>, CoreError> {
    let Some((run, items, requests)) = PayoutRunRepo::create_with_items(&ctx.pool)
        .await
        .map_err(internal)?
    else {
        tracing::debug!("Batch trigger found no eligible requests");
        return Ok(None);
    };

    tracing::info!(
        run_id = run.id,
        total_payouts = run.total_payouts,
        total_usd_cents = run.total_usd_cents,
        "Payout run created"
    );
    ctx.bus.publish(
        PlatformEvent::new("run.started")
            .with_source("payout_run", run.id)
            .with_payload(json!({
                "total_payouts": run.total_payouts,
                "total_coins": run.total_coins,
                "total_usd_cents": run.total_usd_cents,
            })),
    );

    // Split by settlement strategy. Gift-card items never reach the
    // partner: a fulfillment row is staged and the item stays queued until
    // an operator settles it.
    let gift_card_requests: std::collections::HashSet<DbId> = requests
        .iter()
        .filter(|r| r.method == METHOD_GIFT_CARD)
        .map(|r| r.id)
        .collect();

    let (gift_items, direct_items): (Vec<&PayoutItem>, Vec<&PayoutItem>) = items
        .iter()
        .partition(|item| gift_card_requests.contains(&item.request_id));

    for item in &gift_items {
        let fulfillment = FulfillmentRepo::stage(
            &ctx.pool,
            item.request_id,
            &ctx.gift_card_provider,
            item.amount_usd_cents,
        )
        .await
        .map_err(internal)?;
        ctx.bus.publish(
            PlatformEvent::new("fulfillment.staged")
                .with_source("gift_card_fulfillment", fulfillment.id)
                .with_payload(json!({
                    "request_id": item.request_id,
                    "amount_usd_cents": item.amount_usd_cents,
                })),
        );
    }

    let mut report = RunReport {
        run,
        direct_items: direct_items.len(),
        gift_card_items: gift_items.len(),
        succeeded: 0,
        failed: 0,
        pending: 0,
    };

    if !direct_items.is_empty() {
        let stats = dispatch_items(ctx, report.run.id, &direct_items).await?;
        report.succeeded = stats.succeeded;
        report.failed = stats.failed;
        report.pending = stats.pending;
    }

    if let Some(closed) = close_run(ctx, report.run.id).await? {
        report.run = closed;
    }

    Ok(Some(report))
}

/// Retry a run whose dispatch never completed: resubmit only items the
/// partner never acknowledged, under their original idempotency keys.
/// Already-settled items are untouched by construction.
pub async fn retry_run(ctx: &EngineContext, run_id: DbId) -> Result<RunReport, CoreError> {
    let Some(run) = PayoutRunRepo::find_by_id(&ctx.pool, run_id)
        .await
        .map_err(internal)?
    else {
        return Err(CoreError::NotFound {
            entity: "PayoutRun",
            id: run_id,
        });
    };

    let resubmittable = PayoutRunRepo::resubmittable_items(&ctx.pool, run_id)
        .await
        .map_err(internal)?;

    let mut report = RunReport {
        run,
        direct_items: resubmittable.len(),
        gift_card_items: 0,
        succeeded: 0,
        failed: 0,
        pending: 0,
    };

    if resubmittable.is_empty() {
        tracing::info!(run_id, "Retry requested but no unacknowledged items remain");
        return Ok(report);
    }

    let refs: Vec<&PayoutItem> = resubmittable.iter().collect();
    let stats = dispatch_items(ctx, run_id, &refs).await?;
    report.succeeded = stats.succeeded;
    report.failed = stats.failed;
    report.pending = stats.pending;

    if let Some(closed) = close_run(ctx, run_id).await? {
        report.run = closed;
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Dispatch internals (shared with reconciliation)
// ---------------------------------------------------------------------------

/// Per-dispatch outcome counters.
#[derive(Debug, Default)]
pub struct OutcomeStats {
    pub succeeded: usize,
    pub failed: usize,
    pub pending: usize,
    pub returned: usize,
    pub unknown: usize,
}

/// Submit items to the partner and apply what it reports.
///
/// A transport-level failure is absorbed: the items stay `queued`, the run
/// stays `processing`, and a warning alert is raised for the operators.
/// Money may or may not have moved; only the callback or the
/// reconciliation sweep may decide.
async fn dispatch_items(
    ctx: &EngineContext,
    run_id: DbId,
    items: &[&PayoutItem],
) -> Result<OutcomeStats, CoreError> {
    let submission = BatchSubmission {
        client_batch_ref: format!("gc-run-{run_id}-{}", uuid::Uuid::new_v4()),
        items: items
            .iter()
            .map(|item| BatchItem {
                idempotency_key: item.idempotency_key.clone(),
                destination: item.destination.clone(),
                amount_usd_cents: item.amount_usd_cents,
                currency: "USD".to_string(),
            })
            .collect(),
    };

    let outcome = match ctx.provider.submit_batch(&submission).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(run_id, error = %e, "Batch dispatch did not complete");
            ctx.bus.publish(
                PlatformEvent::new("run.dispatch_unacknowledged")
                    .with_source("payout_run", run_id)
                    .with_payload(json!({ "error": e.to_string() })),
            );
            return Ok(OutcomeStats::default());
        }
    };

    PayoutRunRepo::set_provider_batch(&ctx.pool, run_id, &outcome.provider_batch_id)
        .await
        .map_err(internal)?;

    apply_outcomes(ctx, &outcome.items).await
}

/// Apply partner-reported per-item outcomes. Fully replayable: every write
/// is an item-level CAS that no-ops when the item already settled.
pub async fn apply_outcomes(
    ctx: &EngineContext,
    outcomes: &[ItemOutcome],
) -> Result<OutcomeStats, CoreError> {
    let year = Utc::now().year();
    let mut stats = OutcomeStats::default();

    for outcome in outcomes {
        let Some(item) =
            PayoutRunRepo::find_item_by_idempotency_key(&ctx.pool, &outcome.idempotency_key)
                .await
                .map_err(internal)?
        else {
            tracing::warn!(
                idempotency_key = %outcome.idempotency_key,
                "Partner reported an item we do not know; ignoring"
            );
            stats.unknown += 1;
            continue;
        };

        match outcome.status {
            ItemStatus::Succeeded => {
                let applied = PayoutRunRepo::apply_item_success(
                    &ctx.pool,
                    &ctx.thresholds,
                    item.id,
                    outcome.provider_item_id.as_deref(),
                    year,
                )
                .await
                .map_err(internal)?;
                if let Some((item, request, record)) = applied {
                    stats.succeeded += 1;
                    ctx.bus.publish(
                        PlatformEvent::new("item.succeeded")
                            .with_source("payout_request", request.id)
                            .with_payload(json!({
                                "run_id": item.run_id,
                                "amount_usd_cents": item.amount_usd_cents,
                                "requires_1099": record.requires_1099,
                            })),
                    );
                }
            }
            ItemStatus::Failed => {
                let failure = outcome
                    .failure_code
                    .as_deref()
                    .map(DispatchFailure::from_provider_code)
                    .unwrap_or(DispatchFailure::Unknown);
                let applied = PayoutRunRepo::apply_item_failure(
                    &ctx.pool,
                    item.id,
                    outcome.provider_item_id.as_deref(),
                    failure.as_str(),
                )
                .await
                .map_err(internal)?;
                if let Some((item, request, _refund)) = applied {
                    stats.failed += 1;
                    tracing::warn!(
                        request_id = request.id,
                        run_id = item.run_id,
                        failure = failure.as_str(),
                        "Payout item failed, coins refunded"
                    );
                    ctx.bus.publish(
                        PlatformEvent::new("item.failed")
                            .with_source("payout_request", request.id)
                            .with_payload(json!({
                                "run_id": item.run_id,
                                "failure_reason": failure.as_str(),
                                "retryable": failure.is_retryable(),
                            })),
                    );
                }
            }
            ItemStatus::Pending => {
                if let Some(provider_item_id) = outcome.provider_item_id.as_deref() {
                    PayoutRunRepo::set_provider_item(&ctx.pool, item.id, provider_item_id)
                        .await
                        .map_err(internal)?;
                }
                stats.pending += 1;
            }
            ItemStatus::Returned => {
                let applied = PayoutRunRepo::apply_item_returned(
                    &ctx.pool,
                    &ctx.thresholds,
                    item.id,
                    DispatchFailure::Returned.as_str(),
                    year,
                )
                .await
                .map_err(internal)?;
                if let Some((item, request)) = applied {
                    stats.returned += 1;
                    ctx.bus.publish(
                        PlatformEvent::new("item.returned")
                            .with_source("payout_request", request.id)
                            .with_payload(json!({ "run_id": item.run_id })),
                    );
                }
            }
        }
    }

    Ok(stats)
}

/// Close the run if every item settled, publishing the terminal event.
pub async fn close_run(ctx: &EngineContext, run_id: DbId) -> Result<Option<PayoutRun>, CoreError> {
    let closed = PayoutRunRepo::close_if_settled(&ctx.pool, run_id)
        .await
        .map_err(internal)?;
    if let Some(run) = &closed {
        use glowcast_db::models::status::PayoutRunStatus;
        let event_type = if run.status_id == PayoutRunStatus::Completed.id() {
            "run.completed"
        } else {
            "run.failed"
        };
        tracing::info!(run_id, status = event_type, "Payout run closed");
        ctx.bus.publish(
            PlatformEvent::new(event_type)
                .with_source("payout_run", run.id)
                .with_payload(json!({
                    "total_payouts": run.total_payouts,
                    "total_usd_cents": run.total_usd_cents,
                })),
        );
    }
    Ok(closed)
}

fn internal(e: sqlx::Error) -> CoreError {
    CoreError::Internal(e.to_string())
}
