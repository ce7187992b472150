//! Reconciliation: provider callbacks and the stuck-run sweep.
//!
//! Both paths converge on [`batch::apply_outcomes`], which is replayable
//! by construction, so a webhook delivered twice or a sweep racing a
//! callback cannot double-settle anything.
//!
//! The sweep never guesses: a run the partner cannot account for is
//! escalated with a critical alert and left exactly as it is.

use chrono::{Duration, Utc};
use serde_json::json;

use glowcast_core::error::CoreError;

use glowcast_db::models::payout_run::PayoutRun;
use glowcast_db::repositories::{FulfillmentRepo, PayoutRunRepo};
use glowcast_events::PlatformEvent;
use glowcast_provider::ItemOutcome;

use crate::batch::{apply_outcomes, close_run, OutcomeStats};
use crate::context::EngineContext;

/// Ingest a partner callback for one batch.
///
/// Returns `Ok(None)` for an unknown batch id (the handler answers 404);
/// otherwise applies the outcomes and returns the stats. Safe to replay.
pub async fn ingest_callback(
    ctx: &EngineContext,
    provider_batch_id: &str,
    outcomes: &[ItemOutcome],
) -> Result<Option<OutcomeStats>, CoreError> {
    let Some(run) = PayoutRunRepo::find_by_provider_batch(&ctx.pool, provider_batch_id)
        .await
        .map_err(internal)?
    else {
        tracing::warn!(provider_batch_id, "Callback for unknown provider batch");
        return Ok(None);
    };

    tracing::info!(
        run_id = run.id,
        provider_batch_id,
        items = outcomes.len(),
        "Provider callback received"
    );
    let stats = apply_outcomes(ctx, outcomes).await?;
    close_run(ctx, run.id).await?;
    Ok(Some(stats))
}

/// What one reconciliation sweep found and did.
#[derive(Debug, Default, serde::Serialize)]
pub struct SweepReport {
    pub runs_examined: usize,
    pub runs_resolved: usize,
    pub runs_escalated: usize,
    /// Runs whose open items are gift-card fulfillments awaiting a human;
    /// slow, not stuck.
    pub runs_waiting_on_fulfillment: usize,
}

/// Examine runs stuck in `processing` longer than `stale_after_hours`.
///
/// Runs with a partner batch id are polled and their outcomes applied.
/// Runs without one (dispatch never acknowledged) and runs the partner
/// cannot resolve are escalated via a `run.stuck` critical alert, never
/// auto-resolved, because money may already have left the system.
pub async fn sweep(ctx: &EngineContext, stale_after_hours: i64) -> Result<SweepReport, CoreError> {
    let cutoff = Utc::now() - Duration::hours(stale_after_hours);
    let stuck = PayoutRunRepo::stuck_runs(&ctx.pool, cutoff)
        .await
        .map_err(internal)?;

    let mut report = SweepReport {
        runs_examined: stuck.len(),
        ..Default::default()
    };

    for run in stuck {
        // A run whose open items are staged gift-card fulfillments is
        // waiting on a human, not on the partner; the fulfillment queue is
        // its escalation channel.
        if run.provider_batch_id.is_none() {
            let waiting = FulfillmentRepo::pending_count_for_run(&ctx.pool, run.id)
                .await
                .map_err(internal)?;
            if waiting > 0 {
                report.runs_waiting_on_fulfillment += 1;
                continue;
            }
        }

        match reconcile_run(ctx, &run).await? {
            true => report.runs_resolved += 1,
            false => {
                report.runs_escalated += 1;
                escalate(ctx, &run);
            }
        }
    }

    if report.runs_examined > 0 {
        tracing::info!(
            examined = report.runs_examined,
            resolved = report.runs_resolved,
            escalated = report.runs_escalated,
            "Reconciliation sweep finished"
        );
    }
    Ok(report)
}

/// Try to resolve one stuck run against the partner. Returns whether the
/// run reached a terminal state.
async fn reconcile_run(ctx: &EngineContext, run: &PayoutRun) -> Result<bool, CoreError> {
    let Some(provider_batch_id) = run.provider_batch_id.as_deref() else {
        // Dispatch never acknowledged: nothing to poll.
        return Ok(false);
    };

    let outcome = match ctx.provider.fetch_batch(provider_batch_id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(run_id = run.id, error = %e, "Partner poll failed");
            return Ok(false);
        }
    };

    apply_outcomes(ctx, &outcome.items).await?;
    Ok(close_run(ctx, run.id).await?.is_some())
}

fn escalate(ctx: &EngineContext, run: &PayoutRun) {
    tracing::error!(
        run_id = run.id,
        provider_batch_id = ?run.provider_batch_id,
        "Run requires manual reconciliation"
    );
    ctx.bus.publish(
        PlatformEvent::new("run.stuck")
            .with_source("payout_run", run.id)
            .with_payload(json!({
                "provider_batch_id": run.provider_batch_id,
                "started_at": run.started_at,
            })),
    );
}

fn internal(e: sqlx::Error) -> CoreError {
    CoreError::Internal(e.to_string())
}
