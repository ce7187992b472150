//! Operator-triggered refund sweep over a run.
//!
//! The one way to unwind a run the partner never acknowledged: every item
//! still `queued` with no `provider_item_id` is failed and refunded. Items
//! the partner *did* acknowledge are deliberately left alone: money may
//! already have moved, and only reconciliation against the partner's
//! records may settle them.

use serde_json::json;

use glowcast_core::error::CoreError;
use glowcast_core::types::DbId;

use glowcast_db::repositories::{AuditRepo, PayoutRunRepo};
use glowcast_events::PlatformEvent;

use crate::batch::close_run;
use crate::context::EngineContext;

/// How many items a sweep refunded and how many it refused to touch.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RefundSweepReport {
    pub refunded: usize,
    pub skipped_acknowledged: usize,
}

/// Fail-and-refund every unacknowledged item of `run_id`.
pub async fn refund_run(
    ctx: &EngineContext,
    run_id: DbId,
    operator_id: DbId,
) -> Result<RefundSweepReport, CoreError> {
    if PayoutRunRepo::find_by_id(&ctx.pool, run_id)
        .await
        .map_err(internal)?
        .is_none()
    {
        return Err(CoreError::NotFound {
            entity: "PayoutRun",
            id: run_id,
        });
    }

    let all_items = PayoutRunRepo::items_for_run(&ctx.pool, run_id)
        .await
        .map_err(internal)?;
    let refundable = PayoutRunRepo::resubmittable_items(&ctx.pool, run_id)
        .await
        .map_err(internal)?;

    use glowcast_db::models::status::PayoutItemStatus;
    let skipped_acknowledged = all_items
        .iter()
        .filter(|i| i.status_id == PayoutItemStatus::Queued.id() && i.provider_item_id.is_some())
        .count();

    let mut refunded = 0;
    for item in &refundable {
        let applied =
            PayoutRunRepo::apply_item_failure(&ctx.pool, item.id, None, "operator_refund_run")
                .await
                .map_err(internal)?;
        if let Some((item, request, _entry)) = applied {
            refunded += 1;
            let mut tx = ctx.pool.begin().await.map_err(internal)?;
            AuditRepo::insert_with(
                &mut tx,
                request.id,
                operator_id,
                glowcast_core::hold::ACTION_REFUND_RUN,
                None,
            )
            .await
            .map_err(internal)?;
            tx.commit().await.map_err(internal)?;
            ctx.bus.publish(
                PlatformEvent::new("item.failed")
                    .with_source("payout_request", request.id)
                    .with_actor(operator_id)
                    .with_payload(json!({
                        "run_id": item.run_id,
                        "failure_reason": "operator_refund_run",
                    })),
            );
        }
    }

    if skipped_acknowledged > 0 {
        tracing::warn!(
            run_id,
            skipped_acknowledged,
            "Refund sweep left acknowledged items for reconciliation"
        );
    }

    close_run(ctx, run_id).await?;

    tracing::info!(run_id, operator_id, refunded, "Refund sweep finished");
    Ok(RefundSweepReport {
        refunded,
        skipped_acknowledged,
    })
}

fn internal(e: sqlx::Error) -> CoreError {
    CoreError::Internal(e.to_string())
}
