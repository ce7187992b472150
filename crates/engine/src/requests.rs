//! Request intake and operator decisions.
//!
//! Thin orchestration over [`PayoutRequestRepo`]: business validation from
//! core, the transactional write in the repo, and an event on every edge.
//! A repo CAS that affects zero rows surfaces here as either `NotFound`
//! (the row does not exist) or `StaleState` (it exists but moved); the
//! caller re-fetches and retries, nothing gets overwritten.

use serde_json::json;

use glowcast_core::coins::coins_to_usd_cents;
use glowcast_core::error::CoreError;
use glowcast_core::payout::{validate_method, validate_submission};
use glowcast_core::types::{DbId, Timestamp};

use glowcast_db::models::balance::LedgerEntry;
use glowcast_db::models::payout_request::{PayoutRequest, SubmitPayout};
use glowcast_db::repositories::payout_request_repo::{CreateOutcome, RequeueOutcome};
use glowcast_db::repositories::PayoutRequestRepo;
use glowcast_events::PlatformEvent;

use crate::context::EngineContext;

/// Submit a new payout request, reserving its coins.
///
/// Rejections (`Validation`, `InsufficientBalance`) are synchronous and
/// persist nothing.
pub async fn submit(
    ctx: &EngineContext,
    input: &SubmitPayout,
) -> Result<PayoutRequest, CoreError> {
    validate_submission(input.coins).map_err(CoreError::Validation)?;
    validate_method(&input.method).map_err(CoreError::Validation)?;
    if input.destination.trim().is_empty() {
        return Err(CoreError::Validation("destination must not be empty".into()));
    }

    let usd_cents = coins_to_usd_cents(input.coins);
    let outcome = PayoutRequestRepo::create_reserved(&ctx.pool, input, usd_cents)
        .await
        .map_err(internal)?;

    match outcome {
        CreateOutcome::Created(request, entry) => {
            tracing::info!(
                request_id = request.id,
                user_id = request.user_id,
                coins = request.coins_requested,
                usd_cents = request.usd_cents,
                "Payout request submitted, coins reserved"
            );
            publish_edge(ctx, "payout.submitted", &request, Some(&entry));
            Ok(request)
        }
        CreateOutcome::Insufficient { available } => Err(CoreError::InsufficientBalance {
            available,
            requested: input.coins,
        }),
    }
}

/// Operator approval (pending -> approved). No balance change: the coins
/// were reserved at submission.
pub async fn approve(
    ctx: &EngineContext,
    request_id: DbId,
    operator_id: DbId,
) -> Result<PayoutRequest, CoreError> {
    let approved = PayoutRequestRepo::approve(&ctx.pool, request_id, operator_id)
        .await
        .map_err(internal)?;
    let Some(request) = approved else {
        return Err(stale_or_missing(ctx, request_id).await);
    };
    tracing::info!(request_id, operator_id, "Payout request approved");
    publish_actor_edge(ctx, "payout.approved", &request, operator_id);
    Ok(request)
}

/// Operator denial (pending -> denied) with the refund in the same
/// transaction.
pub async fn deny(
    ctx: &EngineContext,
    request_id: DbId,
    operator_id: DbId,
    reason: &str,
) -> Result<PayoutRequest, CoreError> {
    let denied = PayoutRequestRepo::deny(&ctx.pool, request_id, operator_id, reason)
        .await
        .map_err(internal)?;
    let Some((request, entry)) = denied else {
        return Err(stale_or_missing(ctx, request_id).await);
    };
    tracing::info!(request_id, operator_id, reason, "Payout request denied, coins refunded");
    publish_edge(ctx, "payout.denied", &request, Some(&entry));
    Ok(request)
}

/// User cancellation of their own pending request, refund included.
pub async fn cancel(
    ctx: &EngineContext,
    request_id: DbId,
    user_id: DbId,
) -> Result<PayoutRequest, CoreError> {
    let cancelled = PayoutRequestRepo::cancel(&ctx.pool, request_id, user_id)
        .await
        .map_err(internal)?;
    let Some((request, entry)) = cancelled else {
        return Err(stale_or_missing(ctx, request_id).await);
    };
    tracing::info!(request_id, user_id, "Payout request cancelled by user");
    publish_edge(ctx, "payout.cancelled", &request, Some(&entry));
    Ok(request)
}

/// Attach an administrative hold (pending requests only).
pub async fn hold(
    ctx: &EngineContext,
    request_id: DbId,
    operator_id: DbId,
    reason: &str,
    release_date: Option<Timestamp>,
) -> Result<PayoutRequest, CoreError> {
    let held = PayoutRequestRepo::hold(&ctx.pool, request_id, operator_id, reason, release_date)
        .await
        .map_err(internal)?;
    let Some(request) = held else {
        return Err(stale_or_missing(ctx, request_id).await);
    };
    tracing::info!(request_id, operator_id, reason, "Hold attached");
    publish_actor_edge(ctx, "payout.held", &request, operator_id);
    Ok(request)
}

/// Release a hold; the request resumes exactly where it left off.
pub async fn release(
    ctx: &EngineContext,
    request_id: DbId,
    operator_id: DbId,
) -> Result<PayoutRequest, CoreError> {
    let released = PayoutRequestRepo::release(&ctx.pool, request_id, operator_id)
        .await
        .map_err(internal)?;
    let Some(request) = released else {
        return Err(stale_or_missing(ctx, request_id).await);
    };
    tracing::info!(request_id, operator_id, "Hold released");
    publish_actor_edge(ctx, "payout.released", &request, operator_id);
    Ok(request)
}

/// Explicit operator requeue of a failed request, with a fresh reservation.
pub async fn requeue(
    ctx: &EngineContext,
    request_id: DbId,
    operator_id: DbId,
) -> Result<PayoutRequest, CoreError> {
    let outcome = PayoutRequestRepo::requeue(&ctx.pool, request_id, operator_id)
        .await
        .map_err(internal)?;
    match outcome {
        RequeueOutcome::Requeued(request, entry) => {
            tracing::info!(request_id, operator_id, "Failed request requeued, coins re-reserved");
            publish_edge(ctx, "payout.requeued", &request, Some(&entry));
            Ok(request)
        }
        RequeueOutcome::Insufficient {
            available,
            requested,
        } => Err(CoreError::InsufficientBalance {
            available,
            requested,
        }),
        RequeueOutcome::Stale => Err(stale_or_missing(ctx, request_id).await),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Distinguish "row does not exist" from "row moved concurrently".
async fn stale_or_missing(ctx: &EngineContext, request_id: DbId) -> CoreError {
    match PayoutRequestRepo::current_status(&ctx.pool, request_id).await {
        Ok(Some(_)) => CoreError::StaleState {
            entity: "PayoutRequest",
            id: request_id,
        },
        Ok(None) => CoreError::NotFound {
            entity: "PayoutRequest",
            id: request_id,
        },
        Err(e) => internal(e),
    }
}

fn internal(e: sqlx::Error) -> CoreError {
    CoreError::Internal(e.to_string())
}

fn publish_edge(
    ctx: &EngineContext,
    event_type: &str,
    request: &PayoutRequest,
    entry: Option<&LedgerEntry>,
) {
    let mut event = PlatformEvent::new(event_type)
        .with_source("payout_request", request.id)
        .with_actor(request.user_id)
        .with_payload(json!({
            "coins": request.coins_requested,
            "usd_cents": request.usd_cents,
            "status_id": request.status_id,
            "ledger_entry_id": entry.map(|e| e.id),
        }));
    if let Some(actor) = request.processed_by {
        event = event.with_actor(actor);
    }
    ctx.bus.publish(event);
}

fn publish_actor_edge(
    ctx: &EngineContext,
    event_type: &str,
    request: &PayoutRequest,
    actor_id: DbId,
) {
    ctx.bus.publish(
        PlatformEvent::new(event_type)
            .with_source("payout_request", request.id)
            .with_actor(actor_id)
            .with_payload(json!({
                "status_id": request.status_id,
                "is_held": request.is_held,
            })),
    );
}
