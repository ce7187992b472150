//! Handlers for the manual gift-card fulfillment path.
//!
//! A fulfillment row is staged by the batch; the payout item stays
//! `queued` until an operator PATCHes the row here. A `failed` decision
//! requires a reason and raises a critical operator alert (never silent).

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Datelike, Utc};
use validator::Validate;

use glowcast_core::error::CoreError;
use glowcast_core::types::DbId;
use glowcast_db::models::fulfillment::UpdateFulfillment;
use glowcast_db::repositories::{FulfillmentRepo, PayoutRunRepo};
use glowcast_engine::batch::close_run;
use glowcast_events::PlatformEvent;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/fulfillments
///
/// Fulfillments still awaiting a human decision, oldest first.
pub async fn list_pending(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let pending = FulfillmentRepo::list_pending(&state.pool).await?;
    Ok(Json(DataResponse { data: pending }))
}

/// PATCH /api/v1/fulfillments/{id}
///
/// Settle one fulfillment. `completed` requires the delivered code,
/// `failed` requires a failure reason.
pub async fn update_fulfillment(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateFulfillment>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    match input.status.as_str() {
        "completed" => complete(&state, id, &input).await,
        "failed" => fail(&state, id, &input).await,
        other => Err(AppError::BadRequest(format!(
            "Invalid fulfillment status '{other}'. Must be 'completed' or 'failed'"
        ))),
    }
}

async fn complete(
    state: &AppState,
    id: DbId,
    input: &UpdateFulfillment,
) -> AppResult<axum::response::Response> {
    let code = input
        .code
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("code is required when status is completed".into()))?;

    let fulfillment = FulfillmentRepo::complete(&state.pool, id, code)
        .await?
        .ok_or_else(|| stale_or_missing(id))?;

    // Settle the matching payout item through the normal success path so
    // the request flips to fulfilled and the threshold record updates.
    if let Some(item) =
        PayoutRunRepo::queued_item_for_request(&state.pool, fulfillment.request_id).await?
    {
        let applied = PayoutRunRepo::apply_item_success(
            &state.pool,
            &state.engine.thresholds,
            item.id,
            None,
            Utc::now().year(),
        )
        .await?;
        if applied.is_some() {
            close_run(&state.engine, item.run_id).await?;
        }
    }

    tracing::info!(
        fulfillment_id = id,
        operator_id = input.operator_id,
        "Gift-card fulfillment completed"
    );
    state.event_bus.publish(
        PlatformEvent::new("fulfillment.completed")
            .with_source("gift_card_fulfillment", id)
            .with_actor(input.operator_id),
    );

    Ok(Json(DataResponse { data: fulfillment }).into_response())
}

async fn fail(
    state: &AppState,
    id: DbId,
    input: &UpdateFulfillment,
) -> AppResult<axum::response::Response> {
    let reason = input.failure_reason.as_deref().ok_or_else(|| {
        AppError::BadRequest("failure_reason is required when status is failed".into())
    })?;

    let fulfillment = FulfillmentRepo::fail(&state.pool, id, reason)
        .await?
        .ok_or_else(|| stale_or_missing(id))?;

    // Fail the matching item: request -> failed, coins refunded.
    if let Some(item) =
        PayoutRunRepo::queued_item_for_request(&state.pool, fulfillment.request_id).await?
    {
        let applied = PayoutRunRepo::apply_item_failure(&state.pool, item.id, None, reason).await?;
        if applied.is_some() {
            close_run(&state.engine, item.run_id).await?;
        }
    }

    tracing::warn!(
        fulfillment_id = id,
        operator_id = input.operator_id,
        reason,
        "Gift-card fulfillment failed"
    );
    // The alert router turns this into a critical operator alert.
    state.event_bus.publish(
        PlatformEvent::new("fulfillment.failed")
            .with_source("gift_card_fulfillment", id)
            .with_actor(input.operator_id)
            .with_payload(serde_json::json!({ "failure_reason": reason })),
    );

    Ok(Json(DataResponse { data: fulfillment }).into_response())
}

fn stale_or_missing(id: DbId) -> AppError {
    // The CAS guards on `pending`; a miss is either an unknown id or an
    // already-decided row. Either way the operator needs a re-fetch.
    AppError::Core(CoreError::StaleState {
        entity: "GiftCardFulfillment",
        id,
    })
}
