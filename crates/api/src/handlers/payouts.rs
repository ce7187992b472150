//! Handlers for payout request intake and operator decisions.
//!
//! Provides submission, cancellation, the approve/deny pair, the
//! hold/release pair, requeue, and operator listing with the audit trail.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use validator::Validate;

use glowcast_core::types::DbId;
use glowcast_db::models::payout_request::{
    CancelPayout, OperatorAction, PayoutListQuery, ReasonedOperatorAction, SubmitPayout,
};
use glowcast_db::repositories::{AuditRepo, PayoutRequestRepo};
use glowcast_engine::requests;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/payouts
///
/// Submit a payout request. Coins are reserved immediately; rejections
/// persist nothing.
pub async fn submit_payout(
    State(state): State<AppState>,
    Json(input): Json<SubmitPayout>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let request = requests::submit(&state.engine, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: request })))
}

/// GET /api/v1/payouts
///
/// Operator listing with status / user / hold filters and pagination.
pub async fn list_payouts(
    State(state): State<AppState>,
    Query(filter): Query<PayoutListQuery>,
) -> AppResult<impl IntoResponse> {
    let requests = PayoutRequestRepo::list(&state.pool, &filter).await?;
    Ok(Json(DataResponse { data: requests }))
}

/// GET /api/v1/payouts/{id}
pub async fn get_payout(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let request = PayoutRequestRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(glowcast_core::error::CoreError::NotFound {
            entity: "PayoutRequest",
            id,
        }))?;
    Ok(Json(DataResponse { data: request }))
}

/// GET /api/v1/payouts/{id}/audit
///
/// The operator audit trail for one request, oldest first.
pub async fn get_payout_audit(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let trail = AuditRepo::list_for_request(&state.pool, id).await?;
    Ok(Json(DataResponse { data: trail }))
}

/// POST /api/v1/payouts/{id}/cancel
///
/// User cancellation; only valid while the request is still `pending`.
pub async fn cancel_payout(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<CancelPayout>,
) -> AppResult<impl IntoResponse> {
    let request = requests::cancel(&state.engine, id, input.user_id).await?;
    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/payouts/{id}/approve
pub async fn approve_payout(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<OperatorAction>,
) -> AppResult<impl IntoResponse> {
    let request = requests::approve(&state.engine, id, input.operator_id).await?;
    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/payouts/{id}/deny
///
/// Denial requires a reason (audit policy) and refunds the reservation.
pub async fn deny_payout(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ReasonedOperatorAction>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let request = requests::deny(&state.engine, id, input.operator_id, &input.reason).await?;
    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/payouts/{id}/hold
///
/// Attach an administrative hold. Requires a reason; only valid while the
/// request is still `pending`.
pub async fn hold_payout(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ReasonedOperatorAction>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let request = requests::hold(
        &state.engine,
        id,
        input.operator_id,
        &input.reason,
        input.release_date,
    )
    .await?;
    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/payouts/{id}/release
pub async fn release_payout(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<OperatorAction>,
) -> AppResult<impl IntoResponse> {
    let request = requests::release(&state.engine, id, input.operator_id).await?;
    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/payouts/{id}/requeue
///
/// Explicit operator requeue of a `failed` request. Never automatic.
pub async fn requeue_payout(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<OperatorAction>,
) -> AppResult<impl IntoResponse> {
    let request = requests::requeue(&state.engine, id, input.operator_id).await?;
    Ok(Json(DataResponse { data: request }))
}
