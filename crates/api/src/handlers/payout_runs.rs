//! Handlers for payout run (batch) operations.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use glowcast_core::error::CoreError;
use glowcast_core::types::DbId;
use glowcast_db::models::payout_run::RunListQuery;
use glowcast_db::models::payout_request::OperatorAction;
use glowcast_db::repositories::PayoutRunRepo;
use glowcast_engine::{batch, refund};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/payout-runs
///
/// Manual batch trigger; the worker cron fires the same engine entry
/// point. 204 when no eligible requests exist (no empty run is created).
pub async fn trigger_run(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    match batch::run_batch(&state.engine).await? {
        Some(report) => {
            Ok((StatusCode::CREATED, Json(DataResponse { data: report })).into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// GET /api/v1/payout-runs
pub async fn list_runs(
    State(state): State<AppState>,
    Query(filter): Query<RunListQuery>,
) -> AppResult<impl IntoResponse> {
    let runs = PayoutRunRepo::list(&state.pool, &filter).await?;
    Ok(Json(DataResponse { data: runs }))
}

/// GET /api/v1/payout-runs/{id}
///
/// The run plus all of its items.
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let run = PayoutRunRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "PayoutRun",
            id,
        })
        .map_err(crate::error::AppError::Core)?;
    let items = PayoutRunRepo::items_for_run(&state.pool, id).await?;

    Ok(Json(DataResponse {
        data: serde_json::json!({ "run": run, "items": items }),
    }))
}

/// POST /api/v1/payout-runs/{id}/retry
///
/// Idempotent re-dispatch: only items the partner never acknowledged are
/// resubmitted, under their original idempotency keys.
pub async fn retry_run(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let report = batch::retry_run(&state.engine, id).await?;
    Ok(Json(DataResponse { data: report }))
}

/// POST /api/v1/payout-runs/{id}/refund
///
/// Operator refund sweep over the run's unacknowledged items.
pub async fn refund_run(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<OperatorAction>,
) -> AppResult<impl IntoResponse> {
    let report = refund::refund_run(&state.engine, id, input.operator_id).await?;
    Ok(Json(DataResponse { data: report }))
}
