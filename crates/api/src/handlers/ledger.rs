//! Handlers for the ledger surface.
//!
//! The gift/economy engine that *produces* earnable coins lives upstream;
//! its earned-coin events land here as credits. All balance mutation goes
//! through the ledger repo, which is what keeps the sum-of-entries
//! invariant enforceable.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use glowcast_core::coins::{CoinType, REASON_EARNED};
use glowcast_core::paging::clamp_limit;
use glowcast_core::types::DbId;
use glowcast_db::models::balance::CreditCoins;
use glowcast_db::repositories::LedgerRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/ledger/credits
///
/// Ingest an earned-coin event from the upstream economy engine.
pub async fn credit_coins(
    State(state): State<AppState>,
    Json(input): Json<CreditCoins>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let coin_type: CoinType = input
        .coin_type
        .parse()
        .map_err(AppError::BadRequest)?;

    let entry = LedgerRepo::credit(
        &state.pool,
        input.user_id,
        input.coins,
        coin_type,
        input.reason.as_deref().unwrap_or(REASON_EARNED),
        None,
    )
    .await?;

    tracing::info!(
        user_id = input.user_id,
        coins = input.coins,
        coin_type = coin_type.as_str(),
        "Coins credited"
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: entry })))
}

/// GET /api/v1/ledger/balances/{user_id}
pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let balance = LedgerRepo::balance(&state.pool, user_id).await?;
    Ok(Json(DataResponse { data: balance }))
}

/// Query parameters for the entry listing.
#[derive(Debug, Deserialize)]
pub struct EntryListQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/ledger/balances/{user_id}/entries
///
/// Recent ledger entries for a user, newest first.
pub async fn list_entries(
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
    Query(query): Query<EntryListQuery>,
) -> AppResult<impl IntoResponse> {
    let entries =
        LedgerRepo::entries_for_user(&state.pool, user_id, clamp_limit(query.limit)).await?;
    Ok(Json(DataResponse { data: entries }))
}
