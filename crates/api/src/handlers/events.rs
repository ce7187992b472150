//! Handler exposing the persisted event change log.
//!
//! Operator dashboards tail this cursor-based feed instead of holding a
//! vendor realtime subscription; the `after` parameter is the last event
//! id the client has seen.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use glowcast_core::paging::clamp_limit;
use glowcast_core::types::DbId;
use glowcast_db::repositories::EventRepo;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for the change-log feed.
#[derive(Debug, Deserialize)]
pub struct EventFeedQuery {
    /// Return events with id strictly greater than this cursor.
    pub after: Option<DbId>,
    pub limit: Option<i64>,
}

/// GET /api/v1/events?after=<cursor>&limit=<n>
pub async fn event_feed(
    State(state): State<AppState>,
    Query(query): Query<EventFeedQuery>,
) -> AppResult<impl IntoResponse> {
    let events = EventRepo::since(
        &state.pool,
        query.after.unwrap_or(0),
        clamp_limit(query.limit),
    )
    .await?;
    Ok(Json(DataResponse { data: events }))
}
