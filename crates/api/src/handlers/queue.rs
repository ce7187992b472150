//! Handler for the operator queue depth snapshot.
//!
//! Served from the version-guarded cache refreshed off the event change
//! log, so dashboard polling never hammers the aggregate query. A cold
//! cache (service just started) falls through to one direct read.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use glowcast_core::cache::VersionedSnapshot;
use glowcast_db::models::payout_request::QueueDepth;
use glowcast_db::repositories::{EventRepo, PayoutRequestRepo};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Queue depth plus the change-log position it was computed at.
#[derive(Debug, Serialize)]
pub struct QueueDepthView {
    #[serde(flatten)]
    pub depth: QueueDepth,
    /// Change-log cursor (newest event id) the snapshot reflects.
    pub as_of_event_id: i64,
    pub refreshed_at: glowcast_core::types::Timestamp,
}

/// GET /api/v1/queue/depth
pub async fn queue_depth(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let snapshot = match state.queue_depth.load() {
        Some(snapshot) => snapshot,
        None => {
            // Cold start: compute once and seed the cell.
            let version = EventRepo::latest_id(&state.pool).await?;
            let depth = PayoutRequestRepo::queue_depth(&state.pool).await?;
            let snapshot = VersionedSnapshot::new(version, Utc::now(), depth);
            state.queue_depth.accept_if_newer(snapshot.clone());
            snapshot
        }
    };

    Ok(Json(DataResponse {
        data: QueueDepthView {
            depth: snapshot.value,
            as_of_event_id: snapshot.version,
            refreshed_at: snapshot.refreshed_at,
        },
    }))
}
