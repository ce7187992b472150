//! Handler for partner payout callbacks.
//!
//! The partner signs the raw body with HMAC-SHA256; the handler verifies
//! before parsing. Callbacks are replayable: outcome application is
//! idempotent, so at-least-once delivery from the partner is fine.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use glowcast_engine::reconcile;
use glowcast_provider::{verify_callback_signature, ItemOutcome};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Signature header the partner attaches to callbacks.
pub const SIGNATURE_HEADER: &str = "x-provider-signature";

/// Callback body: the batch id plus per-item outcomes.
#[derive(Debug, Deserialize)]
pub struct ProviderCallback {
    pub provider_batch_id: String,
    pub items: Vec<ItemOutcome>,
}

/// POST /api/v1/provider/callbacks
pub async fn provider_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    if !verify_callback_signature(&state.config.provider_webhook_secret, &body, signature) {
        tracing::warn!("Provider callback rejected: bad signature");
        return Err(AppError::InvalidSignature);
    }

    let callback: ProviderCallback = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid callback body: {e}")))?;

    let stats =
        reconcile::ingest_callback(&state.engine, &callback.provider_batch_id, &callback.items)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Unknown provider batch id '{}'",
                    callback.provider_batch_id
                ))
            })?;

    Ok(Json(DataResponse {
        data: serde_json::json!({
            "applied_success": stats.succeeded,
            "applied_failed": stats.failed,
            "pending": stats.pending,
            "returned": stats.returned,
            "unknown": stats.unknown,
        }),
    }))
}
