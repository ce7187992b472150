//! Route definitions for payout runs.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::payout_runs;
use crate::state::AppState;

/// Payout run routes, nested under `/payout-runs`.
///
/// ```text
/// POST   /                    trigger_run
/// GET    /                    list_runs
/// GET    /{id}                get_run
/// POST   /{id}/retry          retry_run
/// POST   /{id}/refund         refund_run
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(payout_runs::trigger_run).get(payout_runs::list_runs))
        .route("/{id}", get(payout_runs::get_run))
        .route("/{id}/retry", post(payout_runs::retry_run))
        .route("/{id}/refund", post(payout_runs::refund_run))
}
