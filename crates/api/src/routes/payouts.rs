//! Route definitions for payout request intake and operator decisions.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::payouts;
use crate::state::AppState;

/// Payout request routes, nested under `/payouts`.
///
/// ```text
/// POST   /                    submit_payout
/// GET    /                    list_payouts
/// GET    /{id}                get_payout
/// GET    /{id}/audit          get_payout_audit
/// POST   /{id}/cancel         cancel_payout
/// POST   /{id}/approve        approve_payout
/// POST   /{id}/deny           deny_payout
/// POST   /{id}/hold           hold_payout
/// POST   /{id}/release        release_payout
/// POST   /{id}/requeue        requeue_payout
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(payouts::submit_payout).get(payouts::list_payouts))
        .route("/{id}", get(payouts::get_payout))
        .route("/{id}/audit", get(payouts::get_payout_audit))
        .route("/{id}/cancel", post(payouts::cancel_payout))
        .route("/{id}/approve", post(payouts::approve_payout))
        .route("/{id}/deny", post(payouts::deny_payout))
        .route("/{id}/hold", post(payouts::hold_payout))
        .route("/{id}/release", post(payouts::release_payout))
        .route("/{id}/requeue", post(payouts::requeue_payout))
}
