pub mod callbacks;
pub mod events;
pub mod fulfillments;
pub mod health;
pub mod ledger;
pub mod payout_runs;
pub mod payouts;
pub mod queue;
pub mod threshold;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ledger/credits                earned-coin ingest (POST)
/// /ledger/balances/{user_id}     balance (GET), /entries history (GET)
///
/// /payouts                       submit (POST), list (GET)
/// /payouts/{id}                  get
/// /payouts/{id}/audit            audit trail
/// /payouts/{id}/cancel           user cancel (POST)
/// /payouts/{id}/approve          operator approve (POST)
/// /payouts/{id}/deny             operator deny (POST, reason required)
/// /payouts/{id}/hold             operator hold (POST, reason required)
/// /payouts/{id}/release          operator release (POST)
/// /payouts/{id}/requeue          operator requeue (POST)
///
/// /payout-runs                   trigger (POST), list (GET)
/// /payout-runs/{id}              run + items (GET)
/// /payout-runs/{id}/retry        idempotent re-dispatch (POST)
/// /payout-runs/{id}/refund       operator refund sweep (POST)
///
/// /fulfillments                  pending gift-card fulfillments (GET)
/// /fulfillments/{id}             settle (PATCH)
///
/// /provider/callbacks            partner webhook (POST, HMAC-verified)
///
/// /threshold-report              1099 report, JSON or CSV (GET)
///
/// /events                        change-log feed, cursor-based (GET)
/// /queue/depth                   operator queue depth snapshot (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/ledger", ledger::router())
        .nest("/payouts", payouts::router())
        .nest("/payout-runs", payout_runs::router())
        .nest("/fulfillments", fulfillments::router())
        .nest("/provider", callbacks::router())
        .merge(threshold::router())
        .merge(events::router())
        .nest("/queue", queue::router())
}
