//! Route definitions for the ledger surface.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::ledger;
use crate::state::AppState;

/// Ledger routes, nested under `/ledger`.
///
/// ```text
/// POST   /credits                        credit_coins (economy engine ingest)
/// GET    /balances/{user_id}             get_balance
/// GET    /balances/{user_id}/entries     list_entries
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/credits", post(ledger::credit_coins))
        .route("/balances/{user_id}", get(ledger::get_balance))
        .route("/balances/{user_id}/entries", get(ledger::list_entries))
}
