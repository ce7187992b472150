//! Route definitions for gift-card fulfillments.

use axum::routing::{get, patch};
use axum::Router;

use crate::handlers::fulfillments;
use crate::state::AppState;

/// Fulfillment routes, nested under `/fulfillments`.
///
/// ```text
/// GET    /                    list_pending
/// PATCH  /{id}                update_fulfillment
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(fulfillments::list_pending))
        .route("/{id}", patch(fulfillments::update_fulfillment))
}
