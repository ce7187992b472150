//! Route definition for the operator queue depth snapshot.

use axum::routing::get;
use axum::Router;

use crate::handlers::queue;
use crate::state::AppState;

/// Queue routes, nested under `/queue`.
///
/// ```text
/// GET    /depth               queue_depth
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/depth", get(queue::queue_depth))
}
