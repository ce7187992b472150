//! Route definition for the partner callback webhook.

use axum::routing::post;
use axum::Router;

use crate::handlers::callbacks;
use crate::state::AppState;

/// Partner callback route, nested under `/provider`.
///
/// ```text
/// POST   /callbacks           provider_callback
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/callbacks", post(callbacks::provider_callback))
}
