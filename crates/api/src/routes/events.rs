//! Route definition for the event change-log feed.

use axum::routing::get;
use axum::Router;

use crate::handlers::events;
use crate::state::AppState;

/// Top-level event feed route.
///
/// ```text
/// GET    /events              event_feed
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(events::event_feed))
}
