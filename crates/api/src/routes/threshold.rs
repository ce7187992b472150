//! Route definition for the 1099 threshold report.

use axum::routing::get;
use axum::Router;

use crate::handlers::threshold;
use crate::state::AppState;

/// Top-level threshold report route.
///
/// ```text
/// GET    /threshold-report    threshold_report
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/threshold-report", get(threshold::threshold_report))
}
