//! IRS threshold record model (per user, per calendar year).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use glowcast_core::types::{DbId, Timestamp};

/// A row from `threshold_records` (or its legacy v1 shape, adapted).
///
/// `requires_1099` is sticky: once latched it never flips back, even when a
/// returned payment corrects `total_paid_usd_cents` downward.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ThresholdRecord {
    pub user_id: DbId,
    pub year: i32,
    pub total_paid_usd_cents: i64,
    pub payout_count: i32,
    pub requires_1099: bool,
    pub last_payout_at: Option<Timestamp>,
}

/// Query parameters for `GET /api/v1/threshold-report`.
#[derive(Debug, Deserialize)]
pub struct ThresholdReportQuery {
    pub year: i32,
    /// `json` (default) or `csv`.
    pub format: Option<String>,
}
