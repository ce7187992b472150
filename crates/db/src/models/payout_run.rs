//! Payout run (batch) and per-item entity models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use glowcast_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `payout_runs` table: one scheduled or manual batch.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PayoutRun {
    pub id: DbId,
    pub run_date: NaiveDate,
    pub status_id: StatusId,
    pub total_payouts: i32,
    pub total_coins: i64,
    pub total_usd_cents: i64,
    pub provider_batch_id: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `payout_items` table: one request inside one run.
///
/// `provider_item_id` presence is the marker that the external provider
/// acknowledged this item; retry logic never resubmits acknowledged items.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PayoutItem {
    pub id: DbId,
    pub run_id: DbId,
    pub request_id: DbId,
    pub destination: String,
    pub amount_usd_cents: i64,
    pub amount_coins: i64,
    pub status_id: StatusId,
    pub idempotency_key: String,
    pub provider_item_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Query parameters for `GET /api/v1/payout-runs`.
#[derive(Debug, Deserialize)]
pub struct RunListQuery {
    pub status_id: Option<StatusId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
