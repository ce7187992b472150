//! Payout request entity model and operation DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use glowcast_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `payout_requests` table.
///
/// `is_held` is orthogonal to `status_id`: a held request keeps its status
/// and resumes exactly where it left off when released.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PayoutRequest {
    pub id: DbId,
    pub user_id: DbId,
    pub coins_requested: i64,
    pub usd_cents: i64,
    pub method: String,
    pub destination: String,
    pub status_id: StatusId,
    pub is_held: bool,
    pub hold_reason: Option<String>,
    pub hold_release_date: Option<Timestamp>,
    pub processed_by: Option<DbId>,
    pub processed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for submitting a new payout via `POST /api/v1/payouts`.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitPayout {
    pub user_id: DbId,
    /// Paid-coin amount to convert; the business minimum is checked in core.
    #[validate(range(min = 1))]
    pub coins: i64,
    /// `direct` or `gift_card`.
    pub method: String,
    /// Provider destination (e.g. a PayPal handle) or gift-card email.
    #[validate(length(min = 1, max = 320))]
    pub destination: String,
}

/// DTO for a user cancelling their own pending request.
#[derive(Debug, Deserialize)]
pub struct CancelPayout {
    pub user_id: DbId,
}

/// DTO for operator actions that do not require a reason (approve, requeue).
#[derive(Debug, Deserialize)]
pub struct OperatorAction {
    pub operator_id: DbId,
}

/// DTO for operator actions with a mandatory reason (deny, hold).
#[derive(Debug, Deserialize, Validate)]
pub struct ReasonedOperatorAction {
    pub operator_id: DbId,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    /// Optional planned release date (hold only).
    pub release_date: Option<Timestamp>,
}

/// Query parameters for `GET /api/v1/payouts`.
#[derive(Debug, Deserialize)]
pub struct PayoutListQuery {
    /// Filter by status ID (e.g. 1 = pending, 2 = approved).
    pub status_id: Option<StatusId>,
    /// Filter by requesting user.
    pub user_id: Option<DbId>,
    /// Only held / only unheld requests when set.
    pub is_held: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Operator queue depth aggregate, served from the snapshot cache.
#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct QueueDepth {
    pub pending: i64,
    pub approved: i64,
    pub processing: i64,
    pub held: i64,
}
