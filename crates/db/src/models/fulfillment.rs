//! Gift-card fulfillment model and the operator PATCH DTO.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use glowcast_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from `gift_card_fulfillments`: the manual settlement path.
///
/// Created when a batch picks up a `gift_card` request; the matching
/// payout item stays `queued` until an operator completes or fails this row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GiftCardFulfillment {
    pub id: DbId,
    pub request_id: DbId,
    pub provider: String,
    pub amount_usd_cents: i64,
    pub code: Option<String>,
    pub status_id: StatusId,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for `PATCH /api/v1/fulfillments/{id}`.
///
/// `failure_reason` is mandatory when `status` is `failed`; the handler
/// rejects the request otherwise and the failure raises a critical alert.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFulfillment {
    pub operator_id: DbId,
    /// `completed` or `failed`.
    pub status: String,
    /// Gift-card code or redemption link (completed only).
    #[validate(length(min = 1, max = 2000))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub failure_reason: Option<String>,
}
