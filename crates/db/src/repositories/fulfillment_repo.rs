//! Repository for the `gift_card_fulfillments` table.
//!
//! The gift-card settlement path never calls the external payout API:
//! a fulfillment row is staged when the batch picks the request up, and a
//! human completes or fails it out of band.

use sqlx::PgPool;

use glowcast_core::types::DbId;

use crate::models::fulfillment::GiftCardFulfillment;
use crate::models::status::FulfillmentStatus;

/// Column list for `gift_card_fulfillments` queries.
const COLUMNS: &str = "\
    id, request_id, provider, amount_usd_cents, code, status_id, \
    failure_reason, created_at, updated_at";

/// Provides staging and settlement of gift-card fulfillments.
pub struct FulfillmentRepo;

impl FulfillmentRepo {
    /// Stage a pending fulfillment for a request picked into a run.
    pub async fn stage(
        pool: &PgPool,
        request_id: DbId,
        provider: &str,
        amount_usd_cents: i64,
    ) -> Result<GiftCardFulfillment, sqlx::Error> {
        let insert = format!(
            "INSERT INTO gift_card_fulfillments (request_id, provider, amount_usd_cents, status_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GiftCardFulfillment>(&insert)
            .bind(request_id)
            .bind(provider)
            .bind(amount_usd_cents)
            .bind(FulfillmentStatus::Pending.id())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<GiftCardFulfillment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM gift_card_fulfillments WHERE id = $1");
        sqlx::query_as::<_, GiftCardFulfillment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All fulfillments still awaiting a human decision, oldest first.
    pub async fn list_pending(pool: &PgPool) -> Result<Vec<GiftCardFulfillment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM gift_card_fulfillments \
             WHERE status_id = $1 ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, GiftCardFulfillment>(&query)
            .bind(FulfillmentStatus::Pending.id())
            .fetch_all(pool)
            .await
    }

    /// Count of undecided fulfillments attached to a run's items. Used by
    /// the reconciliation sweep to tell "waiting on a human" apart from
    /// "unacknowledged by the partner".
    pub async fn pending_count_for_run(pool: &PgPool, run_id: i64) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM gift_card_fulfillments f \
             JOIN payout_items i ON i.request_id = f.request_id \
             WHERE i.run_id = $1 AND f.status_id = $2",
        )
        .bind(run_id)
        .bind(FulfillmentStatus::Pending.id())
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Mark completed with the delivered code. CAS on `pending` so a double
    /// PATCH cannot overwrite a decided row.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        code: &str,
    ) -> Result<Option<GiftCardFulfillment>, sqlx::Error> {
        let update = format!(
            "UPDATE gift_card_fulfillments \
             SET status_id = $2, code = $3 \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GiftCardFulfillment>(&update)
            .bind(id)
            .bind(FulfillmentStatus::Completed.id())
            .bind(code)
            .bind(FulfillmentStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Mark failed with the mandatory reason. CAS on `pending`.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        failure_reason: &str,
    ) -> Result<Option<GiftCardFulfillment>, sqlx::Error> {
        let update = format!(
            "UPDATE gift_card_fulfillments \
             SET status_id = $2, failure_reason = $3 \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GiftCardFulfillment>(&update)
            .bind(id)
            .bind(FulfillmentStatus::Failed.id())
            .bind(failure_reason)
            .bind(FulfillmentStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }
}
