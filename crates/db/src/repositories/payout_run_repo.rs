//! Repository for the `payout_runs` and `payout_items` tables.
//!
//! A run is created, its items written, and the selected requests flipped
//! to `processing` in one transaction that **commits before** the external
//! provider is called. A crash mid-dispatch therefore leaves recoverable
//! state (queued items with no `provider_item_id`), never corrupted state.
//!
//! Per-item outcome application is idempotent: the item-level CAS
//! (`queued -> success/failed`) runs first, and a replayed callback that
//! finds the item already terminal no-ops without touching the request,
//! the ledger, or the threshold record.

use sqlx::PgPool;

use glowcast_core::coins::{CoinType, REASON_PAYOUT_REFUND};
use glowcast_core::dispatch::idempotency_key;
use glowcast_core::types::{DbId, Timestamp};

use crate::models::balance::LedgerEntry;
use crate::models::payout_request::PayoutRequest;
use crate::models::payout_run::{PayoutItem, PayoutRun, RunListQuery};
use crate::models::status::{PayoutItemStatus, PayoutRequestStatus, PayoutRunStatus};
use crate::models::threshold::ThresholdRecord;
use crate::repositories::ledger_repo::LedgerRepo;
use crate::repositories::payout_request_repo::{self, PayoutRequestRepo};
use crate::repositories::threshold_repo::ThresholdRepo;

/// Column list for `payout_runs` queries.
const RUN_COLUMNS: &str = "\
    id, run_date, status_id, total_payouts, total_coins, total_usd_cents, \
    provider_batch_id, started_at, completed_at, created_at, updated_at";

/// Column list for `payout_items` queries.
const ITEM_COLUMNS: &str = "\
    id, run_id, request_id, destination, amount_usd_cents, amount_coins, \
    status_id, idempotency_key, provider_item_id, failure_reason, \
    created_at, updated_at";

/// Provides batch run creation, item settlement, and run closing.
pub struct PayoutRunRepo;

impl PayoutRunRepo {
    /// Create a run over all currently eligible requests.
    ///
    /// Eligible: `approved`, not held, and the user has no other request in
    /// flight. Rows are locked with `FOR UPDATE SKIP LOCKED` so two
    /// concurrent triggers (cron + manual) cannot batch the same request
    /// twice. Returns `None` without creating a run row when the eligible
    /// set is empty.
    pub async fn create_with_items(
        pool: &PgPool,
    ) -> Result<Option<(PayoutRun, Vec<PayoutItem>, Vec<PayoutRequest>)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        // One request per user per run (the in-flight partial unique index
        // enforces the same rule at the storage layer): a user with several
        // approvals gets their oldest one, the rest wait for a later run.
        let select = format!(
            "SELECT {cols} FROM payout_requests \
             WHERE id IN ( \
                 SELECT DISTINCT ON (user_id) id FROM payout_requests \
                 WHERE status_id = $1 \
                   AND is_held = FALSE \
                   AND user_id NOT IN ( \
                       SELECT user_id FROM payout_requests WHERE status_id = $2 \
                   ) \
                 ORDER BY user_id, created_at ASC \
             ) \
             ORDER BY created_at ASC \
             FOR UPDATE SKIP LOCKED",
            cols = payout_request_repo::COLUMNS,
        );
        let eligible = sqlx::query_as::<_, PayoutRequest>(&select)
            .bind(PayoutRequestStatus::Approved.id())
            .bind(PayoutRequestStatus::Processing.id())
            .fetch_all(&mut *tx)
            .await?;

        if eligible.is_empty() {
            tx.rollback().await?;
            return Ok(None);
        }

        let total_coins: i64 = eligible.iter().map(|r| r.coins_requested).sum();
        let total_usd_cents: i64 = eligible.iter().map(|r| r.usd_cents).sum();

        let insert_run = format!(
            "INSERT INTO payout_runs (status_id, total_payouts, total_coins, total_usd_cents, started_at) \
             VALUES ($1, $2, $3, $4, NOW()) \
             RETURNING {RUN_COLUMNS}"
        );
        let run = sqlx::query_as::<_, PayoutRun>(&insert_run)
            .bind(PayoutRunStatus::Processing.id())
            .bind(eligible.len() as i32)
            .bind(total_coins)
            .bind(total_usd_cents)
            .fetch_one(&mut *tx)
            .await?;

        let insert_item = format!(
            "INSERT INTO payout_items \
                 (run_id, request_id, destination, amount_usd_cents, amount_coins, status_id, idempotency_key) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {ITEM_COLUMNS}"
        );
        let mut items = Vec::with_capacity(eligible.len());
        for request in &eligible {
            let item = sqlx::query_as::<_, PayoutItem>(&insert_item)
                .bind(run.id)
                .bind(request.id)
                .bind(&request.destination)
                .bind(request.usd_cents)
                .bind(request.coins_requested)
                .bind(PayoutItemStatus::Queued.id())
                .bind(idempotency_key(run.id, request.id))
                .fetch_one(&mut *tx)
                .await?;
            items.push(item);

            // The selected rows are locked, so this cannot race; the status
            // guard stays anyway to keep the write self-describing.
            sqlx::query(
                "UPDATE payout_requests SET status_id = $2 WHERE id = $1 AND status_id = $3",
            )
            .bind(request.id)
            .bind(PayoutRequestStatus::Processing.id())
            .bind(PayoutRequestStatus::Approved.id())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some((run, items, eligible)))
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PayoutRun>, sqlx::Error> {
        let query = format!("SELECT {RUN_COLUMNS} FROM payout_runs WHERE id = $1");
        sqlx::query_as::<_, PayoutRun>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_provider_batch(
        pool: &PgPool,
        provider_batch_id: &str,
    ) -> Result<Option<PayoutRun>, sqlx::Error> {
        let query = format!("SELECT {RUN_COLUMNS} FROM payout_runs WHERE provider_batch_id = $1");
        sqlx::query_as::<_, PayoutRun>(&query)
            .bind(provider_batch_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &RunListQuery,
    ) -> Result<Vec<PayoutRun>, sqlx::Error> {
        let query = format!(
            "SELECT {RUN_COLUMNS} FROM payout_runs \
             WHERE ($1::SMALLINT IS NULL OR status_id = $1) \
             ORDER BY id DESC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, PayoutRun>(&query)
            .bind(filter.status_id)
            .bind(glowcast_core::paging::clamp_limit(filter.limit))
            .bind(glowcast_core::paging::clamp_offset(filter.offset))
            .fetch_all(pool)
            .await
    }

    pub async fn items_for_run(
        pool: &PgPool,
        run_id: DbId,
    ) -> Result<Vec<PayoutItem>, sqlx::Error> {
        let query = format!("SELECT {ITEM_COLUMNS} FROM payout_items WHERE run_id = $1 ORDER BY id");
        sqlx::query_as::<_, PayoutItem>(&query)
            .bind(run_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_item_by_idempotency_key(
        pool: &PgPool,
        key: &str,
    ) -> Result<Option<PayoutItem>, sqlx::Error> {
        let query = format!("SELECT {ITEM_COLUMNS} FROM payout_items WHERE idempotency_key = $1");
        sqlx::query_as::<_, PayoutItem>(&query)
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    /// The queued item for a request, if any (gift-card settlement path).
    pub async fn queued_item_for_request(
        pool: &PgPool,
        request_id: DbId,
    ) -> Result<Option<PayoutItem>, sqlx::Error> {
        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM payout_items \
             WHERE request_id = $1 AND status_id = $2"
        );
        sqlx::query_as::<_, PayoutItem>(&query)
            .bind(request_id)
            .bind(PayoutItemStatus::Queued.id())
            .fetch_optional(pool)
            .await
    }

    /// Record the provider's batch id once the submission is acknowledged.
    pub async fn set_provider_batch(
        pool: &PgPool,
        run_id: DbId,
        provider_batch_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE payout_runs SET provider_batch_id = $2 WHERE id = $1")
            .bind(run_id)
            .bind(provider_batch_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Record the provider's per-item id for an item still awaiting a
    /// terminal outcome (provider returned `pending`).
    pub async fn set_provider_item(
        pool: &PgPool,
        item_id: DbId,
        provider_item_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE payout_items SET provider_item_id = $2 \
             WHERE id = $1 AND provider_item_id IS NULL",
        )
        .bind(item_id)
        .bind(provider_item_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Settle one item as paid: item `queued -> success`, request
    /// `processing -> fulfilled`, and the additive threshold update, all in
    /// one transaction. Returns `None` (a no-op) when the item was already
    /// terminal, which is what makes callback replay safe.
    pub async fn apply_item_success(
        pool: &PgPool,
        thresholds: &ThresholdRepo,
        item_id: DbId,
        provider_item_id: Option<&str>,
        year: i32,
    ) -> Result<Option<(PayoutItem, PayoutRequest, ThresholdRecord)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let update_item = format!(
            "UPDATE payout_items \
             SET status_id = $2, provider_item_id = COALESCE($3, provider_item_id) \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {ITEM_COLUMNS}"
        );
        let Some(item) = sqlx::query_as::<_, PayoutItem>(&update_item)
            .bind(item_id)
            .bind(PayoutItemStatus::Success.id())
            .bind(provider_item_id)
            .bind(PayoutItemStatus::Queued.id())
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let Some(request) = PayoutRequestRepo::transition_with(
            &mut tx,
            item.request_id,
            PayoutRequestStatus::Processing,
            PayoutRequestStatus::Fulfilled,
            None,
        )
        .await?
        else {
            // Item was queued but its request is not processing: state drift
            // that must be looked at by a human, not papered over.
            tx.rollback().await?;
            return Ok(None);
        };

        let record = thresholds
            .record_success_with(&mut tx, request.user_id, year, item.amount_usd_cents)
            .await?;

        tx.commit().await?;
        Ok(Some((item, request, record)))
    }

    /// Settle one item as failed: item `queued -> failed`, request
    /// `processing -> failed`, refund credit: one transaction, idempotent
    /// through the item-level CAS.
    pub async fn apply_item_failure(
        pool: &PgPool,
        item_id: DbId,
        provider_item_id: Option<&str>,
        failure_reason: &str,
    ) -> Result<Option<(PayoutItem, PayoutRequest, LedgerEntry)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let update_item = format!(
            "UPDATE payout_items \
             SET status_id = $2, provider_item_id = COALESCE($3, provider_item_id), \
                 failure_reason = $4 \
             WHERE id = $1 AND status_id = $5 \
             RETURNING {ITEM_COLUMNS}"
        );
        let Some(item) = sqlx::query_as::<_, PayoutItem>(&update_item)
            .bind(item_id)
            .bind(PayoutItemStatus::Failed.id())
            .bind(provider_item_id)
            .bind(failure_reason)
            .bind(PayoutItemStatus::Queued.id())
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let Some(request) = PayoutRequestRepo::transition_with(
            &mut tx,
            item.request_id,
            PayoutRequestStatus::Processing,
            PayoutRequestStatus::Failed,
            None,
        )
        .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let entry = LedgerRepo::credit_with(
            &mut tx,
            request.user_id,
            request.coins_requested,
            CoinType::Paid,
            REASON_PAYOUT_REFUND,
            Some(request.id),
        )
        .await?;

        tx.commit().await?;
        Ok(Some((item, request, entry)))
    }

    /// A provider `returned` outcome after settlement: the money came back.
    ///
    /// Item `success -> returned`, request `fulfilled -> failed`, refund
    /// credit, and a negative threshold correction. The `requires_1099`
    /// latch stays set (regulatory status never silently disappears).
    pub async fn apply_item_returned(
        pool: &PgPool,
        thresholds: &ThresholdRepo,
        item_id: DbId,
        failure_reason: &str,
        year: i32,
    ) -> Result<Option<(PayoutItem, PayoutRequest)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let update_item = format!(
            "UPDATE payout_items \
             SET status_id = $2, failure_reason = $3 \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {ITEM_COLUMNS}"
        );
        let Some(item) = sqlx::query_as::<_, PayoutItem>(&update_item)
            .bind(item_id)
            .bind(PayoutItemStatus::Returned.id())
            .bind(failure_reason)
            .bind(PayoutItemStatus::Success.id())
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let Some(request) = PayoutRequestRepo::transition_with(
            &mut tx,
            item.request_id,
            PayoutRequestStatus::Fulfilled,
            PayoutRequestStatus::Failed,
            None,
        )
        .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        LedgerRepo::credit_with(
            &mut tx,
            request.user_id,
            request.coins_requested,
            CoinType::Paid,
            REASON_PAYOUT_REFUND,
            Some(request.id),
        )
        .await?;

        thresholds
            .record_correction_with(&mut tx, request.user_id, year, -item.amount_usd_cents)
            .await?;

        tx.commit().await?;
        Ok(Some((item, request)))
    }

    /// Close a run once no item is left `queued`: `completed` iff every item
    /// settled `success`, otherwise `failed` (partial success is recorded
    /// per-item; the run flag means "needs operator attention").
    ///
    /// Returns `None` while queued items remain or if the run already closed.
    pub async fn close_if_settled(
        pool: &PgPool,
        run_id: DbId,
    ) -> Result<Option<PayoutRun>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let (queued, non_success): (i64, i64) = sqlx::query_as(
            "SELECT \
                 COUNT(*) FILTER (WHERE status_id = $2), \
                 COUNT(*) FILTER (WHERE status_id NOT IN ($2, $3)) \
             FROM payout_items WHERE run_id = $1",
        )
        .bind(run_id)
        .bind(PayoutItemStatus::Queued.id())
        .bind(PayoutItemStatus::Success.id())
        .fetch_one(&mut *tx)
        .await?;

        if queued > 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let final_status = if non_success == 0 {
            PayoutRunStatus::Completed
        } else {
            PayoutRunStatus::Failed
        };

        let update = format!(
            "UPDATE payout_runs \
             SET status_id = $2, completed_at = NOW() \
             WHERE id = $1 AND status_id = $3 \
             RETURNING {RUN_COLUMNS}"
        );
        let run = sqlx::query_as::<_, PayoutRun>(&update)
            .bind(run_id)
            .bind(final_status.id())
            .bind(PayoutRunStatus::Processing.id())
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(run)
    }

    /// Items in this run that were never acknowledged by the provider and
    /// are therefore safe to resubmit under the same idempotency keys.
    pub async fn resubmittable_items(
        pool: &PgPool,
        run_id: DbId,
    ) -> Result<Vec<PayoutItem>, sqlx::Error> {
        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM payout_items \
             WHERE run_id = $1 AND status_id = $2 AND provider_item_id IS NULL \
             ORDER BY id"
        );
        sqlx::query_as::<_, PayoutItem>(&query)
            .bind(run_id)
            .bind(PayoutItemStatus::Queued.id())
            .fetch_all(pool)
            .await
    }

    /// Runs stuck in `processing` since before `cutoff` (reconciliation).
    pub async fn stuck_runs(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<PayoutRun>, sqlx::Error> {
        let query = format!(
            "SELECT {RUN_COLUMNS} FROM payout_runs \
             WHERE status_id = $1 AND started_at < $2 \
             ORDER BY started_at ASC"
        );
        sqlx::query_as::<_, PayoutRun>(&query)
            .bind(PayoutRunStatus::Processing.id())
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }
}
