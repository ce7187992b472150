//! Repository for the `payout_requests` table.
//!
//! Every state transition is a single compare-and-set on `status_id` (and,
//! separately, on `is_held`): the UPDATE carries the expected source state
//! in its WHERE clause and 0 affected rows means the row moved concurrently.
//! Callers translate that into a stale-state error and re-fetch; nothing is
//! ever overwritten blind.
//!
//! Refunds are coupled to the status write that causes them: deny, cancel,
//! and fail-with-refund run the credit and the CAS inside one transaction,
//! so both commit or neither does.

use sqlx::{PgConnection, PgPool};

use glowcast_core::coins::{CoinType, REASON_PAYOUT_REFUND, REASON_PAYOUT_RESERVE};
use glowcast_core::hold::{
    ACTION_APPROVE, ACTION_CANCEL, ACTION_DENY, ACTION_HOLD, ACTION_RELEASE, ACTION_REQUEUE,
};
use glowcast_core::paging::{clamp_limit, clamp_offset};
use glowcast_core::types::{DbId, Timestamp};

use crate::models::balance::LedgerEntry;
use crate::models::payout_request::{PayoutListQuery, PayoutRequest, QueueDepth, SubmitPayout};
use crate::models::status::{PayoutRequestStatus, StatusId};
use crate::repositories::audit_repo::AuditRepo;
use crate::repositories::ledger_repo::{DebitOutcome, LedgerRepo};

/// Column list for `payout_requests` queries.
pub(crate) const COLUMNS: &str = "\
    id, user_id, coins_requested, usd_cents, method, destination, \
    status_id, is_held, hold_reason, hold_release_date, \
    processed_by, processed_at, created_at, updated_at";

/// Result of a create-and-reserve attempt.
#[derive(Debug)]
pub enum CreateOutcome {
    /// Request row created and coins reserved.
    Created(PayoutRequest, LedgerEntry),
    /// Balance too low; nothing was persisted.
    Insufficient { available: i64 },
}

/// Result of an operator requeue of a failed request.
#[derive(Debug)]
pub enum RequeueOutcome {
    /// Request back in `pending` with a fresh reservation.
    Requeued(PayoutRequest, LedgerEntry),
    /// Balance too low to re-reserve; request stays `failed`.
    Insufficient { available: i64, requested: i64 },
    /// The request was not in `failed` state.
    Stale,
}

/// Provides lifecycle operations for payout requests.
pub struct PayoutRequestRepo;

impl PayoutRequestRepo {
    /// Create a request in `pending` and reserve its coins, atomically.
    ///
    /// The insert and the reservation debit share one transaction: if the
    /// balance is too low the insert is rolled back and nothing persists,
    /// satisfying the "rejected synchronously, nothing persisted" contract.
    pub async fn create_reserved(
        pool: &PgPool,
        input: &SubmitPayout,
        usd_cents: i64,
    ) -> Result<CreateOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let insert = format!(
            "INSERT INTO payout_requests (user_id, coins_requested, usd_cents, method, destination, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        let request = sqlx::query_as::<_, PayoutRequest>(&insert)
            .bind(input.user_id)
            .bind(input.coins)
            .bind(usd_cents)
            .bind(&input.method)
            .bind(&input.destination)
            .bind(PayoutRequestStatus::Pending.id())
            .fetch_one(&mut *tx)
            .await?;

        let outcome = LedgerRepo::debit_with(
            &mut tx,
            input.user_id,
            input.coins,
            REASON_PAYOUT_RESERVE,
            Some(request.id),
        )
        .await?;

        match outcome {
            DebitOutcome::Applied(entry) => {
                tx.commit().await?;
                Ok(CreateOutcome::Created(request, entry))
            }
            DebitOutcome::Insufficient { available } => {
                tx.rollback().await?;
                Ok(CreateOutcome::Insufficient { available })
            }
        }
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<PayoutRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM payout_requests WHERE id = $1");
        sqlx::query_as::<_, PayoutRequest>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List requests with optional status / user / hold filters.
    pub async fn list(
        pool: &PgPool,
        filter: &PayoutListQuery,
    ) -> Result<Vec<PayoutRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM payout_requests \
             WHERE ($1::SMALLINT IS NULL OR status_id = $1) \
               AND ($2::BIGINT IS NULL OR user_id = $2) \
               AND ($3::BOOLEAN IS NULL OR is_held = $3) \
             ORDER BY created_at DESC \
             LIMIT $4 OFFSET $5"
        );
        sqlx::query_as::<_, PayoutRequest>(&query)
            .bind(filter.status_id)
            .bind(filter.user_id)
            .bind(filter.is_held)
            .bind(clamp_limit(filter.limit))
            .bind(clamp_offset(filter.offset))
            .fetch_all(pool)
            .await
    }

    /// Compare-and-set status transition.
    ///
    /// Returns `None` when the row was not in `from` state (concurrent
    /// transition); the caller maps that to a stale-state error.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: PayoutRequestStatus,
        to: PayoutRequestStatus,
        processed_by: Option<DbId>,
    ) -> Result<Option<PayoutRequest>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let request = Self::transition_with(&mut tx, id, from, to, processed_by).await?;
        tx.commit().await?;
        Ok(request)
    }

    /// Transaction-composable variant of [`transition`](Self::transition).
    pub async fn transition_with(
        conn: &mut PgConnection,
        id: DbId,
        from: PayoutRequestStatus,
        to: PayoutRequestStatus,
        processed_by: Option<DbId>,
    ) -> Result<Option<PayoutRequest>, sqlx::Error> {
        let update = format!(
            "UPDATE payout_requests \
             SET status_id = $3, \
                 processed_by = COALESCE($4, processed_by), \
                 processed_at = NOW() \
             WHERE id = $1 AND status_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PayoutRequest>(&update)
            .bind(id)
            .bind(from.id())
            .bind(to.id())
            .bind(processed_by)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Operator approval: pending -> approved, with an audit row.
    pub async fn approve(
        pool: &PgPool,
        id: DbId,
        operator_id: DbId,
    ) -> Result<Option<PayoutRequest>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let Some(request) = Self::transition_with(
            &mut tx,
            id,
            PayoutRequestStatus::Pending,
            PayoutRequestStatus::Approved,
            Some(operator_id),
        )
        .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };
        AuditRepo::insert_with(&mut tx, id, operator_id, ACTION_APPROVE, None).await?;
        tx.commit().await?;
        Ok(Some(request))
    }

    /// Operator denial: pending -> denied plus the refund credit, one tx.
    pub async fn deny(
        pool: &PgPool,
        id: DbId,
        operator_id: DbId,
        reason: &str,
    ) -> Result<Option<(PayoutRequest, LedgerEntry)>, sqlx::Error> {
        Self::terminate_with_refund(
            pool,
            id,
            PayoutRequestStatus::Pending,
            PayoutRequestStatus::Denied,
            operator_id,
            ACTION_DENY,
            Some(reason),
        )
        .await
    }

    /// User cancellation of their own pending request. Same shape as a
    /// denial but guarded on ownership.
    pub async fn cancel(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<(PayoutRequest, LedgerEntry)>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let update = format!(
            "UPDATE payout_requests \
             SET status_id = $3, processed_by = $2, processed_at = NOW() \
             WHERE id = $1 AND status_id = $4 AND user_id = $2 \
             RETURNING {COLUMNS}"
        );
        let Some(request) = sqlx::query_as::<_, PayoutRequest>(&update)
            .bind(id)
            .bind(user_id)
            .bind(PayoutRequestStatus::Denied.id())
            .bind(PayoutRequestStatus::Pending.id())
            .fetch_optional(&mut *tx)
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
            Some(id),
        )
        .await?;
        AuditRepo::insert_with(&mut tx, id, user_id, ACTION_CANCEL, None).await?;
        tx.commit().await?;
        Ok(Some((request, entry)))
    }

    /// Shared deny/fail path: CAS into a terminal-negative state and credit
    /// the refund in the same transaction.
    async fn terminate_with_refund(
        pool: &PgPool,
        id: DbId,
        from: PayoutRequestStatus,
        to: PayoutRequestStatus,
        actor_id: DbId,
        action: &str,
        reason: Option<&str>,
    ) -> Result<Option<(PayoutRequest, LedgerEntry)>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let Some(request) = Self::transition_with(&mut tx, id, from, to, Some(actor_id)).await?
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
            Some(id),
        )
        .await?;
        AuditRepo::insert_with(&mut tx, id, actor_id, action, reason).await?;
        tx.commit().await?;
        Ok(Some((request, entry)))
    }

    /// Operator requeue of a failed request: failed -> pending plus a fresh
    /// reservation debit (the failure refund already returned the coins).
    pub async fn requeue(
        pool: &PgPool,
        id: DbId,
        operator_id: DbId,
    ) -> Result<RequeueOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let Some(request) = Self::transition_with(
            &mut tx,
            id,
            PayoutRequestStatus::Failed,
            PayoutRequestStatus::Pending,
            Some(operator_id),
        )
        .await?
        else {
            tx.rollback().await?;
            return Ok(RequeueOutcome::Stale);
        };

        let outcome = LedgerRepo::debit_with(
            &mut tx,
            request.user_id,
            request.coins_requested,
            REASON_PAYOUT_RESERVE,
            Some(id),
        )
        .await?;

        match outcome {
            DebitOutcome::Applied(entry) => {
                AuditRepo::insert_with(&mut tx, id, operator_id, ACTION_REQUEUE, None).await?;
                tx.commit().await?;
                Ok(RequeueOutcome::Requeued(request, entry))
            }
            DebitOutcome::Insufficient { available } => {
                tx.rollback().await?;
                Ok(RequeueOutcome::Insufficient {
                    available,
                    requested: request.coins_requested,
                })
            }
        }
    }

    /// Attach an administrative hold. Valid only while the request is still
    /// `pending` and not already held; CAS on both conditions.
    pub async fn hold(
        pool: &PgPool,
        id: DbId,
        operator_id: DbId,
        reason: &str,
        release_date: Option<Timestamp>,
    ) -> Result<Option<PayoutRequest>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let update = format!(
            "UPDATE payout_requests \
             SET is_held = TRUE, hold_reason = $3, hold_release_date = $4 \
             WHERE id = $1 AND status_id = $2 AND is_held = FALSE \
             RETURNING {COLUMNS}"
        );
        let Some(request) = sqlx::query_as::<_, PayoutRequest>(&update)
            .bind(id)
            .bind(PayoutRequestStatus::Pending.id())
            .bind(reason)
            .bind(release_date)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };
        AuditRepo::insert_with(&mut tx, id, operator_id, ACTION_HOLD, Some(reason)).await?;
        tx.commit().await?;
        Ok(Some(request))
    }

    /// Release a hold. The request resumes exactly where it left off;
    /// `status_id` is untouched.
    pub async fn release(
        pool: &PgPool,
        id: DbId,
        operator_id: DbId,
    ) -> Result<Option<PayoutRequest>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let update = format!(
            "UPDATE payout_requests \
             SET is_held = FALSE, hold_reason = NULL, hold_release_date = NULL \
             WHERE id = $1 AND is_held = TRUE \
             RETURNING {COLUMNS}"
        );
        let Some(request) = sqlx::query_as::<_, PayoutRequest>(&update)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };
        AuditRepo::insert_with(&mut tx, id, operator_id, ACTION_RELEASE, None).await?;
        tx.commit().await?;
        Ok(Some(request))
    }

    /// Operator queue depth by lifecycle bucket, for the dashboard snapshot.
    pub async fn queue_depth(pool: &PgPool) -> Result<QueueDepth, sqlx::Error> {
        sqlx::query_as::<_, QueueDepth>(
            "SELECT \
                 COUNT(*) FILTER (WHERE status_id = $1 AND NOT is_held) AS pending, \
                 COUNT(*) FILTER (WHERE status_id = $2 AND NOT is_held) AS approved, \
                 COUNT(*) FILTER (WHERE status_id = $3) AS processing, \
                 COUNT(*) FILTER (WHERE is_held) AS held \
             FROM payout_requests",
        )
        .bind(PayoutRequestStatus::Pending.id())
        .bind(PayoutRequestStatus::Approved.id())
        .bind(PayoutRequestStatus::Processing.id())
        .fetch_one(pool)
        .await
    }

    /// Raw status read, for stale-state error reporting.
    pub async fn current_status(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<StatusId>, sqlx::Error> {
        let row: Option<(StatusId,)> =
            sqlx::query_as("SELECT status_id FROM payout_requests WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|(s,)| s))
    }
}
