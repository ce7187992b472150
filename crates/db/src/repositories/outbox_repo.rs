//! Repository for the `outbox_tasks` table.
//!
//! The outbox decouples side-effect delivery (operator alert webhooks)
//! from the write path that produced them: the alert router enqueues a
//! task per alert-worthy event and the worker drains with at-least-once
//! semantics. Claims use `FOR UPDATE SKIP LOCKED` so multiple worker
//! instances never double-claim.

use sqlx::PgPool;

use glowcast_core::types::DbId;

use crate::models::outbox::OutboxTask;
use crate::models::status::OutboxStatus;

/// Column list for `outbox_tasks` queries.
const COLUMNS: &str = "\
    id, task_type, payload, status_id, attempts, next_attempt_at, \
    last_error, created_at, updated_at";

/// Attempts after which a task is parked as `failed` and stops retrying.
pub const MAX_ATTEMPTS: i32 = 8;

/// Provides enqueue, claim, and settle operations for outbox tasks.
pub struct OutboxRepo;

impl OutboxRepo {
    /// Enqueue a delivery task, due immediately.
    pub async fn enqueue(
        pool: &PgPool,
        task_type: &str,
        payload: &serde_json::Value,
    ) -> Result<OutboxTask, sqlx::Error> {
        let insert = format!(
            "INSERT INTO outbox_tasks (task_type, payload) \
             VALUES ($1, $2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, OutboxTask>(&insert)
            .bind(task_type)
            .bind(payload)
            .fetch_one(pool)
            .await
    }

    /// Claim up to `limit` due tasks, bumping their attempt counter.
    pub async fn claim_due(pool: &PgPool, limit: i64) -> Result<Vec<OutboxTask>, sqlx::Error> {
        let query = format!(
            "UPDATE outbox_tasks \
             SET attempts = attempts + 1 \
             WHERE id IN ( \
                 SELECT id FROM outbox_tasks \
                 WHERE status_id = $1 AND next_attempt_at <= NOW() \
                 ORDER BY next_attempt_at ASC \
                 LIMIT $2 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, OutboxTask>(&query)
            .bind(OutboxStatus::Pending.id())
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Mark a task delivered.
    pub async fn mark_delivered(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE outbox_tasks SET status_id = $2, last_error = NULL WHERE id = $1")
            .bind(id)
            .bind(OutboxStatus::Delivered.id())
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Record a delivery failure and schedule the next attempt, or park the
    /// task as `failed` once the attempt budget is exhausted.
    pub async fn mark_retry(
        pool: &PgPool,
        id: DbId,
        attempts: i32,
        error: &str,
        backoff_secs: i64,
    ) -> Result<(), sqlx::Error> {
        if attempts >= MAX_ATTEMPTS {
            sqlx::query("UPDATE outbox_tasks SET status_id = $2, last_error = $3 WHERE id = $1")
                .bind(id)
                .bind(OutboxStatus::Failed.id())
                .bind(error)
                .execute(pool)
                .await?;
        } else {
            sqlx::query(
                "UPDATE outbox_tasks \
                 SET last_error = $2, next_attempt_at = NOW() + ($3 || ' seconds')::INTERVAL \
                 WHERE id = $1",
            )
            .bind(id)
            .bind(error)
            .bind(backoff_secs.to_string())
            .execute(pool)
            .await?;
        }
        Ok(())
    }
}
