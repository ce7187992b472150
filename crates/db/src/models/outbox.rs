//! Outbox task model (at-least-once side-effect delivery).

use serde::Serialize;
use sqlx::FromRow;

use glowcast_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// Task type for operator alert webhook delivery.
pub const TASK_OPERATOR_ALERT: &str = "operator_alert";

/// A row from `outbox_tasks`.
///
/// Enqueued inside the transaction that produced the side effect, claimed
/// by the worker with `FOR UPDATE SKIP LOCKED`, and retried with backoff
/// until delivered or the attempt budget is exhausted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OutboxTask {
    pub id: DbId,
    pub task_type: String,
    pub payload: serde_json::Value,
    pub status_id: StatusId,
    pub attempts: i32,
    pub next_attempt_at: Timestamp,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
