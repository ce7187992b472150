//! Outbox drain loop: at-least-once operator alert delivery.
//!
//! Claims due tasks with `FOR UPDATE SKIP LOCKED` (safe with multiple
//! worker instances), delivers each over the signed alert webhook, and
//! reschedules failures with exponential backoff until the attempt budget
//! runs out.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use glowcast_core::alert::OperatorAlert;
use glowcast_db::models::outbox::{OutboxTask, TASK_OPERATOR_ALERT};
use glowcast_db::repositories::OutboxRepo;
use glowcast_events::WebhookDelivery;

/// How often the outbox is polled for due tasks.
const DRAIN_INTERVAL: Duration = Duration::from_secs(10);

/// Tasks claimed per drain pass.
const CLAIM_BATCH: i64 = 20;

/// Backoff base: attempt n retries after `2^n * 30` seconds.
const BACKOFF_BASE_SECS: i64 = 30;

/// Run the drain loop until `cancel` fires.
pub async fn run(pool: PgPool, cancel: CancellationToken) {
    let delivery = WebhookDelivery::new(
        std::env::var("ALERT_WEBHOOK_URL").unwrap_or_else(|_| "http://localhost:9500/alerts".into()),
        std::env::var("ALERT_WEBHOOK_SECRET").unwrap_or_else(|_| "dev-alert-secret".into()),
    );

    tracing::info!(
        interval_secs = DRAIN_INTERVAL.as_secs(),
        "Outbox drain started"
    );

    let mut interval = tokio::time::interval(DRAIN_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Outbox drain stopping");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = drain_once(&pool, &delivery).await {
                    tracing::error!(error = %e, "Outbox drain pass failed");
                }
            }
        }
    }
}

/// One drain pass: claim due tasks and attempt delivery for each.
async fn drain_once(pool: &PgPool, delivery: &WebhookDelivery) -> Result<(), sqlx::Error> {
    let tasks = OutboxRepo::claim_due(pool, CLAIM_BATCH).await?;
    for task in tasks {
        deliver_task(pool, delivery, &task).await?;
    }
    Ok(())
}

async fn deliver_task(
    pool: &PgPool,
    delivery: &WebhookDelivery,
    task: &OutboxTask,
) -> Result<(), sqlx::Error> {
    if task.task_type != TASK_OPERATOR_ALERT {
        tracing::warn!(task_id = task.id, task_type = %task.task_type, "Unknown outbox task type");
        OutboxRepo::mark_retry(pool, task.id, i32::MAX, "unknown task type", 0).await?;
        return Ok(());
    }

    let alert: OperatorAlert = match serde_json::from_value(task.payload.clone()) {
        Ok(alert) => alert,
        Err(e) => {
            // Undeliverable payload; park it instead of retrying forever.
            OutboxRepo::mark_retry(pool, task.id, i32::MAX, &format!("bad payload: {e}"), 0)
                .await?;
            return Ok(());
        }
    };

    match delivery.deliver(&alert).await {
        Ok(()) => {
            tracing::info!(task_id = task.id, kind = %alert.kind, "Operator alert delivered");
            OutboxRepo::mark_delivered(pool, task.id).await?;
        }
        Err(e) => {
            let backoff = BACKOFF_BASE_SECS << task.attempts.min(10);
            tracing::warn!(
                task_id = task.id,
                attempts = task.attempts,
                backoff_secs = backoff,
                error = %e,
                "Alert delivery failed, rescheduling"
            );
            OutboxRepo::mark_retry(pool, task.id, task.attempts, &e.to_string(), backoff).await?;
        }
    }
    Ok(())
}
