//! Event-to-alert routing.
//!
//! [`AlertRouter`] subscribes to the platform event bus and, for the event
//! types that demand operator attention, enqueues an [`OperatorAlert`] into
//! the outbox. Delivery itself happens in the worker's outbox drain loop,
//! so a slow or down alert endpoint can never block a settlement write.

use chrono::Utc;
use tokio::sync::broadcast;

use glowcast_core::alert::OperatorAlert;
use glowcast_db::models::outbox::TASK_OPERATOR_ALERT;
use glowcast_db::repositories::OutboxRepo;
use glowcast_db::DbPool;

use crate::bus::PlatformEvent;

/// Routes alert-worthy platform events into the outbox.
pub struct AlertRouter {
    pool: DbPool,
}

impl AlertRouter {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Run the routing loop until the event bus closes.
    pub async fn run(self, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = self.route(&event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            "Failed to route alert event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Alert router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, alert router shutting down");
                    break;
                }
            }
        }
    }

    /// Enqueue an alert for events that require one; ignore the rest.
    async fn route(&self, event: &PlatformEvent) -> Result<(), sqlx::Error> {
        let alert = match Self::alert_for(event) {
            Some(alert) => alert,
            None => return Ok(()),
        };

        let payload = serde_json::to_value(&alert)
            .expect("OperatorAlert serialization cannot fail");
        OutboxRepo::enqueue(&self.pool, TASK_OPERATOR_ALERT, &payload).await?;

        tracing::info!(
            kind = %alert.kind,
            entity_id = alert.entity_id,
            "Operator alert enqueued"
        );
        Ok(())
    }

    /// The alert (if any) an event maps to.
    fn alert_for(event: &PlatformEvent) -> Option<OperatorAlert> {
        let entity_id = event.source_entity_id?;
        match event.event_type.as_str() {
            "fulfillment.failed" => {
                let reason = event.payload["failure_reason"].as_str().unwrap_or("unknown");
                Some(OperatorAlert::fulfillment_failed(entity_id, reason, Utc::now()))
            }
            "run.stuck" => Some(OperatorAlert::run_stuck(entity_id, Utc::now())),
            "run.dispatch_unacknowledged" => {
                let error = event.payload["error"].as_str().unwrap_or("unknown");
                Some(OperatorAlert::dispatch_unacknowledged(
                    entity_id,
                    error,
                    Utc::now(),
                ))
            }
            _ => None,
        }
    }
}
