//! Periodic refresh of the operator queue depth snapshot.
//!
//! Polls the event change log on a short interval; when the cursor moved,
//! recomputes the aggregate and publishes it through the version-guarded
//! cell. A refresh that loses the race against a newer one is rejected by
//! the version comparator rather than clobbering fresher data.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use glowcast_core::cache::{SnapshotCell, VersionedSnapshot};
use glowcast_db::models::payout_request::QueueDepth;
use glowcast_db::repositories::{EventRepo, PayoutRequestRepo};

/// How often the change-log cursor is checked.
const REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Run the queue depth refresh loop until `cancel` is triggered.
pub async fn run(pool: PgPool, cell: Arc<SnapshotCell<QueueDepth>>, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = REFRESH_INTERVAL.as_secs(),
        "Queue depth refresher started"
    );

    let mut interval = tokio::time::interval(REFRESH_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Queue depth refresher stopping");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = refresh(&pool, &cell).await {
                    tracing::error!(error = %e, "Queue depth refresh failed");
                }
            }
        }
    }
}

async fn refresh(
    pool: &PgPool,
    cell: &SnapshotCell<QueueDepth>,
) -> Result<(), sqlx::Error> {
    let version = EventRepo::latest_id(pool).await?;
    if let Some(current) = cell.load() {
        if current.version >= version {
            // Change log has not moved; the snapshot is still current.
            return Ok(());
        }
    }

    let depth = PayoutRequestRepo::queue_depth(pool).await?;
    let accepted = cell.accept_if_newer(VersionedSnapshot::new(version, Utc::now(), depth));
    if accepted {
        tracing::debug!(version, "Queue depth snapshot refreshed");
    }
    Ok(())
}
