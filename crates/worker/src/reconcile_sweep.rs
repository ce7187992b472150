//! Reconciliation sweep loop.
//!
//! Periodically asks the engine to examine runs stuck in `processing`.
//! Resolvable runs are settled from the partner's records; the rest are
//! escalated with a critical alert and left untouched, never guessed.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use glowcast_engine::{reconcile, EngineContext};

/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Default age after which a `processing` run counts as stuck.
const DEFAULT_STALE_AFTER_HOURS: i64 = 2;

/// Run the sweep loop until `cancel` fires.
pub async fn run(ctx: EngineContext, cancel: CancellationToken) {
    let stale_after_hours: i64 = std::env::var("RECONCILE_STALE_AFTER_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_STALE_AFTER_HOURS);

    tracing::info!(
        interval_secs = SWEEP_INTERVAL.as_secs(),
        stale_after_hours,
        "Reconciliation sweep started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reconciliation sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match reconcile::sweep(&ctx, stale_after_hours).await {
                    Ok(report) if report.runs_examined > 0 => {
                        tracing::info!(
                            examined = report.runs_examined,
                            resolved = report.runs_resolved,
                            escalated = report.runs_escalated,
                            "Sweep pass finished"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "Sweep pass failed");
                    }
                }
            }
        }
    }
}
