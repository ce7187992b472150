//! Scheduled batch trigger.
//!
//! Sleeps until the next cadence fire time (Mon/Fri 16:00 UTC unless
//! overridden), then drives `engine::batch::run_batch`, the same entry
//! point the manual `POST /payout-runs` uses. An empty eligible set is a
//! no-op, never an empty run row.

use glowcast_core::schedule::BatchCadence;
use glowcast_engine::{batch, EngineContext};
use tokio_util::sync::CancellationToken;

/// Read the cadence from `BATCH_RUN_DAYS` / `BATCH_RUN_HOUR_UTC`.
///
/// A malformed value fails fast at startup rather than silently dropping
/// a run day.
fn cadence_from_env() -> BatchCadence {
    let days = std::env::var("BATCH_RUN_DAYS").unwrap_or_else(|_| "MON,FRI".into());
    let hour: u32 = std::env::var("BATCH_RUN_HOUR_UTC")
        .unwrap_or_else(|_| "16".into())
        .parse()
        .expect("BATCH_RUN_HOUR_UTC must be a valid hour");
    BatchCadence::parse(&days, hour)
        .unwrap_or_else(|e| panic!("Invalid BATCH_RUN_DAYS/BATCH_RUN_HOUR_UTC: {e}"))
}

/// Run the trigger loop until `cancel` fires.
pub async fn run(ctx: EngineContext, cancel: CancellationToken) {
    let cadence = cadence_from_env();
    tracing::info!(days = ?cadence.days, hour_utc = cadence.hour_utc, "Batch trigger started");

    loop {
        let now = chrono::Utc::now();
        let next = cadence.next_fire_after(now);
        let sleep_for = (next - now)
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60));
        tracing::info!(next_run = %next, "Sleeping until next payout run");

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Batch trigger stopping");
                break;
            }
            _ = tokio::time::sleep(sleep_for) => {
                match batch::run_batch(&ctx).await {
                    Ok(Some(report)) => {
                        tracing::info!(
                            run_id = report.run.id,
                            direct = report.direct_items,
                            gift_cards = report.gift_card_items,
                            succeeded = report.succeeded,
                            failed = report.failed,
                            pending = report.pending,
                            "Scheduled payout run finished"
                        );
                    }
                    Ok(None) => {
                        tracing::info!("Scheduled trigger found no eligible requests");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Scheduled payout run failed");
                    }
                }
            }
        }
    }
}
