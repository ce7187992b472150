//! glowcast payout worker: the scheduled/cron side of the engine.
//!
//! Runs three independent loops, each cancellable for graceful shutdown:
//!
//! - **batch trigger** -- fires `engine::batch::run_batch` on the weekly
//!   cadence (Mon/Fri by default).
//! - **outbox drain** -- delivers operator alert webhooks at-least-once
//!   with exponential backoff.
//! - **reconciliation sweep** -- resolves runs stuck in `processing`
//!   against the partner's records, escalating what it cannot resolve.

mod batch_trigger;
mod outbox_drain;
mod reconcile_sweep;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use glowcast_db::repositories::ThresholdRepo;
use glowcast_engine::EngineContext;
use glowcast_provider::HttpPayoutProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "glowcast_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = glowcast_db::create_pool(&database_url).await?;
    glowcast_db::health_check(&pool).await?;
    glowcast_db::run_migrations(&pool).await?;
    tracing::info!("Database ready");

    let thresholds = ThresholdRepo::detect(&pool).await?;
    tracing::info!(schema = ?thresholds.schema(), "Threshold storage adapter selected");

    let provider = Arc::new(HttpPayoutProvider::new(
        std::env::var("PROVIDER_BASE_URL").unwrap_or_else(|_| "http://localhost:9400".into()),
        std::env::var("PROVIDER_API_KEY").unwrap_or_else(|_| "dev-key".into()),
    ));

    let bus = Arc::new(glowcast_events::EventBus::default());
    tokio::spawn(glowcast_events::EventPersistence::run(
        pool.clone(),
        bus.subscribe(),
    ));
    let alert_router = glowcast_events::AlertRouter::new(pool.clone());
    tokio::spawn(alert_router.run(bus.subscribe()));

    let ctx = EngineContext::new(
        pool.clone(),
        provider,
        thresholds,
        Arc::clone(&bus),
        std::env::var("GIFT_CARD_PROVIDER").unwrap_or_else(|_| "tango".into()),
    );

    let cancel = tokio_util::sync::CancellationToken::new();

    let batch_handle = tokio::spawn(batch_trigger::run(ctx.clone(), cancel.clone()));
    let outbox_handle = tokio::spawn(outbox_drain::run(pool.clone(), cancel.clone()));
    let sweep_handle = tokio::spawn(reconcile_sweep::run(ctx.clone(), cancel.clone()));

    tracing::info!("Worker loops started (batch trigger, outbox drain, reconciliation)");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping worker loops");
    cancel.cancel();

    let _ = tokio::join!(batch_handle, outbox_handle, sweep_handle);
    Ok(())
}
