use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use glowcast_api::config::ServerConfig;
use glowcast_api::router::build_app_router;
use glowcast_api::{background, state};
use glowcast_core::cache::SnapshotCell;
use glowcast_db::repositories::ThresholdRepo;
use glowcast_engine::EngineContext;
use glowcast_provider::HttpPayoutProvider;

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "glowcast_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = glowcast_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    glowcast_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    glowcast_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Threshold storage adapter (capability probe) ---
    let thresholds = ThresholdRepo::detect(&pool)
        .await
        .expect("Failed to probe threshold storage schema");
    tracing::info!(schema = ?thresholds.schema(), "Threshold storage adapter selected");

    // --- Payout partner client ---
    let provider = Arc::new(HttpPayoutProvider::new(
        config.provider_base_url.clone(),
        config.provider_api_key.clone(),
    ));

    // --- Event bus ---
    let event_bus = Arc::new(glowcast_events::EventBus::default());
    tracing::info!("Event bus created");

    // Spawn event persistence (writes all events to the database).
    tokio::spawn(glowcast_events::EventPersistence::run(
        pool.clone(),
        event_bus.subscribe(),
    ));

    // Spawn the alert router (critical events -> outbox; the worker delivers).
    let alert_router = glowcast_events::AlertRouter::new(pool.clone());
    tokio::spawn(alert_router.run(event_bus.subscribe()));

    tracing::info!("Event services started (persistence, alert router)");

    // --- Engine context ---
    let engine = EngineContext::new(
        pool.clone(),
        provider,
        thresholds,
        Arc::clone(&event_bus),
        config.gift_card_provider.clone(),
    );

    // --- Queue depth snapshot ---
    let queue_depth = Arc::new(SnapshotCell::new());
    let queue_cancel = tokio_util::sync::CancellationToken::new();
    tokio::spawn(background::queue_depth::run(
        pool.clone(),
        Arc::clone(&queue_depth),
        queue_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        engine,
        event_bus: Arc::clone(&event_bus),
        queue_depth,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Serve ---
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid HOST/PORT combination");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {addr}: {e}"));
    tracing::info!(%addr, "glowcast payout API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install ctrl-c handler");
            tracing::info!("Shutdown signal received");
            queue_cancel.cancel();
        })
        .await
        .expect("Server error");
}
