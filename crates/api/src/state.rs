use std::sync::Arc;

use glowcast_core::cache::SnapshotCell;
use glowcast_db::models::payout_request::QueueDepth;
use glowcast_engine::EngineContext;
use glowcast_events::EventBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: glowcast_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Engine context (pool + provider + threshold store + event bus).
    pub engine: EngineContext,
    /// Centralized event bus for publishing platform events.
    pub event_bus: Arc<EventBus>,
    /// Version-guarded operator queue depth snapshot.
    pub queue_depth: Arc<SnapshotCell<QueueDepth>>,
}
