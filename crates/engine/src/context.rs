//! Shared engine context.

use std::sync::Arc;

use glowcast_db::repositories::ThresholdRepo;
use glowcast_db::DbPool;
use glowcast_events::EventBus;
use glowcast_provider::PayoutProvider;

/// Everything the engine operations need, bundled for cheap cloning.
///
/// The provider is a trait object so the worker, the API, and the tests
/// can swap the HTTP client for the mock without touching call sites.
#[derive(Clone)]
pub struct EngineContext {
    pub pool: DbPool,
    pub provider: Arc<dyn PayoutProvider>,
    /// Threshold repo bound to the schema version probed at startup.
    pub thresholds: ThresholdRepo,
    pub bus: Arc<EventBus>,
    /// Partner name recorded on staged gift-card fulfillments.
    pub gift_card_provider: String,
}

impl EngineContext {
    pub fn new(
        pool: DbPool,
        provider: Arc<dyn PayoutProvider>,
        thresholds: ThresholdRepo,
        bus: Arc<EventBus>,
        gift_card_provider: String,
    ) -> Self {
        Self {
            pool,
            provider,
            thresholds,
            bus,
            gift_card_provider,
        }
    }
}
