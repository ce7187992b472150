//! Event bus and operator alert infrastructure for the payout engine.
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`] — the canonical domain event envelope; every payout
//!   lifecycle edge publishes one.
//! - [`EventPersistence`] — background service that durably writes every
//!   event to the `events` table (the operator-facing change log).
//! - [`AlertRouter`] — routes critical events into the outbox so alert
//!   delivery is at-least-once and never blocks the write path.
//! - [`WebhookDelivery`] — signed webhook delivery for operator alerts.

pub mod alerts;
pub mod bus;
pub mod delivery;
pub mod persistence;

pub use alerts::AlertRouter;
pub use bus::{EventBus, PlatformEvent};
pub use delivery::WebhookDelivery;
pub use persistence::EventPersistence;
