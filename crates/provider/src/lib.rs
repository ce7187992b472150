//! External payout-partner integration.
//!
//! One crate owns everything that talks to the payment partner: the wire
//! DTOs, the [`PayoutProvider`] trait, the production HTTP client, and the
//! in-memory mock the engine tests drive. Callback signature verification
//! lives here too since the signing scheme is part of the partner contract.

pub mod api;
pub mod client;
pub mod mock;

pub use api::{BatchItem, BatchOutcome, BatchSubmission, ItemOutcome, ItemStatus};
pub use client::{verify_callback_signature, HttpPayoutProvider, PayoutProvider, ProviderError};
pub use mock::MockProvider;
