//! Request handlers, one module per route group.

pub mod callbacks;
pub mod events;
pub mod fulfillments;
pub mod ledger;
pub mod payout_runs;
pub mod payouts;
pub mod queue;
pub mod threshold;
