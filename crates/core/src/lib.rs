//! Shared domain logic for the glowcast payout & settlement engine.
//!
//! This crate has zero internal dependencies so it can be used by the
//! db/repository layer, the API, the worker, and any future CLI tooling.

pub mod alert;
pub mod cache;
pub mod coins;
pub mod dispatch;
pub mod error;
pub mod hold;
pub mod paging;
pub mod payout;
pub mod schedule;
pub mod threshold;
pub mod types;
