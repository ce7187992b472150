//! IRS 1099 reporting threshold logic.
//!
//! US tax rules require a 1099 filing once a creator's cumulative yearly
//! payout reaches $600. The flag is sticky: once a `(user, year)` pair has
//! crossed the threshold it stays flagged even if later corrections pull
//! the running total back under; a reporting obligation, once triggered,
//! must not silently disappear.

use crate::types::UsdCents;

/// Yearly paid-out total at which `requires_1099` latches ($600.00).
pub const REPORTING_THRESHOLD_CENTS: UsdCents = 60_000;

/// Whether a running total has reached the reporting threshold.
pub fn crosses_threshold(total_paid_usd_cents: UsdCents) -> bool {
    total_paid_usd_cents >= REPORTING_THRESHOLD_CENTS
}

/// Compute the next value of the sticky `requires_1099` flag.
///
/// Latches to `true` and never releases.
pub fn next_requires_1099(current: bool, new_total_cents: UsdCents) -> bool {
    current || crosses_threshold(new_total_cents)
}
