//! Payout request constants and lifecycle state machine.
//!
//! This module lives in `core` (zero internal deps) so the state machine is
//! shared by the repository layer, the API handlers, and the worker. The
//! status ids mirror the `payout_request_statuses` seed data 1-based.

// ---------------------------------------------------------------------------
// Business constants
// ---------------------------------------------------------------------------

/// Minimum coin amount a payout request may be submitted for.
pub const MIN_PAYOUT_COINS: i64 = 7_000;

/// Settlement via the external direct-transfer provider.
pub const METHOD_DIRECT: &str = "direct";

/// Settlement via a manually fulfilled gift-card code.
pub const METHOD_GIFT_CARD: &str = "gift_card";

/// All valid settlement methods.
pub const VALID_METHODS: &[&str] = &[METHOD_DIRECT, METHOD_GIFT_CARD];

/// Validate a submitted payout amount against the business minimum.
///
/// The balance check happens later, atomically, inside the reservation
/// transaction; this only rejects inputs that can never be accepted.
pub fn validate_submission(coins: i64) -> Result<(), String> {
    if coins < MIN_PAYOUT_COINS {
        return Err(format!(
            "coins must be at least {MIN_PAYOUT_COINS}, got {coins}"
        ));
    }
    Ok(())
}

/// Validate that a settlement method string is one of the accepted values.
pub fn validate_method(method: &str) -> Result<(), String> {
    if VALID_METHODS.contains(&method) {
        Ok(())
    } else {
        Err(format!(
            "Invalid method '{method}'. Must be one of: {}",
            VALID_METHODS.join(", ")
        ))
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Payout request status ids matching `payout_request_statuses` seed data.
///
/// Intentionally duplicated from the `db` crate's `PayoutRequestStatus`
/// enum because `core` must have zero internal deps.
pub mod state_machine {
    /// Returns the set of valid target status ids reachable from `from_status`.
    ///
    /// `fulfilled` (5) and `denied` (3) are terminal. `failed` (6) is
    /// terminal except for an explicit operator requeue back to `pending`.
    pub fn valid_transitions(from_status: i16) -> &'static [i16] {
        match from_status {
            // Pending -> Approved, Denied
            1 => &[2, 3],
            // Approved -> Processing (batch pickup only)
            2 => &[4],
            // Processing -> Fulfilled, Failed
            4 => &[5, 6],
            // Failed -> Pending (explicit operator requeue, never automatic)
            6 => &[1],
            // Terminal: Denied, Fulfilled
            3 | 5 => &[],
            // Unknown status: no transitions allowed
            _ => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a state transition, returning an error message for invalid ones.
    pub fn validate_transition(from: i16, to: i16) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(format!(
                "Invalid transition: {} ({from}) -> {} ({to})",
                status_name(from),
                status_name(to)
            ))
        }
    }

    /// A request in a terminal state can never move again (requeue excepted).
    pub fn is_terminal(status: i16) -> bool {
        matches!(status, 3 | 5)
    }

    /// Human-readable name for a status id (for error messages).
    pub fn status_name(id: i16) -> &'static str {
        match id {
            1 => "Pending",
            2 => "Approved",
            3 => "Denied",
            4 => "Processing",
            5 => "Fulfilled",
            6 => "Failed",
            _ => "Unknown",
        }
    }
}
