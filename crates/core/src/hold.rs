//! Administrative hold rules and the operator audit action vocabulary.
//!
//! A hold is orthogonal to the request lifecycle: it never changes
//! `status_id`, only the `is_held` flag, so a released request resumes
//! exactly where it left off. Holds are only attachable while a request is
//! still `pending`; once an operator has decided or a batch has picked the
//! request up, the hold window is closed.

// ---------------------------------------------------------------------------
// Audit actions
// ---------------------------------------------------------------------------

/// Operator approved a pending request.
pub const ACTION_APPROVE: &str = "approve";

/// Operator denied a pending request (refund issued).
pub const ACTION_DENY: &str = "deny";

/// User cancelled their own pending request (refund issued).
pub const ACTION_CANCEL: &str = "cancel";

/// Operator attached an administrative hold.
pub const ACTION_HOLD: &str = "hold";

/// Operator released an administrative hold.
pub const ACTION_RELEASE: &str = "release";

/// Operator requeued a failed request (fresh reservation).
pub const ACTION_REQUEUE: &str = "requeue";

/// Operator triggered a refund sweep over a failed run.
pub const ACTION_REFUND_RUN: &str = "refund_run";

// ---------------------------------------------------------------------------
// Hold rules
// ---------------------------------------------------------------------------

/// Pending status id (see `payout::state_machine`).
const STATUS_PENDING: i16 = 1;

/// Whether a hold may be attached to a request in the given state.
pub fn can_hold(status_id: i16, is_held: bool) -> bool {
    status_id == STATUS_PENDING && !is_held
}

/// Whether a hold may be released.
pub fn can_release(is_held: bool) -> bool {
    is_held
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_only_while_pending() {
        assert!(can_hold(1, false));
        for status in [2, 3, 4, 5, 6] {
            assert!(!can_hold(status, false), "status {status} should reject hold");
        }
    }

    #[test]
    fn double_hold_rejected() {
        assert!(!can_hold(1, true));
    }

    #[test]
    fn release_requires_existing_hold() {
        assert!(can_release(true));
        assert!(!can_release(false));
    }
}
