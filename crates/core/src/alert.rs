//! Operator alert types for payout failure notifications.
//!
//! Alerts are raised through the outbox (see the events crate) so delivery
//! is at-least-once and never blocks the write path that produced them.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// Severity level for an operator alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Needs attention on the next working pass.
    Warning,
    /// Needs immediate operator attention.
    Critical,
}

/// An alert destined for the operator on-call channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorAlert {
    /// Severity.
    pub level: AlertLevel,
    /// Stable machine-readable kind, e.g. `"fulfillment.failed"`.
    pub kind: String,
    /// Human-readable summary.
    pub message: String,
    /// Entity kind the alert is about (`"payout_request"`, `"payout_run"`, ...).
    pub entity_type: String,
    /// Entity database id.
    pub entity_id: DbId,
    /// When the triggering condition was observed.
    pub occurred_at: Timestamp,
}

impl OperatorAlert {
    /// A gift-card fulfillment was marked failed. Always critical: a human
    /// said the value could not be delivered and someone must follow up.
    pub fn fulfillment_failed(fulfillment_id: DbId, reason: &str, at: Timestamp) -> Self {
        Self {
            level: AlertLevel::Critical,
            kind: "fulfillment.failed".to_string(),
            message: format!("Gift-card fulfillment {fulfillment_id} failed: {reason}"),
            entity_type: "gift_card_fulfillment".to_string(),
            entity_id: fulfillment_id,
            occurred_at: at,
        }
    }

    /// A run has been sitting in `processing` with no provider acknowledgment
    /// past the reconciliation window. Manual reconciliation required; the
    /// system never guesses an outcome because money may have left already.
    pub fn run_stuck(run_id: DbId, at: Timestamp) -> Self {
        Self {
            level: AlertLevel::Critical,
            kind: "run.stuck".to_string(),
            message: format!(
                "Payout run {run_id} has unresolved items with no provider acknowledgment"
            ),
            entity_type: "payout_run".to_string(),
            entity_id: run_id,
            occurred_at: at,
        }
    }

    /// A batch submission failed in transit; items remain queued.
    pub fn dispatch_unacknowledged(run_id: DbId, error: &str, at: Timestamp) -> Self {
        Self {
            level: AlertLevel::Warning,
            kind: "run.dispatch_unacknowledged".to_string(),
            message: format!("Payout run {run_id} dispatch did not complete: {error}"),
            entity_type: "payout_run".to_string(),
            entity_id: run_id,
            occurred_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn fulfillment_failure_is_critical() {
        let alert = OperatorAlert::fulfillment_failed(9, "card out of stock", Utc::now());
        assert_eq!(alert.level, AlertLevel::Critical);
        assert_eq!(alert.kind, "fulfillment.failed");
        assert_eq!(alert.entity_id, 9);
    }

    #[test]
    fn alert_round_trips_through_json() {
        let alert = OperatorAlert::run_stuck(3, Utc::now());
        let json = serde_json::to_value(&alert).unwrap();
        let back: OperatorAlert = serde_json::from_value(json).unwrap();
        assert_eq!(back.entity_id, 3);
        assert_eq!(back.level, AlertLevel::Critical);
    }
}
