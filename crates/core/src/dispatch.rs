//! Dispatch idempotency keys and the provider failure taxonomy.
//!
//! Every item submitted to the external payout partner carries a
//! client-generated idempotency key derived from `(run_id, request_id)`.
//! A network timeout followed by a retry therefore cannot produce two
//! external payments for the same request: the partner deduplicates on the
//! key, and we map its response items back by the same key.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

// ---------------------------------------------------------------------------
// Idempotency
// ---------------------------------------------------------------------------

/// Deterministic idempotency key for one payout item.
///
/// Stable across retries of the same `(run, request)` pair; a request
/// requeued into a *different* run gets a different key and may legitimately
/// be paid by that later run.
pub fn idempotency_key(run_id: DbId, request_id: DbId) -> String {
    format!("gc-payout-{run_id}-{request_id}")
}

// ---------------------------------------------------------------------------
// Failure taxonomy
// ---------------------------------------------------------------------------

/// Classified per-item dispatch failure, mapped from provider failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchFailure {
    /// The partner account lacks funds to cover the batch.
    InsufficientProviderFunds,
    /// The destination account is invalid or unregistered.
    InvalidDestination,
    /// The partner blocked the payment for compliance reasons.
    ComplianceBlock,
    /// A transient partner-side error; safe to resubmit.
    Transient,
    /// Funds were sent and later came back (closed/invalid account).
    Returned,
    /// A failure code we do not recognize.
    Unknown,
}

impl DispatchFailure {
    /// Map a provider failure code to the internal taxonomy.
    pub fn from_provider_code(code: &str) -> Self {
        match code {
            "INSUFFICIENT_FUNDS" => DispatchFailure::InsufficientProviderFunds,
            "RECEIVER_INVALID" | "RECEIVER_UNREGISTERED" => DispatchFailure::InvalidDestination,
            "COMPLIANCE_VIOLATION" | "REGULATORY_BLOCKED" => DispatchFailure::ComplianceBlock,
            "TRANSIENT_ERROR" | "TIMEOUT" => DispatchFailure::Transient,
            "RETURNED" | "REFUNDED" => DispatchFailure::Returned,
            _ => DispatchFailure::Unknown,
        }
    }

    /// Whether resubmitting the same item can plausibly succeed.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            DispatchFailure::InsufficientProviderFunds | DispatchFailure::Transient
        )
    }

    /// Stable text form stored in `payout_items.failure_reason`.
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchFailure::InsufficientProviderFunds => "insufficient_provider_funds",
            DispatchFailure::InvalidDestination => "invalid_destination",
            DispatchFailure::ComplianceBlock => "compliance_block",
            DispatchFailure::Transient => "transient",
            DispatchFailure::Returned => "returned",
            DispatchFailure::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic() {
        assert_eq!(idempotency_key(12, 34), idempotency_key(12, 34));
        assert_eq!(idempotency_key(12, 34), "gc-payout-12-34");
    }

    #[test]
    fn key_differs_across_runs() {
        assert_ne!(idempotency_key(12, 34), idempotency_key(13, 34));
    }

    #[test]
    fn known_codes_map_to_taxonomy() {
        assert_eq!(
            DispatchFailure::from_provider_code("RECEIVER_INVALID"),
            DispatchFailure::InvalidDestination
        );
        assert_eq!(
            DispatchFailure::from_provider_code("INSUFFICIENT_FUNDS"),
            DispatchFailure::InsufficientProviderFunds
        );
        assert_eq!(
            DispatchFailure::from_provider_code("RETURNED"),
            DispatchFailure::Returned
        );
    }

    #[test]
    fn unknown_code_maps_to_unknown() {
        assert_eq!(
            DispatchFailure::from_provider_code("SOMETHING_NEW"),
            DispatchFailure::Unknown
        );
    }

    #[test]
    fn only_transient_classes_are_retryable() {
        assert!(DispatchFailure::Transient.is_retryable());
        assert!(DispatchFailure::InsufficientProviderFunds.is_retryable());
        assert!(!DispatchFailure::InvalidDestination.is_retryable());
        assert!(!DispatchFailure::ComplianceBlock.is_retryable());
        assert!(!DispatchFailure::Returned.is_retryable());
    }
}
