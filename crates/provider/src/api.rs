//! Wire types for the payout partner's batch API.
//!
//! The partner deduplicates on the per-item idempotency key: resubmitting
//! an item under the same key returns the original outcome instead of
//! creating a second payment. The engine leans on that for crash recovery.

use serde::{Deserialize, Serialize};

/// One payment inside a batch submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    /// Client-generated, stable across retries of the same (run, request).
    pub idempotency_key: String,
    /// Receiver handle at the partner (e.g. a wallet email).
    pub destination: String,
    /// Amount in minor units.
    pub amount_usd_cents: i64,
    /// ISO 4217 code; always `USD` for this engine.
    pub currency: String,
}

/// A full batch submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSubmission {
    /// Client-side batch reference echoed back by the partner.
    pub client_batch_ref: String,
    pub items: Vec<BatchItem>,
}

/// Partner-side status of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Paid out.
    Succeeded,
    /// Definitively failed; `failure_code` says why.
    Failed,
    /// Accepted but not yet settled; resolved later via callback or poll.
    Pending,
    /// Paid out earlier, then the funds came back.
    Returned,
}

/// Per-item outcome in a batch response or callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Echo of the submitted idempotency key.
    pub idempotency_key: String,
    /// Partner-side id, present once the item was acknowledged.
    pub provider_item_id: Option<String>,
    pub status: ItemStatus,
    /// Partner failure code; the engine maps it into the internal
    /// dispatch-failure taxonomy.
    pub failure_code: Option<String>,
}

/// Partner response to a batch submission (or a later batch poll).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Partner-side batch id; key for reconciliation polls.
    pub provider_batch_id: String,
    pub items: Vec<ItemOutcome>,
}
