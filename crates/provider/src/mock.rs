//! In-memory mock of the payout partner for engine tests and local dev.
//!
//! Honors the partner's idempotency contract: a key that was already paid
//! is returned with its original outcome and is **not** counted as a second
//! payment. Tests script failures per destination and then assert on
//! [`payments`](MockProvider::payments) to prove no request was paid twice.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::api::{BatchOutcome, BatchSubmission, ItemOutcome, ItemStatus};
use crate::client::{PayoutProvider, ProviderError};

/// Scripted behaviour for a destination.
#[derive(Debug, Clone)]
enum Script {
    Fail { code: String },
    Pending,
}

/// Scriptable in-memory payout partner.
#[derive(Default)]
pub struct MockProvider {
    scripts: Mutex<HashMap<String, Script>>,
    /// Keys that have been paid (idempotency dedup set).
    paid_keys: Mutex<HashSet<String>>,
    /// One entry per actual payment made; never more than one per key.
    payments: Mutex<Vec<String>>,
    /// Every submission received, for call-shape assertions.
    submissions: Mutex<Vec<BatchSubmission>>,
    /// Remembered outcomes per batch id, for `fetch_batch`.
    batches: Mutex<HashMap<String, BatchOutcome>>,
    /// When set, `submit_batch` fails with a transport-style error after
    /// recording the submission (simulates a timeout after the partner
    /// accepted the batch).
    fail_submission: Mutex<bool>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a definitive failure for every item sent to `destination`.
    pub fn fail_destination(&self, destination: &str, code: &str) {
        self.scripts.lock().unwrap().insert(
            destination.to_string(),
            Script::Fail {
                code: code.to_string(),
            },
        );
    }

    /// Script a `pending` outcome for every item sent to `destination`.
    pub fn pend_destination(&self, destination: &str) {
        self.scripts
            .lock()
            .unwrap()
            .insert(destination.to_string(), Script::Pending);
    }

    /// Make the next submissions fail in transit (no outcome returned).
    pub fn set_fail_submission(&self, fail: bool) {
        *self.fail_submission.lock().unwrap() = fail;
    }

    /// Idempotency keys of every payment actually made.
    pub fn payments(&self) -> Vec<String> {
        self.payments.lock().unwrap().clone()
    }

    /// All submissions received so far.
    pub fn submissions(&self) -> Vec<BatchSubmission> {
        self.submissions.lock().unwrap().clone()
    }

    /// Overwrite the recorded outcome for a batch, simulating items the
    /// partner settled after the original response (polled via
    /// `fetch_batch`).
    pub fn record_batch(&self, outcome: BatchOutcome) {
        self.batches
            .lock()
            .unwrap()
            .insert(outcome.provider_batch_id.clone(), outcome);
    }
}

#[async_trait::async_trait]
impl PayoutProvider for MockProvider {
    async fn submit_batch(&self, batch: &BatchSubmission) -> Result<BatchOutcome, ProviderError> {
        self.submissions.lock().unwrap().push(batch.clone());

        if *self.fail_submission.lock().unwrap() {
            return Err(ProviderError::Status(503));
        }

        let provider_batch_id = format!("mock-batch-{}", uuid::Uuid::new_v4());
        let scripts = self.scripts.lock().unwrap().clone();
        let mut paid = self.paid_keys.lock().unwrap();
        let mut payments = self.payments.lock().unwrap();

        let mut items = Vec::with_capacity(batch.items.len());
        for (idx, item) in batch.items.iter().enumerate() {
            let provider_item_id = format!("{provider_batch_id}-item-{idx}");
            let outcome = match scripts.get(&item.destination) {
                Some(Script::Fail { code }) => ItemOutcome {
                    idempotency_key: item.idempotency_key.clone(),
                    provider_item_id: Some(provider_item_id),
                    status: ItemStatus::Failed,
                    failure_code: Some(code.clone()),
                },
                Some(Script::Pending) => ItemOutcome {
                    idempotency_key: item.idempotency_key.clone(),
                    provider_item_id: Some(provider_item_id),
                    status: ItemStatus::Pending,
                    failure_code: None,
                },
                None => {
                    // The idempotency contract: an already-paid key returns
                    // success again without a second payment.
                    if paid.insert(item.idempotency_key.clone()) {
                        payments.push(item.idempotency_key.clone());
                    }
                    ItemOutcome {
                        idempotency_key: item.idempotency_key.clone(),
                        provider_item_id: Some(provider_item_id),
                        status: ItemStatus::Succeeded,
                        failure_code: None,
                    }
                }
            };
            items.push(outcome);
        }

        let outcome = BatchOutcome {
            provider_batch_id: provider_batch_id.clone(),
            items,
        };
        self.batches
            .lock()
            .unwrap()
            .insert(provider_batch_id, outcome.clone());
        Ok(outcome)
    }

    async fn fetch_batch(&self, provider_batch_id: &str) -> Result<BatchOutcome, ProviderError> {
        self.batches
            .lock()
            .unwrap()
            .get(provider_batch_id)
            .cloned()
            .ok_or(ProviderError::Status(404))
    }
}
