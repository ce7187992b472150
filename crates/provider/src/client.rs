//! The [`PayoutProvider`] trait and the production HTTP client.

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::api::{BatchOutcome, BatchSubmission};

type HmacSha256 = Hmac<Sha256>;

/// HTTP request timeout for partner calls. Batch submission is the one
/// long-running call in the engine; it runs outside any database
/// transaction, so a generous timeout is safe.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from partner communication.
///
/// Any of these leaves the submitted items unacknowledged: the engine keeps
/// them `queued` and lets the callback or the reconciliation sweep resolve
/// them. Resubmission under the same idempotency keys is always safe.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, timeout).
    #[error("Provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The partner returned a non-2xx status.
    #[error("Provider returned HTTP {0}")]
    Status(u16),

    /// The partner's response body did not match the wire contract.
    #[error("Provider response could not be decoded: {0}")]
    Decode(String),
}

/// Interface to the external payout partner.
///
/// Two production-relevant implementations exist: [`HttpPayoutProvider`]
/// for the real partner and [`MockProvider`](crate::mock::MockProvider)
/// for tests and local development.
#[async_trait::async_trait]
pub trait PayoutProvider: Send + Sync {
    /// Submit a batch of payments. Safe to retry: items carry idempotency
    /// keys and the partner deduplicates on them.
    async fn submit_batch(&self, batch: &BatchSubmission) -> Result<BatchOutcome, ProviderError>;

    /// Fetch the current outcome of a previously submitted batch
    /// (reconciliation path).
    async fn fetch_batch(&self, provider_batch_id: &str) -> Result<BatchOutcome, ProviderError>;
}

/// Production client for the partner's REST API.
pub struct HttpPayoutProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPayoutProvider {
    /// Create a client targeting `base_url`, authenticating with `api_key`.
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait::async_trait]
impl PayoutProvider for HttpPayoutProvider {
    async fn submit_batch(&self, batch: &BatchSubmission) -> Result<BatchOutcome, ProviderError> {
        let url = format!("{}/v1/payout-batches", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(batch)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let outcome: BatchOutcome = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        tracing::info!(
            provider_batch_id = %outcome.provider_batch_id,
            items = outcome.items.len(),
            "Batch submitted to payout partner"
        );
        Ok(outcome)
    }

    async fn fetch_batch(&self, provider_batch_id: &str) -> Result<BatchOutcome, ProviderError> {
        let url = format!("{}/v1/payout-batches/{provider_batch_id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

/// Verify the partner's webhook signature (HMAC-SHA256 over the raw body,
/// hex-encoded).
pub fn verify_callback_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    let Ok(provided) = decode_hex(signature) else {
        return false;
    };
    // Length check first; `verify_slice` would also catch it but this keeps
    // the comparison constant-time over equal-length inputs only.
    if provided.len() != expected.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in provided.iter().zip(expected.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}

fn decode_hex(s: &str) -> Result<Vec<u8>, ()> {
    if s.len() % 2 != 0 {
        return Err(());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmac::Mac;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    #[test]
    fn valid_signature_verifies() {
        let body = br#"{"batch_id":"b-1"}"#;
        let sig = sign("cb-secret", body);
        assert!(verify_callback_signature("cb-secret", body, &sig));
    }

    #[test]
    fn wrong_secret_rejected() {
        let body = b"payload";
        let sig = sign("other-secret", body);
        assert!(!verify_callback_signature("cb-secret", body, &sig));
    }

    #[test]
    fn tampered_body_rejected() {
        let sig = sign("cb-secret", b"original");
        assert!(!verify_callback_signature("cb-secret", b"tampered", &sig));
    }

    #[test]
    fn malformed_signature_rejected() {
        assert!(!verify_callback_signature("cb-secret", b"x", "not-hex"));
        assert!(!verify_callback_signature("cb-secret", b"x", "abc"));
    }
}
