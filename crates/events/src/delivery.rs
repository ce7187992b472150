//! Signed webhook delivery for operator alerts.
//!
//! One delivery attempt per call: retry pacing is owned by the outbox
//! drain loop, which reschedules failed tasks with backoff. Payloads are
//! signed with HMAC-SHA256 over the raw body so the receiving channel can
//! verify origin.

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use glowcast_core::alert::OperatorAlert;

type HmacSha256 = Hmac<Sha256>;

/// Signature header attached to every alert delivery.
pub const SIGNATURE_HEADER: &str = "x-glowcast-signature";

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

/// Delivers operator alerts to the configured webhook endpoint.
pub struct WebhookDelivery {
    client: reqwest::Client,
    url: String,
    secret: String,
}

impl WebhookDelivery {
    /// Create a delivery service targeting one endpoint.
    pub fn new(url: String, secret: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            url,
            secret,
        }
    }

    /// Deliver one alert. Returns on the first outcome; the caller decides
    /// whether and when to retry.
    pub async fn deliver(&self, alert: &OperatorAlert) -> Result<(), WebhookError> {
        let body = serde_json::to_vec(alert).expect("OperatorAlert serialization cannot fail");
        let signature = sign(&self.secret, &body);

        let response = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(WebhookError::HttpStatus(response.status().as_u16()))
        }
    }
}

/// Hex-encoded HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic() {
        let a = sign("secret", b"payload");
        let b = sign("secret", b"payload");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn signature_depends_on_secret_and_body() {
        assert_ne!(sign("secret-a", b"payload"), sign("secret-b", b"payload"));
        assert_ne!(sign("secret", b"payload-1"), sign("secret", b"payload-2"));
    }
}
