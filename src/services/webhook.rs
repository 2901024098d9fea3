//! Push-notification verification.
//!
//! Validates the `X-Hub-Signature-256` header GitHub sends with webhook
//! deliveries (HMAC-SHA256 over the raw body) and extracts the remote URLs a
//! push event refers to, so the handler can map the event to a checkout.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Errors that can occur while handling a push notification
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("unable to validate payload signature")]
    InvalidSignature,

    #[error("unable to unpack push event body: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    #[error("no repository remote URL set on event")]
    MissingRemoteUrl,
}

/// The subset of a push event the refresh trigger needs.
#[derive(Debug, Deserialize)]
pub struct PushEvent {
    pub repository: Option<PushRepository>,
}

#[derive(Debug, Deserialize)]
pub struct PushRepository {
    pub ssh_url: Option<String>,
    pub clone_url: Option<String>,
}

impl PushEvent {
    /// Remote URLs the event may be known by, in lookup preference order.
    pub fn remote_urls(&self) -> Vec<&str> {
        let Some(repository) = &self.repository else {
            return Vec::new();
        };
        [&repository.ssh_url, &repository.clone_url]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect()
    }
}

/// Verify a delivery signature of the form `sha256=<hex hmac>` over the raw
/// request body.
pub fn verify_push_signature(
    secret: &[u8],
    body: &[u8],
    header: Option<&str>,
) -> Result<(), WebhookError> {
    let header = header.ok_or(WebhookError::MissingSignature)?;
    let signature_hex = header
        .strip_prefix("sha256=")
        .ok_or(WebhookError::InvalidSignature)?;
    let signature = hex::decode(signature_hex).map_err(|_| WebhookError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC key should be valid");
    mac.update(body);
    mac.verify_slice(&signature)
        .map_err(|_| WebhookError::InvalidSignature)
}

/// Compute the signature header value for `body`. Used by tests and useful
/// for local delivery tooling.
pub fn sign_push_body(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC key should be valid");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Parse a push event body.
pub fn parse_push_event(body: &[u8]) -> Result<PushEvent, WebhookError> {
    Ok(serde_json::from_slice(body)?)
}
