use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use super::gateway::CheckoutMetadata;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the gateway signature, `t=<unix-seconds>,v1=<hex-hmac>`.
/// The HMAC-SHA256 is computed over `"{t}.{raw_body}"` with the shared
/// webhook secret.
pub const SIGNATURE_HEADER: &str = "gateway-signature";

/// A verified, schema-validated webhook event. Nothing untyped crosses this
/// boundary into the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    CheckoutSessionCompleted(CheckoutCompleted),
    /// Authentic but uninteresting event type; acked and dropped.
    Ignored { event_type: String },
}

/// Payload of a completed checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutCompleted {
    pub metadata: CheckoutMetadata,
    pub amount_paid_cents: u32,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    metadata: CheckoutMetadata,
    amount_total: u32,
}

/// Error enumeration for webhook intake. Every variant maps to a 4xx; all
/// downstream workflow failures are acked to stop gateway redelivery.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("missing {SIGNATURE_HEADER} header")]
    MissingSignature,
    #[error("malformed signature header")]
    MalformedSignature,
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("unparseable event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Verify the signature header against the raw body and parse the event.
///
/// Verification runs before any parsing so unauthenticated payloads never
/// reach serde. The comparison is constant-time via `Mac::verify_slice`.
pub fn verify_and_parse(
    raw_body: &[u8],
    signature_header: &str,
    secret: &str,
) -> Result<WebhookEvent, WebhookError> {
    let (timestamp, provided_mac) = split_header(signature_header)?;
    let digest = hex::decode(provided_mac).map_err(|_| WebhookError::MalformedSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::MalformedSignature)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    mac.verify_slice(&digest)
        .map_err(|_| WebhookError::SignatureMismatch)?;

    let raw: RawEvent = serde_json::from_slice(raw_body)?;
    if raw.event_type == "checkout_session_completed" {
        Ok(WebhookEvent::CheckoutSessionCompleted(CheckoutCompleted {
            metadata: raw.data.metadata,
            amount_paid_cents: raw.data.amount_total,
        }))
    } else {
        Ok(WebhookEvent::Ignored {
            event_type: raw.event_type,
        })
    }
}

/// Produce a signature header for a payload. Used by local adapters and tests
/// to emit deliveries the verifier accepts.
pub fn sign(raw_body: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    let digest = mac.finalize().into_bytes();
    format!("t={timestamp},v1={}", hex::encode(digest))
}

fn split_header(header: &str) -> Result<(&str, &str), WebhookError> {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signature = Some(value),
            _ => {}
        }
    }
    match (timestamp, signature) {
        (Some(t), Some(v1)) if !t.is_empty() && !v1.is_empty() => Ok((t, v1)),
        _ => Err(WebhookError::MalformedSignature),
    }
}
