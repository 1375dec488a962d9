//! Stripe webhook signature verification.
//!
//! Stripe signs each delivery with a `Stripe-Signature` header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=...]`. The HMAC-SHA256 is computed
//! with the endpoint secret over `"{t}.{raw body}"`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

/// Deliveries older (or newer) than this are rejected as replays.
pub const TOLERANCE_SECONDS: i64 = 300;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("malformed signature header")]
    MalformedHeader,
    #[error("timestamp outside tolerance")]
    StaleTimestamp,
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("invalid signing secret")]
    InvalidSecret,
}

/// Verify a webhook delivery against the endpoint secret.
///
/// `now` is the current unix time in seconds.
///
/// # Errors
///
/// Returns a [`WebhookError`] if the header is malformed, the timestamp is
/// outside [`TOLERANCE_SECONDS`], or no `v1` signature matches.
pub fn verify_signature(
    header: &str,
    payload: &str,
    secret: &str,
    now: i64,
) -> Result<(), WebhookError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            Some(_) => {}
            None => return Err(WebhookError::MalformedHeader),
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| WebhookError::MalformedHeader)?;
    if now.abs_diff(ts) > TOLERANCE_SECONDS.unsigned_abs() {
        return Err(WebhookError::StaleTimestamp);
    }

    let expected = compute_signature(timestamp, payload, secret)?;

    if signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
fn compute_signature(timestamp: &str, payload: &str, secret: &str) -> Result<String, WebhookError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::InvalidSecret)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
