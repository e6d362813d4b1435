//! Inbound webhook signature verification.
//!
//! External systems deliver change events with an HMAC-SHA256 signature
//! over the raw request body (`X-Hub-Signature-256` style). Verification
//! is stateless and happens before any further processing.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::types::SyncSource;

type HmacSha256 = Hmac<Sha256>;

/// A webhook delivery as handed to the engine by the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub source: SyncSource,
    /// e.g. "contact.updated", "customer.created".
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Outcome of a signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// Signature present and valid.
    Verified,
    /// No secret configured; verification disabled. This accept-all
    /// default mirrors the unconfigured deployment and is a documented
    /// operational risk.
    Skipped,
    /// Secret configured but the signature is missing or wrong.
    Rejected,
}

impl SignatureCheck {
    /// Whether the event may proceed to processing.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, SignatureCheck::Rejected)
    }
}

/// Compute the hex-encoded HMAC-SHA256 of a raw webhook body.
pub fn compute_signature(secret: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a webhook signature against the raw body.
///
/// The presented signature may be bare hex or prefixed with `"sha256="`.
/// Comparison is constant time. A configured secret with a missing
/// signature is rejected; no configured secret skips verification.
pub fn verify_signature(
    secret: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
) -> SignatureCheck {
    let Some(secret) = secret else {
        return SignatureCheck::Skipped;
    };
    let Some(presented) = signature else {
        return SignatureCheck::Rejected;
    };

    let presented = presented.strip_prefix("sha256=").unwrap_or(presented);
    let expected = compute_signature(secret, body);

    if constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        SignatureCheck::Verified
    } else {
        SignatureCheck::Rejected
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}
