//! HMAC-SHA256 signing of event envelopes.
//!
//! The signature is computed over the canonical JSON form of the envelope:
//! - object keys sorted lexicographically (by byte) at every depth
//! - compact separators (`,` and `:`), no whitespace
//! - strings escaped the way `serde_json` escapes them
//!
//! The same canonical bytes are sent as the request body, so a receiver can verify by
//! computing `hex(HMAC-SHA256(secret, raw_body))` and comparing with the
//! `X-FireEMS-Signature` header.

use std::fmt;

use hmac::{Hmac, Mac};
use rand::RngCore;
use serde_json::Value;
use sha2::Sha256;

use crate::webhooks::error::WebhookError;
use crate::webhooks::events::EventEnvelope;

type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes behind a generated secret (hex-encoded to twice this length).
pub const SECRET_BYTES: usize = 32;

/// Shared signing secret for a department's webhook.
///
/// Opaque bytes; generated secrets are hex text so they can be pasted into a receiver's
/// configuration. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookSecret(Vec<u8>);

impl WebhookSecret {
    /// Generate a new random secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes).into_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Secret as text, for showing to an administrator once.
    pub fn reveal(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl AsRef<[u8]> for WebhookSecret {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WebhookSecret(<{} bytes>)", self.0.len())
    }
}

impl From<Vec<u8>> for WebhookSecret {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for WebhookSecret {
    fn from(secret: &str) -> Self {
        Self(secret.as_bytes().to_vec())
    }
}

impl From<String> for WebhookSecret {
    fn from(secret: String) -> Self {
        Self(secret.into_bytes())
    }
}

/// Sign an envelope. Fails with [`WebhookError::Signing`] if the secret is empty.
pub fn sign(envelope: &EventEnvelope, secret: impl AsRef<[u8]>) -> Result<String, WebhookError> {
    let body = envelope.canonical_json()?;
    sign_payload(&body, secret.as_ref())
}

/// Hex-encoded HMAC-SHA256 of an already-canonical payload.
pub fn sign_payload(payload: &str, secret: &[u8]) -> Result<String, WebhookError> {
    if secret.is_empty() {
        return Err(WebhookError::Signing("webhook secret is empty".to_string()));
    }

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| WebhookError::Signing(e.to_string()))?;
    mac.update(payload.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Serialize a JSON value with sorted object keys and no whitespace.
///
/// Independent of whether `serde_json` was built with `preserve_order`.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
