//! Signed, timestamped message envelope
//!
//! Every request to and response from the remote authority travels as
//!
//! ```text
//! <payload>.<timestamp>.<signature>
//! ```
//!
//! - `payload`: URL-safe unpadded base64 of the JSON body
//! - `timestamp`: Unix seconds when the envelope was signed
//! - `signature`: URL-safe unpadded base64 of a BLAKE3 keyed hash of
//!   `<payload>.<timestamp>`, keyed with a key derived from the shared secret
//!
//! A response whose signature does not match, or that is older than the
//! configured maximum age, is untrusted and its payload is never decoded.

use crate::types::PayoutError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

const KEY_CONTEXT: &str = "payout-reconciler remote authority envelope v1";

/// Errors from envelope signing and verification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Malformed envelope: {0}")]
    Malformed(String),

    #[error("Envelope signature does not match")]
    BadSignature,

    #[error("Envelope is {age}s old, maximum is {max_age}s")]
    Expired { age: u64, max_age: u64 },

    #[error("Envelope payload is not valid JSON: {0}")]
    Payload(String),
}

impl From<EnvelopeError> for PayoutError {
    fn from(err: EnvelopeError) -> Self {
        PayoutError::untrusted(err.to_string())
    }
}

/// Signs outgoing and verifies incoming envelopes with one shared secret
#[derive(Clone)]
pub struct EnvelopeSigner {
    key: [u8; 32],
    max_age: Duration,
}

impl EnvelopeSigner {
    pub fn new(secret: &str, max_age: Duration) -> Self {
        EnvelopeSigner {
            key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
            max_age,
        }
    }

    /// Sign `payload` with the current time
    pub fn sign<T: Serialize>(&self, payload: &T) -> Result<String, EnvelopeError> {
        self.sign_at(payload, unix_now())
    }

    pub fn sign_at<T: Serialize>(&self, payload: &T, timestamp: u64) -> Result<String, EnvelopeError> {
        let json = serde_json::to_vec(payload).map_err(|e| EnvelopeError::Payload(e.to_string()))?;
        let body = format!("{}.{}", URL_SAFE_NO_PAD.encode(json), timestamp);
        let mac = blake3::keyed_hash(&self.key, body.as_bytes());
        Ok(format!("{}.{}", body, URL_SAFE_NO_PAD.encode(mac.as_bytes())))
    }

    /// Verify `token` against the current time and decode its payload
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, EnvelopeError> {
        self.verify_at(token, unix_now())
    }

    pub fn verify_at<T: DeserializeOwned>(&self, token: &str, now: u64) -> Result<T, EnvelopeError> {
        let token = token.trim();
        let (body, signature) = token
            .rsplit_once('.')
            .ok_or_else(|| EnvelopeError::Malformed("missing signature".to_string()))?;
        let (payload, timestamp) = body
            .rsplit_once('.')
            .ok_or_else(|| EnvelopeError::Malformed("missing timestamp".to_string()))?;

        let signature: [u8; 32] = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| EnvelopeError::BadSignature)?
            .try_into()
            .map_err(|_| EnvelopeError::BadSignature)?;
        // blake3::Hash equality is constant time
        if blake3::keyed_hash(&self.key, body.as_bytes()) != blake3::Hash::from(signature) {
            return Err(EnvelopeError::BadSignature);
        }

        let timestamp: u64 = timestamp
            .parse()
            .map_err(|_| EnvelopeError::Malformed(format!("bad timestamp '{timestamp}'")))?;
        let age = now.saturating_sub(timestamp);
        let max_age = self.max_age.as_secs();
        if age > max_age {
            return Err(EnvelopeError::Expired { age, max_age });
        }

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| EnvelopeError::Malformed(format!("payload encoding: {e}")))?;
        serde_json::from_slice(&json).map_err(|e| EnvelopeError::Payload(e.to_string()))
    }
}

fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}
