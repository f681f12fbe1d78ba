use std::fmt;

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Access and refresh credential, always handled together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    /// Whether the access token should be treated as expired right now
    pub fn access_expired(&self) -> bool {
        is_expired(&self.access)
    }
}

// Tokens are bearer secrets; keep them out of logs and panic messages.
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum TokenDecodeError {
    #[error("token has no payload segment")]
    MissingPayload,

    #[error("payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload has no numeric exp claim")]
    MissingExpiry,
}

/// Decode the `exp` claim (seconds since epoch) from a JWT without
/// verifying its signature.
pub fn expiry_claim(token: &str) -> Result<i64, TokenDecodeError> {
    let payload = token
        .split('.')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .ok_or(TokenDecodeError::MissingPayload)?;
    let payload = payload.trim_end_matches('=');

    // JWTs use the URL-safe alphabet, but accept the standard one too.
    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))?;

    let claims: serde_json::Value = serde_json::from_slice(&decoded)?;
    let exp = claims.get("exp").ok_or(TokenDecodeError::MissingExpiry)?;
    exp.as_i64()
        .or_else(|| exp.as_f64().map(|f| f.floor() as i64))
        .ok_or(TokenDecodeError::MissingExpiry)
}

/// Expired when `now >= exp`. A token whose claim cannot be decoded is
/// always expired.
pub fn is_expired_at(token: &str, now_secs: i64) -> bool {
    match expiry_claim(token) {
        Ok(exp) => now_secs >= exp,
        Err(e) => {
            debug!(error = %e, "Access token could not be decoded, treating as expired");
            true
        }
    }
}

pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now().timestamp())
}
