use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "ts")]
use ts_rs::TS;

use super::credentials::Credential;

/// Claims we care about in the access token payload.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

/// Read-only identity view of the current access token.
///
/// Never stored on its own; `Session::decode` rebuilds it from the token
/// whenever it is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Email claim, falling back to `sub`
    pub subject: String,
    pub email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Decode the payload segment of a JWT-style token.
    /// Malformed tokens yield `None`; the signature is not checked.
    pub fn decode(token: &Credential) -> Option<Self> {
        let payload = token.expose().split('.').nth(1)?;
        let payload = payload.trim_end_matches('=');
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .or_else(|_| STANDARD_NO_PAD.decode(payload))
            .ok()?;
        let claims: Claims = serde_json::from_slice(&bytes).ok()?;

        let email = claims.email.filter(|e| !e.is_empty());
        let subject = email
            .clone()
            .or_else(|| claims.sub.filter(|s| !s.is_empty()))?;

        Some(Self {
            subject,
            email,
            expires_at: claims.exp.and_then(|exp| DateTime::from_timestamp(exp, 0)),
        })
    }

    /// Tokens without an `exp` claim are never considered expired here;
    /// the server has the final word.
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| Utc::now() >= exp).unwrap_or(false)
    }

    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at.map(|exp| exp - Utc::now())
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.time_until_expiry().map(|d| d.num_minutes().max(0))
    }
}
