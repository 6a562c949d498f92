use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RollcallError};

/// One-scan authorization credential carried by a rotating QR code.
///
/// Serialized as the code payload:
/// `{"subject":"Math","authKey":"k3x9a0qz","timestamp":1700000000000,"validUntil":1700000002000}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Subject the attendance is taken for
    pub subject: String,
    /// Short opaque key minted by the key generator
    #[serde(rename = "authKey")]
    pub key: String,
    /// Issue time (Unix timestamp ms)
    #[serde(rename = "timestamp")]
    pub issued_at: u64,
    /// End of the advertised validity window (Unix timestamp ms).
    /// Advisory only: consumers judge freshness from `issued_at`.
    #[serde(rename = "validUntil")]
    pub valid_until: u64,
}

/// Lenient view of a scanned payload, so missing fields can be reported
/// precisely instead of as a generic parse failure.
#[derive(Deserialize)]
struct CodePayload {
    subject: Option<String>,
    #[serde(rename = "authKey")]
    auth_key: Option<String>,
    timestamp: Option<u64>,
    #[serde(rename = "validUntil")]
    valid_until: Option<u64>,
}

impl Credential {
    /// Mint a credential issued at `now_ms`, advertised as valid for `window`.
    pub fn mint(subject: impl Into<String>, key: impl Into<String>, now_ms: u64, window: Duration) -> Self {
        Self {
            subject: subject.into(),
            key: key.into(),
            issued_at: now_ms,
            valid_until: now_ms.saturating_add(window.as_millis() as u64),
        }
    }

    /// Compact JSON text to encode into the QR code.
    pub fn to_payload(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| RollcallError::Serialization(e.to_string()))
    }

    /// Parse a decoded QR payload.
    ///
    /// Only `subject`, `authKey` and `timestamp` are required; a missing
    /// `validUntil` falls back to the issue time.
    pub fn from_payload(payload: &str) -> Result<Self> {
        let raw: CodePayload = serde_json::from_str(payload.trim())
            .map_err(|e| RollcallError::MalformedCode(format!("not a credential payload: {}", e)))?;

        let subject = raw
            .subject
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| RollcallError::MalformedCode("missing subject".into()))?;
        let key = raw
            .auth_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RollcallError::MalformedCode("missing authKey".into()))?;
        let issued_at = raw
            .timestamp
            .ok_or_else(|| RollcallError::MalformedCode("missing timestamp".into()))?;

        Ok(Self {
            subject,
            key,
            issued_at,
            valid_until: raw.valid_until.unwrap_or(issued_at),
        })
    }

    /// Milliseconds elapsed since issue. A credential stamped in the future
    /// (clock skew between devices) has age zero.
    pub fn age_at(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.issued_at)
    }
}
