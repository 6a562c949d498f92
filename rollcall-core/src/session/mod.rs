//! Client-side authorization state.
//!
//! An [`AuthorizationRecord`] is written to two stores after a successful
//! scan: the primary (volatile, per tab) store holds it as individual keys,
//! the fallback (durable) store holds a JSON backup under
//! `lastSuccessfulScan`. [`SessionState`] hides both behind one get/set/clear
//! abstraction and recovers the primary from the fallback when needed.
//!
//! This is a UX gate, not a security boundary: nothing here is checked by the
//! upload server.

mod gate;
mod store;

pub use gate::{ActiveSession, GateConfig, Navigation, ReloadPolicy, SessionGate, DEFAULT_SESSION_CEILING};
pub use store::{FileStore, KeyValueStore, MemoryStore};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, RollcallError};

/// Primary store: `"true"` once a code has been accepted.
pub const KEY_IS_AUTHORIZED: &str = "isAuthorized";
/// Primary store: subject of the accepted code.
pub const KEY_SUBJECT: &str = "verifiedSubject";
/// Primary store: key of the accepted code.
pub const KEY_AUTH_KEY: &str = "verifiedAuthKey";
/// Primary store: verification time (Unix ms, decimal).
pub const KEY_TIMESTAMP: &str = "verifiedTimestamp";
/// Fallback store: JSON backup of the record.
pub const KEY_LAST_SCAN: &str = "lastSuccessfulScan";

/// Proof that a fresh code was scanned on this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRecord {
    pub subject: String,
    pub key: String,
    /// When the code was accepted (Unix timestamp ms)
    pub verified_at: u64,
}

/// Which store a record was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    Primary,
    Fallback,
}

/// Fallback store representation.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LastScan {
    subject: String,
    auth_key: String,
    timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scanned_at: Option<String>,
}

/// Session state backed by a primary and a fallback store.
pub struct SessionState {
    primary: Box<dyn KeyValueStore>,
    fallback: Box<dyn KeyValueStore>,
}

impl SessionState {
    pub fn new(primary: Box<dyn KeyValueStore>, fallback: Box<dyn KeyValueStore>) -> Self {
        Self { primary, fallback }
    }

    /// Both stores in memory.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()), Box::new(MemoryStore::new()))
    }

    /// Write the record to both stores.
    pub fn set(&self, record: &AuthorizationRecord) -> Result<()> {
        self.write_primary(record)?;

        let backup = LastScan {
            subject: record.subject.clone(),
            auth_key: record.key.clone(),
            timestamp: record.verified_at,
            scanned_at: chrono::DateTime::from_timestamp_millis(record.verified_at as i64)
                .map(|dt| dt.to_rfc3339()),
        };
        let json = serde_json::to_string(&backup)
            .map_err(|e| RollcallError::Serialization(e.to_string()))?;
        self.fallback.set(KEY_LAST_SCAN, &json)?;

        debug!(subject = %record.subject, verified_at = record.verified_at, "Authorization stored");
        Ok(())
    }

    /// Load the record, preferring the primary store. A record recovered
    /// from the fallback is written back into the primary store.
    pub fn get(&self) -> Result<Option<(AuthorizationRecord, RecordSource)>> {
        if let Some(record) = self.load_primary()? {
            return Ok(Some((record, RecordSource::Primary)));
        }
        match self.load_fallback()? {
            Some(record) => {
                self.write_primary(&record)?;
                debug!(subject = %record.subject, "Recovered authorization from fallback store");
                Ok(Some((record, RecordSource::Fallback)))
            }
            None => Ok(None),
        }
    }

    /// Remove the record from both stores.
    pub fn clear(&self) -> Result<()> {
        for key in [KEY_IS_AUTHORIZED, KEY_SUBJECT, KEY_AUTH_KEY, KEY_TIMESTAMP] {
            self.primary.remove(key)?;
        }
        self.fallback.remove(KEY_LAST_SCAN)?;
        debug!("Authorization cleared");
        Ok(())
    }

    fn write_primary(&self, record: &AuthorizationRecord) -> Result<()> {
        self.primary.set(KEY_IS_AUTHORIZED, "true")?;
        self.primary.set(KEY_SUBJECT, &record.subject)?;
        self.primary.set(KEY_AUTH_KEY, &record.key)?;
        self.primary
            .set(KEY_TIMESTAMP, &record.verified_at.to_string())
    }

    /// A primary record counts only when every field is present and sane.
    fn load_primary(&self) -> Result<Option<AuthorizationRecord>> {
        if self.primary.get(KEY_IS_AUTHORIZED)?.as_deref() != Some("true") {
            return Ok(None);
        }
        let subject = self.primary.get(KEY_SUBJECT)?.filter(|s| !s.is_empty());
        let key = self.primary.get(KEY_AUTH_KEY)?.filter(|k| !k.is_empty());
        let verified_at = self
            .primary
            .get(KEY_TIMESTAMP)?
            .and_then(|t| t.trim().parse::<u64>().ok());

        match (subject, key, verified_at) {
            (Some(subject), Some(key), Some(verified_at)) => Ok(Some(AuthorizationRecord {
                subject,
                key,
                verified_at,
            })),
            _ => {
                warn!("Incomplete authorization in primary store, ignoring it");
                Ok(None)
            }
        }
    }

    fn load_fallback(&self) -> Result<Option<AuthorizationRecord>> {
        let Some(json) = self.fallback.get(KEY_LAST_SCAN)? else {
            return Ok(None);
        };
        match serde_json::from_str::<LastScan>(&json) {
            Ok(scan) if !scan.subject.is_empty() && !scan.auth_key.is_empty() => {
                Ok(Some(AuthorizationRecord {
                    subject: scan.subject,
                    key: scan.auth_key,
                    verified_at: scan.timestamp,
                }))
            }
            Ok(_) => Ok(None),
            Err(e) => {
                warn!(error = %e, "Failed to recover authorization from fallback store");
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState").finish_non_exhaustive()
    }
}
