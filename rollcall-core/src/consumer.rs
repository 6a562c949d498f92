//! Student-side QR consumer.
//!
//! Decodes a scanned payload, checks its freshness and, on success, stores an
//! [`AuthorizationRecord`] in both session stores.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::credential::Credential;
use crate::error::{Result, RollcallError};
use crate::session::{AuthorizationRecord, SessionState};

/// Default freshness threshold: one re-mint period plus scan latency.
/// Anything below the issuer period rejects most legitimate scans.
pub const DEFAULT_FRESHNESS_THRESHOLD: Duration = Duration::from_millis(2_500);

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Maximum accepted `now - timestamp` (inclusive).
    pub freshness_threshold: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            freshness_threshold: DEFAULT_FRESHNESS_THRESHOLD,
        }
    }
}

pub struct QrConsumer {
    config: ConsumerConfig,
    clock: Arc<dyn Clock>,
}

impl QrConsumer {
    pub fn new(config: ConsumerConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Parse and freshness-check a payload without touching any store.
    pub fn check(&self, payload: &str) -> Result<Credential> {
        let credential = Credential::from_payload(payload).inspect_err(|e| {
            warn!(error = %e, "Rejected malformed code");
        })?;

        let now = self.clock.now_ms();
        let age_ms = credential.age_at(now);
        let threshold_ms = self.config.freshness_threshold.as_millis() as u64;
        debug!(
            subject = %credential.subject,
            issued_at = credential.issued_at,
            age_ms,
            threshold_ms,
            "Timing check"
        );

        if age_ms > threshold_ms {
            warn!(subject = %credential.subject, age_ms, threshold_ms, "Code expired");
            return Err(RollcallError::ExpiredCode {
                age_ms,
                threshold_ms,
            });
        }
        Ok(credential)
    }

    /// Accept a scanned payload and record the authorization.
    ///
    /// On any error the previously stored authorization is left untouched.
    pub fn consume(&self, payload: &str, session: &SessionState) -> Result<AuthorizationRecord> {
        let credential = self.check(payload)?;
        let record = AuthorizationRecord {
            subject: credential.subject,
            key: credential.key,
            verified_at: self.clock.now_ms(),
        };
        session.set(&record)?;
        info!(subject = %record.subject, "Access granted");
        Ok(record)
    }
}

impl std::fmt::Debug for QrConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrConsumer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
