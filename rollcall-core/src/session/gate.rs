use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{AuthorizationRecord, RecordSource, SessionState};
use crate::clock::Clock;
use crate::error::{Result, RollcallError};

/// Absolute lifetime of an authorization (5 minutes).
pub const DEFAULT_SESSION_CEILING: Duration = Duration::from_secs(300);

/// How a page reload affects a stored authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadPolicy {
    /// Keep a still-valid authorization across reloads.
    #[default]
    Recover,
    /// Treat a reload as "start over" and drop the authorization.
    StartOver,
}

/// How the capture page was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Navigation {
    #[default]
    Fresh,
    Reload,
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub session_ceiling: Duration,
    pub reload_policy: ReloadPolicy,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            session_ceiling: DEFAULT_SESSION_CEILING,
            reload_policy: ReloadPolicy::Recover,
        }
    }
}

/// An authorization that passed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub subject: String,
    pub key: String,
    pub verified_at: u64,
    /// Moment the session stops being accepted (Unix timestamp ms)
    pub expires_at: u64,
    pub source: RecordSource,
}

impl ActiveSession {
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at.saturating_sub(now_ms)
    }
}

/// Guards the capture page.
pub struct SessionGate {
    state: SessionState,
    clock: Arc<dyn Clock>,
    config: GateConfig,
}

impl SessionGate {
    pub fn new(state: SessionState, clock: Arc<dyn Clock>, config: GateConfig) -> Self {
        Self {
            state,
            clock,
            config,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Enter the capture page.
    ///
    /// Fails with [`RollcallError::NotAuthorized`] when neither store holds a
    /// record, and with [`RollcallError::SessionExpired`] (after clearing
    /// both stores) once the record is older than the ceiling. Both mean
    /// "redirect to the entry page".
    pub fn enter(&self, navigation: Navigation) -> Result<ActiveSession> {
        if navigation == Navigation::Reload && self.config.reload_policy == ReloadPolicy::StartOver {
            info!("Reload treated as start over, clearing authorization");
            self.state.clear()?;
            return Err(RollcallError::NotAuthorized);
        }

        let Some((record, source)) = self.state.get()? else {
            debug!("No authorization found in either store");
            return Err(RollcallError::NotAuthorized);
        };

        self.admit(record, source)
    }

    /// Re-check the gate without navigation (e.g. right before submitting).
    pub fn check(&self) -> Result<ActiveSession> {
        self.enter(Navigation::Fresh)
    }

    /// Whether the entry page should skip straight to capture.
    pub fn already_authorized(&self) -> bool {
        match self.state.get() {
            Ok(Some((record, _))) => self.age_of(&record) <= self.ceiling_ms(),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to read authorization");
                false
            }
        }
    }

    /// Explicit logout.
    pub fn logout(&self) -> Result<()> {
        info!("Logging out, clearing authorization");
        self.state.clear()
    }

    /// Successful submission: the authorization is spent.
    pub fn complete(&self) -> Result<()> {
        debug!("Submission complete, clearing authorization");
        self.state.clear()
    }

    fn admit(&self, record: AuthorizationRecord, source: RecordSource) -> Result<ActiveSession> {
        let age_ms = self.age_of(&record);
        let ceiling_ms = self.ceiling_ms();
        if age_ms > ceiling_ms {
            warn!(subject = %record.subject, age_ms, ceiling_ms, "Session expired");
            self.state.clear()?;
            return Err(RollcallError::SessionExpired { age_ms, ceiling_ms });
        }

        debug!(subject = %record.subject, age_ms, source = ?source, "Session admitted");
        Ok(ActiveSession {
            expires_at: record.verified_at.saturating_add(ceiling_ms),
            subject: record.subject,
            key: record.key,
            verified_at: record.verified_at,
            source,
        })
    }

    fn age_of(&self, record: &AuthorizationRecord) -> u64 {
        self.clock.now_ms().saturating_sub(record.verified_at)
    }

    fn ceiling_ms(&self) -> u64 {
        self.config.session_ceiling.as_millis() as u64
    }
}

impl std::fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGate")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::session::{KeyValueStore, MemoryStore, KEY_IS_AUTHORIZED};

    const T0: u64 = 1_700_000_000_000;

    struct Fixture {
        gate: SessionGate,
        clock: Arc<ManualClock>,
        primary: Rc<MemoryStore>,
        fallback: Rc<MemoryStore>,
    }

    fn fixture(policy: ReloadPolicy) -> Fixture {
        let clock = Arc::new(ManualClock::new(T0));
        let primary = Rc::new(MemoryStore::new());
        let fallback = Rc::new(MemoryStore::new());
        let state = SessionState::new(Box::new(primary.clone()), Box::new(fallback.clone()));
        let gate = SessionGate::new(
            state,
            clock.clone(),
            GateConfig {
                reload_policy: policy,
                ..GateConfig::default()
            },
        );
        Fixture {
            gate,
            clock,
            primary,
            fallback,
        }
    }

    fn authorize(f: &Fixture) {
        f.gate
            .state()
            .set(&AuthorizationRecord {
                subject: "Math".into(),
                key: "k3x9a0qz".into(),
                verified_at: f.clock.now_ms(),
            })
            .unwrap();
    }

    #[test]
    fn test_denies_without_record() {
        let f = fixture(ReloadPolicy::Recover);
        let err = f.gate.enter(Navigation::Fresh).unwrap_err();
        assert!(matches!(err, RollcallError::NotAuthorized));
        assert!(err.requires_rescan());
        assert!(!f.gate.already_authorized());
    }

    #[test]
    fn test_admits_fresh_record() {
        let f = fixture(ReloadPolicy::Recover);
        authorize(&f);
        f.clock.advance(60_000);

        let session = f.gate.enter(Navigation::Fresh).unwrap();
        assert_eq!(session.subject, "Math");
        assert_eq!(session.key, "k3x9a0qz");
        assert_eq!(session.source, RecordSource::Primary);
        assert_eq!(session.remaining_ms(f.clock.now_ms()), 240_000);
        assert!(f.gate.already_authorized());
    }

    #[test]
    fn test_ceiling_is_inclusive() {
        let f = fixture(ReloadPolicy::Recover);
        authorize(&f);

        f.clock.advance(300_000);
        assert!(f.gate.check().is_ok());

        f.clock.advance(1);
        let err = f.gate.check().unwrap_err();
        assert!(matches!(
            err,
            RollcallError::SessionExpired {
                age_ms: 300_001,
                ceiling_ms: 300_000
            }
        ));
        assert!(f.primary.is_empty());
        assert!(f.fallback.is_empty());
    }

    #[test]
    fn test_expired_fallback_record_is_denied() {
        let f = fixture(ReloadPolicy::Recover);
        authorize(&f);
        f.primary.remove(KEY_IS_AUTHORIZED).unwrap();

        f.clock.advance(300_001);
        assert!(!f.gate.already_authorized());
        let err = f.gate.enter(Navigation::Reload).unwrap_err();
        assert!(matches!(err, RollcallError::SessionExpired { .. }));
        assert!(f.fallback.is_empty());
    }

    #[test]
    fn test_reload_recovers_from_fallback() {
        let f = fixture(ReloadPolicy::Recover);
        authorize(&f);
        f.primary.remove(KEY_IS_AUTHORIZED).unwrap();

        let session = f.gate.enter(Navigation::Reload).unwrap();
        assert_eq!(session.source, RecordSource::Fallback);
        assert_eq!(session.subject, "Math");
    }

    #[test]
    fn test_reload_with_start_over_policy_clears() {
        let f = fixture(ReloadPolicy::StartOver);
        authorize(&f);

        let err = f.gate.enter(Navigation::Reload).unwrap_err();
        assert!(matches!(err, RollcallError::NotAuthorized));
        assert!(f.primary.is_empty());
        assert!(f.fallback.is_empty());
    }

    #[test]
    fn test_start_over_policy_keeps_fresh_navigation() {
        let f = fixture(ReloadPolicy::StartOver);
        authorize(&f);
        assert!(f.gate.enter(Navigation::Fresh).is_ok());
    }

    #[test]
    fn test_logout_and_complete_clear_both_stores() {
        let f = fixture(ReloadPolicy::Recover);
        authorize(&f);
        f.gate.logout().unwrap();
        assert!(f.primary.is_empty() && f.fallback.is_empty());

        authorize(&f);
        f.gate.complete().unwrap();
        assert!(matches!(f.gate.check(), Err(RollcallError::NotAuthorized)));
    }
}
