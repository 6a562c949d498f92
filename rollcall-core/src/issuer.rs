//! Teacher-side QR issuer.
//!
//! An issuing session owns two periodic tasks: one re-mints the credential
//! every `period`, the other publishes the "next code in N seconds"
//! countdown. Both are cancelled together when the session ends, whether by
//! [`QrIssuer::stop`], by starting a new session, or by dropping the issuer.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::credential::Credential;
use crate::error::{Result, RollcallError};
use crate::keygen::{KeyGenerator, RandomKeyGenerator};

/// Default re-mint period.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(2_000);

/// Default advertised validity window of each code.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(2_000);

/// Default countdown refresh interval.
pub const DEFAULT_COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Issuer timing configuration.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// Interval between two mints.
    pub period: Duration,
    /// Validity window advertised in each code (`validUntil - timestamp`).
    pub window: Duration,
    /// Interval between two countdown updates.
    pub countdown_tick: Duration,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            window: DEFAULT_WINDOW,
            countdown_tick: DEFAULT_COUNTDOWN_TICK,
        }
    }
}

/// A minted code as shown on the teacher page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCode {
    pub credential: Credential,
    /// Text to render into the QR code
    pub payload: String,
    /// 0 for the first code of a session, then incremented per mint
    pub sequence: u64,
}

struct Minter {
    subject: String,
    window: Duration,
    keys: Arc<dyn KeyGenerator>,
    clock: Arc<dyn Clock>,
}

impl Minter {
    fn mint(&self, sequence: u64) -> Result<IssuedCode> {
        let credential = Credential::mint(
            self.subject.clone(),
            self.keys.generate(),
            self.clock.now_ms(),
            self.window,
        );
        let payload = credential.to_payload()?;
        Ok(IssuedCode {
            credential,
            payload,
            sequence,
        })
    }
}

/// The two timers of one issuing session.
struct IssuingSession {
    subject: String,
    remint: JoinHandle<()>,
    countdown: JoinHandle<()>,
}

impl Drop for IssuingSession {
    fn drop(&mut self) {
        self.remint.abort();
        self.countdown.abort();
    }
}

/// Rotating QR code issuer: **Idle → Issuing**.
pub struct QrIssuer {
    config: IssuerConfig,
    keys: Arc<dyn KeyGenerator>,
    clock: Arc<dyn Clock>,
    codes: Arc<watch::Sender<Option<IssuedCode>>>,
    countdown: Arc<watch::Sender<u64>>,
    session: Mutex<Option<IssuingSession>>,
}

impl QrIssuer {
    pub fn new(config: IssuerConfig, keys: Arc<dyn KeyGenerator>, clock: Arc<dyn Clock>) -> Self {
        let (codes, _) = watch::channel(None);
        let (countdown, _) = watch::channel(0);
        Self {
            config,
            keys,
            clock,
            codes: Arc::new(codes),
            countdown: Arc::new(countdown),
            session: Mutex::new(None),
        }
    }

    /// Issuer with random keys and the system clock.
    pub fn with_config(config: IssuerConfig) -> Self {
        Self::new(config, Arc::new(RandomKeyGenerator), Arc::new(SystemClock))
    }

    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    /// Watch the currently displayed code (`None` while idle).
    pub fn subscribe(&self) -> watch::Receiver<Option<IssuedCode>> {
        self.codes.subscribe()
    }

    /// Watch the seconds remaining until the next code.
    pub fn countdown(&self) -> watch::Receiver<u64> {
        self.countdown.subscribe()
    }

    /// The code currently displayed, if issuing.
    pub fn current(&self) -> Option<IssuedCode> {
        self.codes.borrow().clone()
    }

    pub fn is_issuing(&self) -> bool {
        self.lock_session().is_some()
    }

    /// Subject of the running session, if any.
    pub fn subject(&self) -> Option<String> {
        self.lock_session().as_ref().map(|s| s.subject.clone())
    }

    /// Start issuing codes for `subject`, replacing any running session.
    ///
    /// The first code is minted before this returns. Must be called from
    /// within a tokio runtime.
    pub fn start(&self, subject: &str) -> Result<IssuedCode> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(RollcallError::Validation(
                "Please enter a subject name".into(),
            ));
        }
        if self.config.period.is_zero() || self.config.countdown_tick.is_zero() {
            return Err(RollcallError::Validation(
                "issuer period and countdown tick must be non-zero".into(),
            ));
        }
        let runtime = Handle::try_current().map_err(|e| RollcallError::Runtime(e.to_string()))?;

        let mut slot = self.lock_session();
        if let Some(prior) = slot.take() {
            debug!(subject = %prior.subject, "Cancelling previous issuing session");
            drop(prior);
        }

        let minter = Arc::new(Minter {
            subject: subject.to_string(),
            window: self.config.window,
            keys: Arc::clone(&self.keys),
            clock: Arc::clone(&self.clock),
        });
        let first = minter.mint(0)?;
        self.codes.send_replace(Some(first.clone()));

        let started = Instant::now();
        let remint = runtime.spawn(remint_loop(
            minter,
            Arc::clone(&self.codes),
            self.config.period,
            started,
        ));
        let countdown = runtime.spawn(countdown_loop(
            Arc::clone(&self.countdown),
            self.config.period,
            self.config.countdown_tick,
            started,
        ));

        *slot = Some(IssuingSession {
            subject: subject.to_string(),
            remint,
            countdown,
        });

        info!(
            subject = %subject,
            period_ms = self.config.period.as_millis() as u64,
            window_ms = self.config.window.as_millis() as u64,
            "Started issuing codes"
        );
        Ok(first)
    }

    /// Stop issuing. Returns `false` if the issuer was already idle.
    pub fn stop(&self) -> bool {
        let prior = self.lock_session().take();
        match prior {
            Some(session) => {
                info!(subject = %session.subject, "Stopped issuing codes");
                drop(session);
                self.codes.send_replace(None);
                true
            }
            None => false,
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<IssuingSession>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for QrIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrIssuer")
            .field("config", &self.config)
            .field("subject", &self.subject())
            .finish()
    }
}

async fn remint_loop(
    minter: Arc<Minter>,
    codes: Arc<watch::Sender<Option<IssuedCode>>>,
    period: Duration,
    started: Instant,
) {
    let mut ticker = time::interval_at(started + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sequence = 1;
    loop {
        ticker.tick().await;
        match minter.mint(sequence) {
            Ok(code) => {
                debug!(
                    subject = %code.credential.subject,
                    sequence,
                    issued_at = code.credential.issued_at,
                    "Minted code"
                );
                codes.send_replace(Some(code));
            }
            Err(e) => warn!(error = %e, sequence, "Failed to mint code"),
        }
        sequence += 1;
    }
}

async fn countdown_loop(
    countdown: Arc<watch::Sender<u64>>,
    period: Duration,
    tick: Duration,
    started: Instant,
) {
    let mut ticker = time::interval_at(started, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        countdown.send_replace(seconds_until_next(started.elapsed(), period));
    }
}

/// Whole seconds (rounded up) until the next mint.
fn seconds_until_next(elapsed: Duration, period: Duration) -> u64 {
    let period_ms = period.as_millis().max(1);
    let remaining_ms = period_ms - elapsed.as_millis() % period_ms;
    remaining_ms.div_ceil(1_000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::keygen::MockKeyGenerator;

    fn test_issuer(clock: Arc<ManualClock>) -> QrIssuer {
        QrIssuer::new(
            IssuerConfig::default(),
            Arc::new(MockKeyGenerator::new()),
            clock,
        )
    }

    #[test]
    fn test_seconds_until_next() {
        let period = Duration::from_millis(2_000);
        assert_eq!(seconds_until_next(Duration::ZERO, period), 2);
        assert_eq!(seconds_until_next(Duration::from_millis(999), period), 2);
        assert_eq!(seconds_until_next(Duration::from_millis(1_000), period), 1);
        assert_eq!(seconds_until_next(Duration::from_millis(1_999), period), 1);
        assert_eq!(seconds_until_next(Duration::from_millis(2_000), period), 2);
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let issuer = test_issuer(Arc::new(ManualClock::new(0)));
        let err = issuer.start("Math").unwrap_err();
        assert!(matches!(err, RollcallError::Runtime(_)));
        assert!(!issuer.is_issuing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rejects_empty_subject() {
        let issuer = test_issuer(Arc::new(ManualClock::new(0)));
        let err = issuer.start("   ").unwrap_err();
        assert!(matches!(err, RollcallError::Validation(_)));
        assert!(!issuer.is_issuing());
        assert!(issuer.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_mints_immediately() {
        let clock = Arc::new(ManualClock::new(10_000));
        let issuer = test_issuer(clock);

        let first = issuer.start("Math").unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(first.credential.subject, "Math");
        assert_eq!(first.credential.key, "mock0000");
        assert_eq!(first.credential.issued_at, 10_000);
        assert_eq!(first.credential.valid_until, 12_000);
        assert_eq!(issuer.current(), Some(first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remints_every_period() {
        let clock = Arc::new(ManualClock::new(0));
        let issuer = test_issuer(Arc::clone(&clock));
        let mut codes = issuer.subscribe();

        issuer.start("Math").unwrap();
        codes.borrow_and_update();

        let before = Instant::now();
        clock.set(2_000);
        codes.changed().await.unwrap();
        assert_eq!(before.elapsed(), DEFAULT_PERIOD);

        let second = codes.borrow_and_update().clone().unwrap();
        assert_eq!(second.sequence, 1);
        assert_eq!(second.credential.key, "mock0001");
        assert_eq!(second.credential.issued_at, 2_000);

        codes.changed().await.unwrap();
        assert_eq!(codes.borrow().as_ref().unwrap().sequence, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_ticks_down_and_resets() {
        let issuer = test_issuer(Arc::new(ManualClock::new(0)));
        let countdown = issuer.countdown();
        issuer.start("Math").unwrap();

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*countdown.borrow(), 2);

        time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(*countdown.borrow(), 1);

        time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(*countdown.borrow(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_reminting() {
        let issuer = test_issuer(Arc::new(ManualClock::new(0)));
        let mut codes = issuer.subscribe();

        issuer.start("Math").unwrap();
        assert!(issuer.stop());
        assert!(!issuer.is_issuing());
        assert!(issuer.current().is_none());
        codes.borrow_and_update();

        time::sleep(Duration::from_secs(10)).await;
        assert!(!codes.has_changed().unwrap());

        // Idempotent
        assert!(!issuer.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_previous_session() {
        let issuer = test_issuer(Arc::new(ManualClock::new(0)));
        let mut codes = issuer.subscribe();

        issuer.start("Math").unwrap();
        issuer.start("Physics").unwrap();
        assert_eq!(issuer.subject().as_deref(), Some("Physics"));

        for _ in 0..3 {
            codes.changed().await.unwrap();
            let code = codes.borrow_and_update().clone().unwrap();
            assert_eq!(code.credential.subject, "Physics");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timers() {
        let issuer = test_issuer(Arc::new(ManualClock::new(0)));
        let mut codes = issuer.subscribe();
        issuer.start("Math").unwrap();
        codes.borrow_and_update();

        drop(issuer);
        time::sleep(Duration::from_secs(10)).await;

        // Sender dropped with the issuer and no further code was published.
        assert!(codes.has_changed().is_err());
        assert_eq!(codes.borrow().as_ref().unwrap().sequence, 0);
    }
}
