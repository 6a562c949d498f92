//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rollcall_core::{Clock, SystemClock};

use crate::ledger::AttendanceLedger;
use crate::storage::UploadDir;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Directory receiving uploaded selfies
    pub uploads: Arc<UploadDir>,
    /// CSV ledger of accepted uploads
    pub ledger: Arc<AttendanceLedger>,
    /// Time source for ledger rows
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(uploads: UploadDir, ledger: AttendanceLedger) -> Self {
        Self {
            uploads: Arc::new(uploads),
            ledger: Arc::new(ledger),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall clock (tests pin the ledger date with it).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current time according to the state's clock.
    pub fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.clock.now_ms() as i64).unwrap_or_else(Utc::now)
    }
}
