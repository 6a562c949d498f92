//! Common utility functions shared across CLI commands.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rollcall_core::{FileStore, GateConfig, ReloadPolicy, SessionGate, SessionState, SystemClock};

/// Per-run store (the browser's per-tab storage).
pub const SESSION_FILE: &str = "session.json";

/// Durable fallback store (the browser's per-origin storage).
pub const DURABLE_FILE: &str = "durable.json";

/// Session state kept in `state_dir`.
///
/// Both stores are files so that `scan` and `submit` can run as separate
/// processes.
pub fn open_session(state_dir: &Path) -> SessionState {
    SessionState::new(
        Box::new(FileStore::new(state_dir.join(SESSION_FILE))),
        Box::new(FileStore::new(state_dir.join(DURABLE_FILE))),
    )
}

/// Session gate over the state directory, on the system clock.
pub fn open_gate(state_dir: &Path, ceiling_secs: u64, reload_policy: ReloadPolicy) -> SessionGate {
    SessionGate::new(
        open_session(state_dir),
        Arc::new(SystemClock),
        GateConfig {
            session_ceiling: Duration::from_secs(ceiling_secs),
            reload_policy,
        },
    )
}

/// Format a Unix timestamp (milliseconds) as a human-readable UTC string.
pub fn format_timestamp(timestamp_ms: u64) -> String {
    let secs = (timestamp_ms / 1000) as i64;
    let nsecs = ((timestamp_ms % 1000) * 1_000_000) as u32;
    match Utc.timestamp_opt(secs, nsecs) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        _ => format!("{}ms", timestamp_ms),
    }
}

/// `m:ss` for a remaining duration in milliseconds.
pub fn format_remaining(remaining_ms: u64) -> String {
    let secs = remaining_ms / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Show only the start of a key.
pub fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(3).collect();
    format!("{}***", visible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::AuthorizationRecord;

    #[test]
    fn test_format_timestamp() {
        // 2024-01-15 12:30:45.123 UTC
        let ts = 1705321845123;
        let formatted = format_timestamp(ts);
        assert!(formatted.contains("2024-01-15"));
        assert!(formatted.contains("UTC"));
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(300_000), "5:00");
        assert_eq!(format_remaining(61_999), "1:01");
        assert_eq!(format_remaining(0), "0:00");
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("k3x9a0qz"), "k3x***");
        assert_eq!(mask_key("ab"), "ab***");
    }

    #[test]
    fn test_session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let record = AuthorizationRecord {
            subject: "Math".into(),
            key: "k3x9a0qz".into(),
            verified_at: 1_700_000_000_000,
        };
        open_session(dir.path()).set(&record).unwrap();

        let (loaded, _) = open_session(dir.path()).get().unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(dir.path().join(SESSION_FILE).exists());
        assert!(dir.path().join(DURABLE_FILE).exists());
    }
}
