//! WebAssembly bindings for the Rollcall student pages.
//!
//! The entry page calls [`scan_code`] with each decoded QR payload, the
//! capture page calls [`enter_capture_page`] on load. Authorization lives in
//! `sessionStorage` with a `localStorage` backup, exactly as the native
//! gate keeps it in its two stores.

use std::sync::Arc;
use std::time::Duration;

use rollcall_core::upload::CAPTURE_EXTENSION;
use rollcall_core::{
    derive_filename, Clock, ConsumerConfig, GateConfig, KeyValueStore, Navigation, QrConsumer,
    RecordSource, ReloadPolicy, RollcallError, SessionGate, SessionState, UploadRequest,
    DEFAULT_FRESHNESS_THRESHOLD, DEFAULT_SESSION_CEILING,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;
use web_sys::Storage;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// `Date.now()` as the gate's clock.
struct JsClock;

impl Clock for JsClock {
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}

/// A Web Storage area as a key-value store.
struct BrowserStore {
    storage: Storage,
}

impl KeyValueStore for BrowserStore {
    fn get(&self, key: &str) -> rollcall_core::Result<Option<String>> {
        self.storage.get_item(key).map_err(storage_error)
    }

    fn set(&self, key: &str, value: &str) -> rollcall_core::Result<()> {
        self.storage.set_item(key, value).map_err(storage_error)
    }

    fn remove(&self, key: &str) -> rollcall_core::Result<()> {
        self.storage.remove_item(key).map_err(storage_error)
    }
}

fn storage_error(err: JsValue) -> RollcallError {
    RollcallError::Storage(format!("{:?}", err))
}

/// `sessionStorage` as the primary store, `localStorage` as the fallback.
fn browser_session() -> Result<SessionState, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let session = window
        .session_storage()?
        .ok_or_else(|| JsValue::from_str("sessionStorage unavailable"))?;
    let local = window
        .local_storage()?
        .ok_or_else(|| JsValue::from_str("localStorage unavailable"))?;
    Ok(SessionState::new(
        Box::new(BrowserStore { storage: session }),
        Box::new(BrowserStore { storage: local }),
    ))
}

fn browser_gate(start_over_on_reload: bool) -> Result<SessionGate, JsValue> {
    Ok(SessionGate::new(
        browser_session()?,
        Arc::new(JsClock),
        gate_config(start_over_on_reload),
    ))
}

fn gate_config(start_over_on_reload: bool) -> GateConfig {
    GateConfig {
        session_ceiling: DEFAULT_SESSION_CEILING,
        reload_policy: if start_over_on_reload {
            ReloadPolicy::StartOver
        } else {
            ReloadPolicy::Recover
        },
    }
}

/// Outcome of a scan, as JSON for the entry page.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScanResult {
    /// Whether the code was accepted and stored
    pub accepted: bool,
    pub subject: Option<String>,
    /// User-facing reason for a rejection
    pub error: Option<String>,
}

/// Outcome of entering the capture page, as JSON.
#[derive(Debug, Serialize, Deserialize)]
pub struct GateResult {
    pub authorized: bool,
    pub subject: Option<String>,
    /// Milliseconds until the session expires (0 when not authorized)
    pub remaining_ms: u64,
    /// Whether the record came from the `localStorage` backup
    pub recovered: bool,
    /// Whether the page should send the user back to scan
    pub redirect: bool,
    pub error: Option<String>,
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| format!(r#"{{"error":"Serialization error: {}"}}"#, e))
}

fn scan_internal(
    payload: &str,
    threshold: Duration,
    session: &SessionState,
    clock: Arc<dyn Clock>,
) -> ScanResult {
    let consumer = QrConsumer::new(
        ConsumerConfig {
            freshness_threshold: threshold,
        },
        clock,
    );
    match consumer.consume(payload, session) {
        Ok(record) => ScanResult {
            accepted: true,
            subject: Some(record.subject),
            error: None,
        },
        Err(e) => ScanResult {
            accepted: false,
            subject: None,
            error: Some(e.to_string()),
        },
    }
}

fn enter_internal(gate: &SessionGate, navigation: Navigation) -> GateResult {
    match gate.enter(navigation) {
        Ok(session) => GateResult {
            authorized: true,
            remaining_ms: session.remaining_ms(gate.now_ms()),
            recovered: session.source == RecordSource::Fallback,
            subject: Some(session.subject),
            redirect: false,
            error: None,
        },
        Err(e) => GateResult {
            authorized: false,
            subject: None,
            remaining_ms: 0,
            recovered: false,
            redirect: e.requires_rescan(),
            error: Some(e.to_string()),
        },
    }
}

/// Accept a decoded QR payload and store the authorization.
///
/// `threshold_ms` defaults to the native freshness threshold.
///
/// # Returns
/// A JSON string containing a [`ScanResult`]
#[wasm_bindgen]
pub fn scan_code(payload: &str, threshold_ms: Option<u32>) -> Result<String, JsValue> {
    let threshold = threshold_ms
        .map(|ms| Duration::from_millis(ms.into()))
        .unwrap_or(DEFAULT_FRESHNESS_THRESHOLD);
    let session = browser_session()?;
    Ok(to_json(&scan_internal(
        payload,
        threshold,
        &session,
        Arc::new(JsClock),
    )))
}

/// Run the capture page gate.
///
/// # Arguments
/// * `is_reload` - Whether the page was reached through a reload
/// * `start_over_on_reload` - Drop the authorization on reload instead of recovering it
///
/// # Returns
/// A JSON string containing a [`GateResult`]
#[wasm_bindgen]
pub fn enter_capture_page(is_reload: bool, start_over_on_reload: bool) -> Result<String, JsValue> {
    let gate = browser_gate(start_over_on_reload)?;
    let navigation = if is_reload {
        Navigation::Reload
    } else {
        Navigation::Fresh
    };
    Ok(to_json(&enter_internal(&gate, navigation)))
}

/// Whether the entry page should skip straight to the capture page.
#[wasm_bindgen]
pub fn already_authorized() -> Result<bool, JsValue> {
    Ok(browser_gate(false)?.already_authorized())
}

/// Clear the authorization from both storage areas.
#[wasm_bindgen]
pub fn logout() -> Result<(), JsValue> {
    browser_gate(false)?
        .logout()
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Spend the authorization after the server accepted the upload.
#[wasm_bindgen]
pub fn complete_submission() -> Result<(), JsValue> {
    browser_gate(false)?
        .complete()
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// `{subject}_{roll}.png` for the current upload.
#[wasm_bindgen]
pub fn derive_upload_filename(subject: &str, roll_number: &str) -> Result<String, JsValue> {
    derive_filename(subject, roll_number, CAPTURE_EXTENSION)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// JSON body for `POST /upload`.
#[wasm_bindgen]
pub fn build_upload_body(image_data_uri: &str, filename: &str) -> String {
    to_json(&UploadRequest {
        image: image_data_uri.to_string(),
        filename: filename.to_string(),
    })
}

/// Get the library version.
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::ManualClock;

    const T0: u64 = 1_700_000_000_000;

    fn payload(issued_at: u64) -> String {
        format!(
            r#"{{"subject":"Math","authKey":"k3x9a0qz","timestamp":{},"validUntil":{}}}"#,
            issued_at,
            issued_at + 2000
        )
    }

    #[test]
    fn test_scan_accepts_fresh_code() {
        let session = SessionState::in_memory();
        let clock = Arc::new(ManualClock::new(T0 + 150));

        let result = scan_internal(&payload(T0), DEFAULT_FRESHNESS_THRESHOLD, &session, clock);
        assert!(result.accepted);
        assert_eq!(result.subject.as_deref(), Some("Math"));
        assert!(session.get().unwrap().is_some());
    }

    #[test]
    fn test_scan_rejects_stale_code() {
        let session = SessionState::in_memory();
        let clock = Arc::new(ManualClock::new(T0 + 5000));

        let result = scan_internal(&payload(T0), DEFAULT_FRESHNESS_THRESHOLD, &session, clock);
        assert!(!result.accepted);
        assert!(result.error.unwrap().contains("expired"));
        assert!(session.get().unwrap().is_none());
    }

    #[test]
    fn test_gate_redirects_when_not_authorized() {
        let gate = SessionGate::new(
            SessionState::in_memory(),
            Arc::new(ManualClock::new(T0)),
            gate_config(false),
        );

        let result = enter_internal(&gate, Navigation::Fresh);
        assert!(!result.authorized);
        assert!(result.redirect);
        assert_eq!(result.remaining_ms, 0);
    }

    #[test]
    fn test_gate_reports_remaining_time() {
        let clock = Arc::new(ManualClock::new(T0));
        let session = SessionState::in_memory();
        let scanned = scan_internal(&payload(T0), DEFAULT_FRESHNESS_THRESHOLD, &session, clock.clone());
        assert!(scanned.accepted);

        clock.advance(60_000);
        let gate = SessionGate::new(session, clock, gate_config(false));
        let result = enter_internal(&gate, Navigation::Reload);
        assert!(result.authorized);
        assert_eq!(result.remaining_ms, 240_000);
        assert!(!result.recovered);
    }

    #[test]
    fn test_start_over_reload_drops_authorization() {
        let clock = Arc::new(ManualClock::new(T0));
        let session = SessionState::in_memory();
        scan_internal(&payload(T0), DEFAULT_FRESHNESS_THRESHOLD, &session, clock.clone());

        let gate = SessionGate::new(session, clock, gate_config(true));
        let result = enter_internal(&gate, Navigation::Reload);
        assert!(!result.authorized);
        assert!(result.redirect);
        assert!(gate.state().get().unwrap().is_none());
    }

    #[test]
    fn test_upload_body_shape() {
        let body: serde_json::Value =
            serde_json::from_str(&build_upload_body("data:image/png;base64,AAAA", "Math_12.png"))
                .unwrap();
        assert_eq!(body["image"], "data:image/png;base64,AAAA");
        assert_eq!(body["filename"], "Math_12.png");
    }
}
