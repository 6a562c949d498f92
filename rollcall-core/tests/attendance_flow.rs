//! End-to-end attendance scenarios: issue, scan, gate, capture, submit.
//!
//! The upload side is an in-process fake that writes into a temporary
//! directory the same way the receiver does.

#![cfg(all(feature = "network", feature = "capture"))]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use rollcall_core::session::KEY_LAST_SCAN;
use rollcall_core::{
    decode_data_uri, is_plain_filename, ConsumerConfig, FileStore, GateConfig, IssuerConfig,
    ManualClock, MemoryStore, MockKeyGenerator, Navigation, QrConsumer, QrIssuer, RecordSource,
    KeyValueStore, Result, RollcallError, SessionGate, SessionState, StreamCapture, SubmitConfig,
    SubmitController, SubmitOutcome, UploadReply, UploadRequest, UploadResponse, Uploader,
};

const T0: u64 = 1_700_000_000_000;

/// Mirrors the receiver: presence-only auth, flat directory, last write wins.
struct DirectoryUploader {
    dir: PathBuf,
    seen_keys: Mutex<Vec<String>>,
}

#[async_trait]
impl Uploader for DirectoryUploader {
    async fn upload(&self, request: &UploadRequest, auth_key: Option<&str>) -> Result<UploadReply> {
        let Some(key) = auth_key.filter(|k| !k.is_empty()) else {
            return Ok(UploadReply {
                status: 401,
                body: Some(UploadResponse::failure("AUTH_REQUIRED", "Unauthorized")),
            });
        };
        self.seen_keys.lock().unwrap().push(key.to_string());
        assert!(is_plain_filename(&request.filename));

        let bytes = decode_data_uri(&request.image)?;
        std::fs::write(self.dir.join(&request.filename), bytes)
            .map_err(|e| RollcallError::Storage(e.to_string()))?;
        Ok(UploadReply {
            status: 200,
            body: Some(UploadResponse::ok("File uploaded successfully")),
        })
    }
}

fn issuer(clock: Arc<ManualClock>) -> QrIssuer {
    QrIssuer::new(
        IssuerConfig::default(),
        Arc::new(MockKeyGenerator::new()),
        clock,
    )
}

fn consumer(clock: Arc<ManualClock>, threshold_ms: u64) -> QrConsumer {
    QrConsumer::new(
        ConsumerConfig {
            freshness_threshold: Duration::from_millis(threshold_ms),
        },
        clock,
    )
}

#[tokio::test(start_paused = true)]
async fn test_scan_within_threshold_then_stale_rescan() {
    let clock = Arc::new(ManualClock::new(T0));
    let issuer = issuer(clock.clone());
    let code = issuer.start("Math").unwrap();
    assert_eq!(code.credential.issued_at, T0);

    let session = SessionState::in_memory();
    let consumer = consumer(clock.clone(), 200);

    clock.set(T0 + 150);
    let record = consumer.consume(&code.payload, &session).unwrap();
    assert_eq!(record.subject, "Math");
    assert_eq!(record.key, code.credential.key);

    clock.set(T0 + 5_000);
    let err = consumer.consume(&code.payload, &session).unwrap_err();
    assert!(matches!(err, RollcallError::ExpiredCode { age_ms: 5_000, .. }));

    // The earlier authorization survives the rejected rescan
    assert_eq!(session.get().unwrap().unwrap().0, record);
    issuer.stop();
}

#[tokio::test]
async fn test_full_attendance_flow_writes_selfie() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(T0));
    let issuer = issuer(clock.clone());
    let code = issuer.start("Math").unwrap();

    let gate = SessionGate::new(SessionState::in_memory(), clock.clone(), GateConfig::default());
    clock.advance(400);
    consumer(clock.clone(), 2_500)
        .consume(&code.payload, gate.state())
        .unwrap();

    clock.advance(30_000);
    let active = gate.enter(Navigation::Fresh).unwrap();
    assert_eq!(active.subject, "Math");

    let uploader = Arc::new(DirectoryUploader {
        dir: dir.path().to_path_buf(),
        seen_keys: Mutex::new(Vec::new()),
    });
    let controller = SubmitController::new(gate, uploader.clone(), SubmitConfig::default());

    let camera = StreamCapture::new();
    camera.push(RgbaImage::from_pixel(8, 8, Rgba([120, 80, 40, 255])));
    controller.capture_from(&camera).unwrap();

    let outcome = controller.submit("12").await.unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::Recorded {
            filename: "Math_12.png".into(),
            subject: "Math".into()
        }
    );

    let stored = image::open(dir.path().join("Math_12.png")).unwrap();
    assert_eq!((stored.width(), stored.height()), (8, 8));
    assert_eq!(
        uploader.seen_keys.lock().unwrap().as_slice(),
        [code.credential.key.clone()]
    );

    // The authorization is spent
    assert!(matches!(
        controller.gate().enter(Navigation::Fresh),
        Err(RollcallError::NotAuthorized)
    ));
    issuer.stop();
}

#[tokio::test]
async fn test_same_filename_last_write_wins() {
    let dir = tempfile::tempdir().unwrap();
    let uploader = Arc::new(DirectoryUploader {
        dir: dir.path().to_path_buf(),
        seen_keys: Mutex::new(Vec::new()),
    });
    let clock = Arc::new(ManualClock::new(T0));

    for shade in [10u8, 250u8] {
        let gate = SessionGate::new(SessionState::in_memory(), clock.clone(), GateConfig::default());
        let payload = rollcall_core::Credential::mint("Math", "k3x9a0qz", T0, Duration::from_secs(2))
            .to_payload()
            .unwrap();
        consumer(clock.clone(), 2_500)
            .consume(&payload, gate.state())
            .unwrap();

        let controller = SubmitController::new(gate, uploader.clone(), SubmitConfig::default());
        controller.set_capture(rollcall_core::CapturedImage::new(RgbaImage::from_pixel(
            2,
            2,
            Rgba([shade, shade, shade, 255]),
        )));
        controller.submit("12").await.unwrap();
    }

    let stored = image::open(dir.path().join("Math_12.png")).unwrap().to_rgba8();
    assert_eq!(stored.get_pixel(0, 0)[0], 250);
}

#[test]
fn test_new_tab_recovers_from_durable_store() {
    let dir = tempfile::tempdir().unwrap();
    let durable = dir.path().join("durable.json");
    let clock = Arc::new(ManualClock::new(T0));

    let payload = rollcall_core::Credential::mint("Physics", "abcd1234", T0, Duration::from_secs(2))
        .to_payload()
        .unwrap();
    let first_tab = SessionState::new(Box::new(MemoryStore::new()), Box::new(FileStore::new(&durable)));
    consumer(clock.clone(), 2_500)
        .consume(&payload, &first_tab)
        .unwrap();

    // Fresh per-tab store, same durable file
    clock.advance(120_000);
    let second_tab = SessionGate::new(
        SessionState::new(Box::new(MemoryStore::new()), Box::new(FileStore::new(&durable))),
        clock.clone(),
        GateConfig::default(),
    );
    let active = second_tab.enter(Navigation::Reload).unwrap();
    assert_eq!(active.source, RecordSource::Fallback);
    assert_eq!(active.subject, "Physics");

    // Past the ceiling the durable record is denied and wiped
    clock.advance(180_001);
    assert!(matches!(
        second_tab.enter(Navigation::Reload),
        Err(RollcallError::SessionExpired { .. })
    ));
    assert_eq!(FileStore::new(&durable).get(KEY_LAST_SCAN).unwrap(), None);
    assert!(matches!(
        second_tab.enter(Navigation::Fresh),
        Err(RollcallError::NotAuthorized)
    ));
}

#[tokio::test]
async fn test_missing_auth_key_is_rejected_without_write() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(T0));
    let gate = SessionGate::new(SessionState::in_memory(), clock.clone(), GateConfig::default());
    let payload = rollcall_core::Credential::mint("Math", "k3x9a0qz", T0, Duration::from_secs(2))
        .to_payload()
        .unwrap();
    consumer(clock, 2_500).consume(&payload, gate.state()).unwrap();

    let uploader = DirectoryUploader {
        dir: dir.path().to_path_buf(),
        seen_keys: Mutex::new(Vec::new()),
    };
    let controller = SubmitController::new(
        gate,
        uploader,
        SubmitConfig {
            send_auth_key: false,
            ..SubmitConfig::default()
        },
    );
    controller.set_capture(rollcall_core::CapturedImage::new(RgbaImage::new(1, 1)));

    let err = controller.submit("12").await.unwrap_err();
    assert!(matches!(err, RollcallError::Rejected { status: 401, .. }));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert!(controller.gate().check().is_ok());
}
