//! End-to-end submit tests: the real reqwest client against a served router.
//!
//! Each test binds the router on an ephemeral port and drives
//! `SubmitController<HttpUploader>` through a full submission.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{http::HeaderMap, http::StatusCode, routing::post, Router};
use image::{Rgba, RgbaImage};
use rollcall_core::submit::GENERIC_FAILURE;
use rollcall_core::{
    AuthorizationRecord, CapturedImage, Clock, GateConfig, HttpUploader, RollcallError,
    SessionGate, SessionState, SubmitConfig, SubmitController, SubmitOutcome, SystemClock,
    AUTH_KEY_HEADER,
};
use rollcall_server::{create_router_with_config, Config};
use tempfile::TempDir;
use tokio::net::TcpListener;

const KEY: &str = "k3x9a0qz";

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// A served receiver with its upload directory and ledger
struct Receiver {
    addr: SocketAddr,
    uploads: TempDir,
    data: TempDir,
}

impl Receiver {
    async fn start() -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let router = create_router_with_config(&Config {
            upload_dir: uploads.path().to_path_buf(),
            attendance_file: data.path().join("attendance.csv"),
            ..Config::default()
        });
        let addr = serve(router).await;
        Self { addr, uploads, data }
    }
}

fn controller(addr: SocketAddr, config: SubmitConfig) -> SubmitController<HttpUploader> {
    let clock = Arc::new(SystemClock);
    let state = SessionState::in_memory();
    state
        .set(&AuthorizationRecord {
            subject: "Math".into(),
            key: KEY.into(),
            verified_at: clock.now_ms(),
        })
        .unwrap();
    let gate = SessionGate::new(state, clock, GateConfig::default());

    let uploader = HttpUploader::new(&format!("http://{}", addr)).unwrap();
    let controller = SubmitController::new(gate, uploader, config);
    controller.set_capture(CapturedImage::new(RgbaImage::from_pixel(
        4,
        4,
        Rgba([10, 200, 30, 255]),
    )));
    controller
}

#[tokio::test]
async fn test_submit_stores_selfie_and_spends_session() {
    let receiver = Receiver::start().await;
    let controller = controller(receiver.addr, SubmitConfig::default());

    let outcome = controller.submit(" 12 ").await.unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::Recorded {
            filename: "Math_12.png".into(),
            subject: "Math".into(),
        }
    );

    let stored = std::fs::read(receiver.uploads.path().join("Math_12.png")).unwrap();
    let decoded = image::load_from_memory(&stored).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (4, 4));

    // The receiver only records attendance for requests carrying the key
    let ledger = std::fs::read_to_string(receiver.data.path().join("attendance.csv")).unwrap();
    assert!(ledger.contains("12,Math,"));
    assert!(ledger.contains(",Present,Math_12.png"));

    assert!(controller.gate().state().get().unwrap().is_none());
    assert!(!controller.has_unsaved_capture());
}

#[tokio::test]
async fn test_submit_without_key_is_rejected_and_session_kept() {
    let receiver = Receiver::start().await;
    let controller = controller(
        receiver.addr,
        SubmitConfig {
            send_auth_key: false,
            ..SubmitConfig::default()
        },
    );

    let err = controller.submit("12").await.unwrap_err();
    match err {
        RollcallError::Rejected { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Authentication required");
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    assert!(!receiver.uploads.path().join("Math_12.png").exists());
    assert!(!receiver.data.path().join("attendance.csv").exists());
    assert!(controller.gate().state().get().unwrap().is_some());
    assert!(controller.has_unsaved_capture());
}

#[tokio::test]
async fn test_plain_text_failure_falls_back_to_generic_message() {
    let seen = Arc::new(Mutex::new(None::<String>));
    let recorder = seen.clone();
    let router = Router::new().route(
        "/upload",
        post(move |headers: HeaderMap| {
            let recorder = recorder.clone();
            async move {
                let key = headers
                    .get(AUTH_KEY_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                *recorder.lock().unwrap() = key;
                (StatusCode::BAD_GATEWAY, "upstream down")
            }
        }),
    );
    let addr = serve(router).await;
    let controller = controller(addr, SubmitConfig::default());

    let err = controller.submit("12").await.unwrap_err();
    match err {
        RollcallError::Rejected { status, message } => {
            assert_eq!(status, 502);
            assert_eq!(message, GENERIC_FAILURE);
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    assert_eq!(seen.lock().unwrap().as_deref(), Some(KEY));
    assert!(controller.gate().state().get().unwrap().is_some());
}
