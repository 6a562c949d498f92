//! Rollcall Core - rotating QR attendance library
//!
//! A teacher screen shows a QR code that is re-minted every couple of seconds.
//! A student scans it, which authorizes their device for a short while, takes
//! a selfie and submits it together with their roll number.
//!
//! # Features
//!
//! - `network` (default): issuer timers, random keys and the HTTP uploader
//! - `capture` (default): camera / file capture and PNG encoding
//! - `openapi`: `utoipa` schemas for the upload wire types
//!
//! Without default features only the scan, session gate and wire types are
//! compiled, which is what the browser (Wasm) build uses.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rollcall_core::{
//!     ConsumerConfig, GateConfig, IssuerConfig, Navigation, QrConsumer, QrIssuer,
//!     SessionGate, SessionState, SystemClock,
//! };
//!
//! # async fn example() -> rollcall_core::Result<()> {
//! let issuer = QrIssuer::with_config(IssuerConfig::default());
//! let code = issuer.start("Math")?;
//!
//! let clock = Arc::new(SystemClock);
//! let consumer = QrConsumer::new(ConsumerConfig::default(), clock.clone());
//! let gate = SessionGate::new(SessionState::in_memory(), clock, GateConfig::default());
//! consumer.consume(&code.payload, gate.state())?;
//!
//! let session = gate.enter(Navigation::Fresh)?;
//! assert_eq!(session.subject, "Math");
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod consumer;
pub mod credential;
pub mod error;
pub mod session;
pub mod upload;

#[cfg(feature = "network")]
pub mod issuer;
#[cfg(feature = "network")]
pub mod keygen;

#[cfg(feature = "capture")]
pub mod capture;

#[cfg(all(feature = "network", feature = "capture"))]
pub mod submit;

// Re-export main types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use consumer::{ConsumerConfig, QrConsumer, DEFAULT_FRESHNESS_THRESHOLD};
pub use credential::Credential;
pub use error::{Result, RollcallError};
pub use session::{
    ActiveSession, AuthorizationRecord, FileStore, GateConfig, KeyValueStore, MemoryStore,
    Navigation, RecordSource, ReloadPolicy, SessionGate, SessionState, DEFAULT_SESSION_CEILING,
};
pub use upload::{
    decode_data_uri, derive_filename, encode_data_uri, is_plain_filename, parse_filename,
    UploadRequest, UploadResponse, AUTH_KEY_HEADER,
};

#[cfg(feature = "network")]
pub use issuer::{IssuedCode, IssuerConfig, QrIssuer};
#[cfg(feature = "network")]
pub use keygen::{KeyGenerator, MockKeyGenerator, RandomKeyGenerator, KEY_LEN};

#[cfg(feature = "capture")]
pub use capture::{CaptureSource, CapturedImage, FileCapture, StreamCapture};

#[cfg(all(feature = "network", feature = "capture"))]
pub use submit::{
    HttpUploader, LeavePrompt, SubmitConfig, SubmitController, SubmitOutcome, UploadReply,
    Uploader,
};
