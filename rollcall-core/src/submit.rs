//! Capture-page submission.
//!
//! Sends the captured selfie together with the scanned key to the upload
//! receiver. One request at a time, no retries, no client-side timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::capture::{CaptureSource, CapturedImage};
use crate::error::{Result, RollcallError};
use crate::session::SessionGate;
use crate::upload::{
    derive_filename, UploadRequest, UploadResponse, AUTH_KEY_HEADER, CAPTURE_EXTENSION,
    UPLOAD_PATH,
};

/// Message shown when the server rejects an upload without saying why.
pub const GENERIC_FAILURE: &str = "Failed to submit attendance, please try again";

/// Raw answer of the upload receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReply {
    pub status: u16,
    /// Parsed body, if it was the expected JSON.
    pub body: Option<UploadResponse>,
}

impl UploadReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) && self.body.as_ref().is_some_and(|b| b.success)
    }
}

/// Transport for upload requests.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, request: &UploadRequest, auth_key: Option<&str>) -> Result<UploadReply>;
}

#[async_trait]
impl<U: Uploader + ?Sized> Uploader for Arc<U> {
    async fn upload(&self, request: &UploadRequest, auth_key: Option<&str>) -> Result<UploadReply> {
        (**self).upload(request, auth_key).await
    }
}

/// `POST {base_url}/upload` over reqwest.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
    endpoint: String,
}

impl HttpUploader {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(RollcallError::Validation("Server URL is empty".into()));
        }
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base, UPLOAD_PATH),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, request: &UploadRequest, auth_key: Option<&str>) -> Result<UploadReply> {
        let start = Instant::now();
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = auth_key {
            builder = builder.header(AUTH_KEY_HEADER, key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let body = serde_json::from_slice::<UploadResponse>(&bytes).ok();
        debug!(
            endpoint = %self.endpoint,
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Upload response received"
        );

        Ok(UploadReply {
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SubmitConfig {
    /// Send the `auth-key` header (off for the unauthenticated variant).
    pub send_auth_key: bool,
    pub image_extension: String,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            send_auth_key: true,
            image_extension: CAPTURE_EXTENSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Attendance stored; the authorization has been spent.
    Recorded { filename: String, subject: String },
}

/// Whether leaving the capture page needs confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeavePrompt {
    Confirm,
    Allow,
}

/// Resets the in-flight flag when a submission ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives the capture page: holds the capture, submits it once.
pub struct SubmitController<U = HttpUploader> {
    gate: SessionGate,
    uploader: U,
    config: SubmitConfig,
    capture: Mutex<Option<CapturedImage>>,
    in_flight: AtomicBool,
}

impl<U: Uploader> SubmitController<U> {
    pub fn new(gate: SessionGate, uploader: U, config: SubmitConfig) -> Self {
        Self {
            gate,
            uploader,
            config,
            capture: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }

    /// Take a still from `source`, replacing any previous capture.
    pub fn capture_from(&self, source: &dyn CaptureSource) -> Result<()> {
        let image = source.capture()?;
        let (width, height) = image.dimensions();
        debug!(width, height, "Photo captured");
        self.set_capture(image);
        Ok(())
    }

    pub fn set_capture(&self, image: CapturedImage) {
        *self.capture.lock().unwrap_or_else(|e| e.into_inner()) = Some(image);
    }

    pub fn has_unsaved_capture(&self) -> bool {
        self.capture
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn leave_check(&self) -> LeavePrompt {
        if self.has_unsaved_capture() {
            LeavePrompt::Confirm
        } else {
            LeavePrompt::Allow
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Submit the current capture under `roll_number`.
    ///
    /// On success the session is cleared and the capture discarded. On
    /// rejection both are kept so the user can retry.
    pub async fn submit(&self, roll_number: &str) -> Result<SubmitOutcome> {
        let roll = roll_number.trim();
        if roll.is_empty() {
            return Err(RollcallError::Validation(
                "Please enter your roll number".into(),
            ));
        }
        let image = self
            .capture
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| RollcallError::Validation("Please take a photo first".into()))?;

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RollcallError::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let session = self.gate.check()?;
        let filename = derive_filename(&session.subject, roll, &self.config.image_extension)?;
        let request = UploadRequest {
            image: image.to_data_uri()?,
            filename: filename.clone(),
        };
        let auth_key = self.config.send_auth_key.then_some(session.key.as_str());

        debug!(filename = %filename, bytes = request.image.len(), "Submitting attendance");
        let reply = self.uploader.upload(&request, auth_key).await?;

        if !reply.is_success() {
            let message = reply
                .body
                .and_then(|b| b.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE.to_string());
            warn!(status = reply.status, message = %message, "Upload rejected");
            return Err(RollcallError::Rejected {
                status: reply.status,
                message,
            });
        }

        self.gate.complete()?;
        self.capture.lock().unwrap_or_else(|e| e.into_inner()).take();
        info!(filename = %filename, subject = %session.subject, "Attendance submitted");
        Ok(SubmitOutcome::Recorded {
            filename,
            subject: session.subject,
        })
    }
}

impl<U> std::fmt::Debug for SubmitController<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitController")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
