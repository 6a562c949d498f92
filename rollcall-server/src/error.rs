//! API error handling module
//!
//! Provides a unified error type for all API endpoints. Every error body has
//! the same shape as a successful upload response: `{success, message, code}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rollcall_core::UploadResponse;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::storage::StorageError;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - body or filename unusable
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The `auth-key` header is missing or empty
    #[error("Authentication required")]
    AuthRequired,

    /// The payload could not be decoded or written
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// Writing to the upload directory failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Reading or appending the attendance ledger failed
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create an upload failure
    pub fn upload_failed(message: impl Into<String>) -> Self {
        Self::UploadFailed(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::AuthRequired => StatusCode::UNAUTHORIZED,
            Self::UploadFailed(_) | Self::Storage(_) | Self::Ledger(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::UploadFailed(_) | Self::Storage(_) => "UPLOAD_FAILED",
            Self::Ledger(_) => "LEDGER_ERROR",
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::BadRequest(message) => message.clone(),
            Self::AuthRequired => "Authentication required".to_string(),
            // Paths and OS errors stay in the logs
            Self::UploadFailed(_) | Self::Storage(_) => "Failed to upload file".to_string(),
            Self::Ledger(_) => "Attendance ledger unavailable".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let internal_message = self.to_string();

        match &self {
            Self::BadRequest(_) => {
                tracing::warn!(status = %status, code = code, error = %internal_message, "Client error");
            }
            Self::AuthRequired => {
                tracing::warn!(status = %status, code = code, "Authentication error");
            }
            Self::UploadFailed(_) | Self::Storage(_) | Self::Ledger(_) => {
                tracing::error!(status = %status, code = code, error = %internal_message, "Server error");
            }
        }

        let body = UploadResponse::failure(code, self.client_message());
        (status, Json(body)).into_response()
    }
}
