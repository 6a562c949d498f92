//! Upload validation module
//!
//! Checks applied to `POST /upload` before anything touches the disk.

use axum::http::HeaderMap;
use rollcall_core::{is_plain_filename, UploadRequest, AUTH_KEY_HEADER};

use crate::error::ApiError;

/// Whether the request carries a non-empty `auth-key` header.
///
/// Presence is all that is checked: the value is never compared against the
/// keys the issuer minted.
pub fn has_auth_key(headers: &HeaderMap) -> bool {
    headers
        .get(AUTH_KEY_HEADER)
        .is_some_and(|v| v.as_bytes().iter().any(|b| !b.is_ascii_whitespace()))
}

/// Parses the JSON body, rejecting anything without both fields.
pub fn parse_upload_request(body: &[u8]) -> Result<UploadRequest, ApiError> {
    let request: UploadRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Missing required data: {}", e)))?;
    if request.image.trim().is_empty() {
        return Err(ApiError::bad_request("Missing required data: image"));
    }
    Ok(request)
}

/// Validates that the filename stays inside the flat upload directory.
pub fn validate_filename(filename: &str) -> Result<(), ApiError> {
    if is_plain_filename(filename) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "Invalid filename: '{}'. Expected a plain file name",
            filename
        )))
    }
}
