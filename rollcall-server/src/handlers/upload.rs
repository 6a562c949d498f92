//! Selfie upload handler
//!
//! Handles POST /upload requests from the capture page.

use axum::{body::Bytes, extract::State, Json};
use rollcall_core::{decode_data_uri, parse_filename, UploadRequest, UploadResponse};

use crate::error::ApiError;
use crate::ledger::AttendanceRecord;
use crate::state::AppState;
use crate::validation::{parse_upload_request, validate_filename};

/// Store an attendance selfie
///
/// Accepts a JSON body with:
/// - **image** (required): the selfie as a base64 data URI (a bare base64 string is accepted too)
/// - **filename** (required): a plain file name, `{subject}_{rollNumber}.png` by convention
///
/// The `auth-key` header must be present and non-empty (checked by the
/// route middleware before the body is read). Its value is not checked
/// against issued codes. A second upload under the same name replaces the
/// first. Names following `{subject}_{rollNumber}.ext` also add a row to the
/// attendance ledger.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "Upload",
    request_body(
        content = UploadRequest,
        content_type = "application/json",
        description = "Captured selfie and target file name"
    ),
    params(
        ("auth-key" = String, Header, description = "Key scanned from the current QR code")
    ),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "Body is not the expected JSON or filename is not plain", body = UploadResponse),
        (status = 401, description = "Missing auth-key header", body = UploadResponse),
        (status = 413, description = "Body over the configured limit"),
        (status = 500, description = "Payload could not be decoded or written", body = UploadResponse)
    )
)]
pub async fn upload_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let request = parse_upload_request(&body)?;
    validate_filename(&request.filename)?;

    let bytes = decode_data_uri(&request.image).map_err(|e| ApiError::upload_failed(e.to_string()))?;
    let size = bytes.len();
    let path = state.uploads.store(&request.filename, bytes).await?;

    tracing::info!(
        filename = %request.filename,
        bytes = size,
        path = %path.display(),
        "File uploaded"
    );

    match parse_filename(&request.filename) {
        Some((subject, roll)) => {
            state
                .ledger
                .append(AttendanceRecord::present(
                    subject,
                    roll,
                    request.filename.as_str(),
                    state.now(),
                ))
                .await?;
        }
        None => {
            tracing::warn!(filename = %request.filename, "Filename has no subject/roll, not recorded");
        }
    }

    Ok(Json(UploadResponse::ok("File uploaded successfully")))
}
