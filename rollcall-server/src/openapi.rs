//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document served at `/api-docs/openapi.json`.

use rollcall_core::{UploadRequest, UploadResponse};
use utoipa::OpenApi;

use crate::handlers::{AttendanceResponse, HealthResponse, ReadyResponse, StatusResponse};
use crate::ledger::AttendanceRecord;

/// Rollcall upload receiver - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rollcall - Upload Receiver",
        version = "0.1.0",
        description = r#"
## Classroom attendance selfie receiver

The teacher screen shows a rotating QR code. A student scans it, takes a
selfie and the capture page posts it here as a base64 data URI.

### How It Works

1. The capture page sends `POST /upload` with `{image, filename}` and the scanned key in `auth-key`
2. The image is decoded and written to the upload directory as `filename`
3. A second upload with the same name replaces the first
4. A `{subject}_{rollNumber}` filename adds a row to the attendance ledger,
   readable with `GET /get_attendance` and `GET /download_attendance`

The `auth-key` header is only checked for presence.
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local classroom server")
    ),
    tags(
        (name = "Upload", description = "Receive attendance selfies"),
        (name = "Attendance", description = "Attendance ledger queries and CSV export"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::root,
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::upload::upload_handler,
        crate::handlers::attendance::get_attendance,
        crate::handlers::attendance::download_attendance,
    ),
    components(
        schemas(
            StatusResponse,
            HealthResponse,
            ReadyResponse,
            UploadRequest,
            UploadResponse,
            AttendanceRecord,
            AttendanceResponse,
        )
    )
)]
pub struct ApiDoc;
