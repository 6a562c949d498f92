//! Upload wire contract shared by the submitting client and the receiver.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RollcallError};

/// Header carrying the scanned credential key.
pub const AUTH_KEY_HEADER: &str = "auth-key";

/// Upload endpoint path.
pub const UPLOAD_PATH: &str = "/upload";

/// Extension of submitted captures (always encoded as PNG).
pub const CAPTURE_EXTENSION: &str = "png";

/// JSON body of `POST /upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UploadRequest {
    /// Image as a data URI (`data:image/png;base64,...`)
    #[cfg_attr(feature = "openapi", schema(example = "data:image/png;base64,iVBORw0KGgo="))]
    pub image: String,
    /// Name to store the image under
    #[cfg_attr(feature = "openapi", schema(example = "Math_12.png"))]
    pub filename: String,
}

/// JSON body of every `/upload` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(example = "File uploaded successfully"))]
    pub message: Option<String>,
    /// Machine-readable error code on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(example = "AUTH_REQUIRED"))]
    pub code: Option<String>,
}

impl UploadResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            code: None,
        }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            code: Some(code.into()),
        }
    }
}

/// Build the stored filename: `{subject}_{rollNumber}.{ext}`.
///
/// The roll number is trimmed and must not be empty. Path separators in
/// either part are replaced so the name stays a single path component.
pub fn derive_filename(subject: &str, roll_number: &str, extension: &str) -> Result<String> {
    let roll = roll_number.trim();
    if roll.is_empty() {
        return Err(RollcallError::Validation(
            "Please enter your roll number".into(),
        ));
    }
    let subject = subject.trim();
    if subject.is_empty() {
        return Err(RollcallError::Validation("Subject is missing".into()));
    }
    Ok(format!(
        "{}_{}.{}",
        flatten(subject),
        flatten(roll),
        extension.trim_start_matches('.')
    ))
}

/// Split a stored filename back into `(subject, roll_number)`.
///
/// The roll number is the part after the last `_`, so subjects may contain
/// underscores. Returns `None` for names that do not follow the scheme.
pub fn parse_filename(filename: &str) -> Option<(String, String)> {
    let stem = match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    };
    let (subject, roll) = stem.rsplit_once('_')?;
    let (subject, roll) = (subject.trim(), roll.trim());
    if subject.is_empty() || roll.is_empty() {
        return None;
    }
    Some((subject.to_string(), roll.to_string()))
}

fn flatten(part: &str) -> String {
    part.replace(['/', '\\'], "-")
}

/// Whether `name` is usable as-is inside the flat upload directory.
pub fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Encode bytes as `data:{mime};base64,...`.
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

/// Decode the payload of a base64 data URI.
///
/// A bare base64 string (no `data:` prefix) is accepted as well. Surrounding
/// whitespace is ignored.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let uri = uri.trim();
    let encoded = match uri.strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest
                .split_once(',')
                .ok_or_else(|| RollcallError::Decode("data URI has no ',' separator".into()))?;
            if !meta.ends_with(";base64") {
                return Err(RollcallError::Decode(format!(
                    "data URI is not base64 encoded ({})",
                    meta
                )));
            }
            data
        }
        None => uri,
    };
    BASE64
        .decode(encoded)
        .map_err(|e| RollcallError::Decode(format!("invalid base64: {}", e)))
}
