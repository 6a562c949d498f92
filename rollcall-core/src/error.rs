use thiserror::Error;

#[derive(Error, Debug)]
pub enum RollcallError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed code: {0}")]
    MalformedCode(String),

    #[error("Code expired: issued {age_ms} ms ago, threshold is {threshold_ms} ms. Please scan the current code")]
    ExpiredCode { age_ms: u64, threshold_ms: u64 },

    #[error("Not authorized: scan a code first")]
    NotAuthorized,

    #[error("Session expired: verified {age_ms} ms ago, ceiling is {ceiling_ms} ms. Please scan again")]
    SessionExpired { age_ms: u64, ceiling_ms: u64 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Invalid image payload: {0}")]
    Decode(String),

    #[error("Upload rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("A submission is already in flight")]
    InFlight,

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl RollcallError {
    /// Whether the error means the stored authorization is gone and the
    /// user has to go back to the entry page.
    pub fn requires_rescan(&self) -> bool {
        matches!(self, Self::NotAuthorized | Self::SessionExpired { .. })
    }
}

pub type Result<T> = std::result::Result<T, RollcallError>;
