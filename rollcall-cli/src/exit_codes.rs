//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts to tell "scan again" apart from "server down".

use rollcall_core::RollcallError;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (missing roll number, empty subject).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (malformed or expired code).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Service unavailable or upload rejected.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// I/O error (cannot read or write the state directory).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Try again later (submission already in flight).
/// Maps to EX_TEMPFAIL from sysexits.h.
pub const TEMP_FAILURE: i32 = 75;

/// Not authorized or session expired.
/// Maps to EX_NOPERM from sysexits.h.
pub const NO_PERMISSION: i32 = 77;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify by the first library error in the chain
        let code = err
            .chain()
            .find_map(|e| e.downcast_ref::<RollcallError>())
            .map(code_for)
            .unwrap_or_else(|| {
                if err.chain().any(|e| e.is::<std::io::Error>()) {
                    IO_ERROR
                } else {
                    GENERAL_ERROR
                }
            });

        Self {
            code,
            message: Some(message),
        }
    }
}

fn code_for(err: &RollcallError) -> i32 {
    match err {
        RollcallError::Validation(_) => USAGE_ERROR,
        RollcallError::MalformedCode(_)
        | RollcallError::ExpiredCode { .. }
        | RollcallError::Decode(_) => DATA_ERROR,
        RollcallError::Capture(_) => INPUT_ERROR,
        RollcallError::HttpError(_) | RollcallError::Rejected { .. } => NETWORK_ERROR,
        RollcallError::Storage(_) | RollcallError::Serialization(_) => IO_ERROR,
        RollcallError::InFlight => TEMP_FAILURE,
        RollcallError::NotAuthorized | RollcallError::SessionExpired { .. } => NO_PERMISSION,
        RollcallError::Runtime(_) => GENERAL_ERROR,
    }
}
