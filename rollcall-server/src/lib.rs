//! Rollcall Server Library - upload receiver for attendance selfies
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod storage;
pub mod validation;

pub use config::Config;
pub use error::ApiError;
pub use ledger::{AttendanceLedger, AttendanceQuery, AttendanceRecord, LedgerError};
pub use openapi::ApiDoc;
pub use routes::{create_router, create_router_with_config, create_router_with_state};
pub use state::AppState;
pub use storage::{StorageError, UploadDir};
