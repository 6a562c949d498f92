//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod attendance;
pub mod health;
pub mod upload;

pub use crate::state::AppState;
pub use attendance::{download_attendance, get_attendance, AttendanceResponse, DownloadQuery};
pub use health::{health, ready, root, HealthResponse, ReadyResponse, StatusResponse};
pub use upload::upload_handler;
