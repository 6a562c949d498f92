//! Attendance ledger handlers
//!
//! Read access to the rows appended by `POST /upload`.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::ledger::{is_valid_date, to_csv, AttendanceQuery, AttendanceRecord};
use crate::state::AppState;

/// Attendance listing
#[derive(Serialize, ToSchema)]
pub struct AttendanceResponse {
    pub success: bool,
    /// Number of rows in `data`
    pub count: usize,
    pub data: Vec<AttendanceRecord>,
}

/// Query of `GET /download_attendance`
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadQuery {
    /// Day as `YYYY-MM-DD` (default: today, UTC)
    pub date: Option<String>,
}

fn check_date(date: Option<&str>) -> Result<(), ApiError> {
    match date.map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) if !is_valid_date(d) => Err(ApiError::bad_request(format!(
            "Invalid date: '{}'. Expected YYYY-MM-DD",
            d
        ))),
        _ => Ok(()),
    }
}

/// List attendance rows
///
/// All filters are optional and combine with AND.
#[utoipa::path(
    get,
    path = "/get_attendance",
    tag = "Attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Matching rows in recording order", body = AttendanceResponse),
        (status = 400, description = "Date is not YYYY-MM-DD", body = rollcall_core::UploadResponse),
        (status = 500, description = "Ledger could not be read", body = rollcall_core::UploadResponse)
    )
)]
pub async fn get_attendance(
    State(state): State<AppState>,
    Query(query): Query<AttendanceQuery>,
) -> Result<Json<AttendanceResponse>, ApiError> {
    check_date(query.date.as_deref())?;

    let data = state.ledger.query(&query).await?;
    tracing::debug!(rows = data.len(), ?query, "Attendance listed");

    Ok(Json(AttendanceResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

/// Download one day of attendance as CSV
///
/// Served as `attendance_{date}.csv`. A day without uploads yields the
/// header row only.
#[utoipa::path(
    get,
    path = "/download_attendance",
    tag = "Attendance",
    params(DownloadQuery),
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv", body = String),
        (status = 400, description = "Date is not YYYY-MM-DD", body = rollcall_core::UploadResponse),
        (status = 500, description = "Ledger could not be read", body = rollcall_core::UploadResponse)
    )
)]
pub async fn download_attendance(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    check_date(query.date.as_deref())?;
    let date = query
        .date
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| state.now().format("%Y-%m-%d").to_string());

    let records = state.ledger.query(&AttendanceQuery::for_date(&date)).await?;
    let csv = to_csv(&records)?;
    tracing::info!(date = %date, rows = records.len(), "Attendance exported");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"attendance_{}.csv\"", date),
            ),
        ],
        csv,
    )
        .into_response())
}
