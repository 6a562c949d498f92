//! Attendance ledger
//!
//! Every stored selfie adds one row to a CSV file. Rows are only ever
//! appended; a student who uploads twice appears twice. The upload
//! directory keeps the latest image, the ledger keeps the history.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use utoipa::{IntoParams, ToSchema};

/// Status written for an accepted upload.
pub const STATUS_PRESENT: &str = "Present";

/// CSV header, in field order of [`AttendanceRecord`].
const HEADERS: [&str; 6] = ["Roll Number", "Subject", "Date", "Time", "Status", "Filename"];

/// Ledger errors
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV export failed: {0}")]
    Export(String),

    #[error("Blocking task failed: {0}")]
    Task(String),
}

/// One attendance row (UTC date and time)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    #[serde(rename = "Roll Number")]
    #[schema(example = "12")]
    pub roll_number: String,
    #[serde(rename = "Subject")]
    #[schema(example = "Math")]
    pub subject: String,
    #[serde(rename = "Date")]
    #[schema(example = "2024-01-15")]
    pub date: String,
    #[serde(rename = "Time")]
    #[schema(example = "09:30:05")]
    pub time: String,
    #[serde(rename = "Status")]
    #[schema(example = "Present")]
    pub status: String,
    /// Name the selfie was stored under
    #[serde(rename = "Filename")]
    #[schema(example = "Math_12.png")]
    pub filename: String,
}

impl AttendanceRecord {
    /// A `Present` row for an upload stored at `at`.
    pub fn present(
        subject: impl Into<String>,
        roll_number: impl Into<String>,
        filename: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            roll_number: roll_number.into(),
            subject: subject.into(),
            date: at.format("%Y-%m-%d").to_string(),
            time: at.format("%H:%M:%S").to_string(),
            status: STATUS_PRESENT.to_string(),
            filename: filename.into(),
        }
    }
}

/// Filters of `GET /get_attendance`; all optional, all exact matches.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    /// Day as `YYYY-MM-DD`
    pub date: Option<String>,
    /// Roll number
    pub roll: Option<String>,
    pub subject: Option<String>,
}

impl AttendanceQuery {
    pub fn for_date(date: impl Into<String>) -> Self {
        Self {
            date: Some(date.into()),
            ..Self::default()
        }
    }

    fn matches(&self, record: &AttendanceRecord) -> bool {
        fn field_matches(filter: &Option<String>, value: &str) -> bool {
            filter
                .as_deref()
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map_or(true, |f| f == value)
        }
        field_matches(&self.date, &record.date)
            && field_matches(&self.roll, &record.roll_number)
            && field_matches(&self.subject, &record.subject)
    }
}

/// Whether `date` is a `YYYY-MM-DD` calendar day.
pub fn is_valid_date(date: &str) -> bool {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
}

/// Append-only CSV ledger
#[derive(Debug)]
pub struct AttendanceLedger {
    path: PathBuf,
    // Serializes appends and keeps readers from seeing half a row
    lock: Mutex<()>,
}

impl AttendanceLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, creating the file (with header) if needed.
    pub async fn append(&self, record: AttendanceRecord) -> Result<(), LedgerError> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || append_row(&path, &record))
            .await
            .map_err(|e| LedgerError::Task(e.to_string()))?
    }

    /// Rows matching `query`, in the order they were recorded.
    pub async fn query(&self, query: &AttendanceQuery) -> Result<Vec<AttendanceRecord>, LedgerError> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        let records = tokio::task::spawn_blocking(move || read_all(&path))
            .await
            .map_err(|e| LedgerError::Task(e.to_string()))??;
        Ok(records.into_iter().filter(|r| query.matches(r)).collect())
    }
}

/// Render rows as CSV text, header included even when there are no rows.
pub fn to_csv(records: &[AttendanceRecord]) -> Result<String, LedgerError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(vec![]);
    wtr.write_record(HEADERS)?;
    for record in records {
        wtr.serialize(record)?;
    }

    let data = wtr
        .into_inner()
        .map_err(|e| LedgerError::Export(format!("CSV writer error: {}", e)))?;
    String::from_utf8(data).map_err(|e| LedgerError::Export(format!("UTF-8 conversion error: {}", e)))
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> LedgerError {
    let path = path.to_path_buf();
    move |source| LedgerError::Io { path, source }
}

fn append_row(path: &Path, record: &AttendanceRecord) -> Result<(), LedgerError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err(path))?;
    let is_new = file.metadata().map_err(io_err(path))?.len() == 0;

    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if is_new {
        wtr.write_record(HEADERS)?;
    }
    wtr.serialize(record)?;
    wtr.flush().map_err(io_err(path))?;

    tracing::debug!(
        path = %path.display(),
        roll = %record.roll_number,
        subject = %record.subject,
        "Attendance row appended"
    );
    Ok(())
}

fn read_all(path: &Path) -> Result<Vec<AttendanceRecord>, LedgerError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(path)(e)),
    };
    csv::Reader::from_reader(file)
        .deserialize()
        .collect::<Result<Vec<AttendanceRecord>, _>>()
        .map_err(LedgerError::from)
}
