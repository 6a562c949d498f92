//! Upload directory
//!
//! Selfies land in one flat directory under the name the client chose.
//! Each write goes to a temporary file in the same directory which is then
//! renamed over the target, so a reader never sees a half-written image and
//! two uploads with the same name leave exactly one of them behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Blocking task failed: {0}")]
    Task(String),
}

/// Flat upload directory
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory (and parents) if missing.
    pub fn ensure_exists(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.root).map_err(|source| StorageError::Io {
            path: self.root.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Whether the directory exists and is not read-only.
    pub fn is_writable(&self) -> bool {
        std::fs::metadata(&self.root)
            .map(|m| m.is_dir() && !m.permissions().readonly())
            .unwrap_or(false)
    }

    /// Write `bytes` under `filename`, replacing any existing file.
    ///
    /// `filename` must already be a plain single-component name.
    pub async fn store(&self, filename: &str, bytes: Vec<u8>) -> Result<PathBuf, StorageError> {
        let root = self.root.clone();
        let target = self.root.join(filename);

        tokio::task::spawn_blocking(move || write_replacing(&root, target, &bytes))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError {
    let path = path.to_path_buf();
    move |source| StorageError::Io { path, source }
}

fn write_replacing(root: &Path, target: PathBuf, bytes: &[u8]) -> Result<PathBuf, StorageError> {
    let mut tmp = NamedTempFile::new_in(root).map_err(io_err(root))?;
    tmp.write_all(bytes).map_err(io_err(tmp.path()))?;
    tmp.as_file().sync_all().map_err(io_err(tmp.path()))?;
    tmp.persist(&target).map_err(|e| io_err(&target)(e.error))?;

    tracing::debug!(path = %target.display(), bytes = bytes.len(), "Upload persisted");
    Ok(target)
}
