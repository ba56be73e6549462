//! Upload staging for glyphdesk.
//!
//! Uploaded files are copied into a fixed directory under a generated,
//! collision-resistant name so the OCR tool can read them later. Files are
//! never removed.

pub mod error;

pub use error::StagingError;

use glyphdesk_core::UploadId;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Default staging directory.
pub const DEFAULT_STAGING_DIR: &str = "/tmp/upload/";

/// A file copied into the staging area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Identifier used as the file stem.
    pub id: UploadId,
    /// Full path of the staged copy.
    pub path: PathBuf,
    /// Number of bytes copied.
    pub size: u64,
}

/// Directory that receives uploads.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    /// Creates a staging area rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the staging directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copies `source` into the staging directory.
    ///
    /// The copy is named after a fresh [`UploadId`] and keeps the source's
    /// extension. The directory is created when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageFailure` if the directory cannot be created or the copy
    /// fails.
    #[instrument(skip_all, fields(source = %source.display(), dir = %self.dir.display()))]
    pub async fn store(&self, source: &Path) -> glyphdesk_core::Result<StagedFile, StagingError> {
        let failure = |reason: std::io::Error| StagingError::StorageFailure {
            path: source.display().to_string(),
            reason: reason.to_string(),
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(failure)?;

        let id = UploadId::new();
        let path = self.dir.join(staged_name(&id, source));
        let size = tokio::fs::copy(source, &path).await.map_err(failure)?;

        debug!(path = %path.display(), size, "staged upload");
        Ok(StagedFile { id, path, size })
    }
}

impl Default for StagingArea {
    fn default() -> Self {
        Self::new(DEFAULT_STAGING_DIR)
    }
}

fn staged_name(id: &UploadId, source: &Path) -> String {
    match source.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{ext}", id.ulid()),
        _ => id.ulid().to_string(),
    }
}
