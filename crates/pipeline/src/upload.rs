//! Scoped temporary copy of an uploaded video

use crate::PipelineError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

const DEFAULT_EXTENSION: &str = "mp4";

/// Upload bytes written to a private temporary directory
///
/// The container demuxer needs a file path. The directory (and the file in
/// it) is removed when this value is dropped.
#[derive(Debug)]
pub struct UploadedVideo {
    dir: TempDir,
    path: PathBuf,
}

impl UploadedVideo {
    /// Write `bytes` to a fresh temporary file
    ///
    /// The extension of `file_name` is kept so the container probe can use it;
    /// uploads without a usable extension are saved as `.mp4`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Internal`] if the temporary file cannot be written.
    pub fn from_bytes(bytes: &[u8], file_name: Option<&str>) -> Result<Self, PipelineError> {
        let extension = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or(DEFAULT_EXTENSION)
            .to_ascii_lowercase();

        let dir = tempfile::Builder::new().prefix("astroguard-").tempdir()?;
        let path = dir.path().join(format!("upload.{extension}"));
        std::fs::write(&path, bytes)?;

        debug!("Wrote {} byte upload to {}", bytes.len(), path.display());
        Ok(Self { dir, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory removed on drop
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}
