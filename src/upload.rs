use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::debug;
use tempfile::{Builder, NamedTempFile};

use crate::error::IngestError;

/// An uploaded file staged on disk for the duration of one request
///
/// The file is deleted when the value is dropped, so it disappears on the
/// success path and on every error path alike.
pub struct TempUpload {
    file: NamedTempFile,
    original_name: Option<String>,
}

impl TempUpload {
    /// Stage `bytes` in `dir` (created if missing)
    ///
    /// The file is created and written on the blocking pool so request
    /// handlers never block the runtime on disk I/O.
    ///
    /// # Arguments
    /// * `dir` - Upload staging directory
    /// * `original_name` - File name reported by the client, if any
    /// * `bytes` - File contents
    ///
    /// # Errors
    /// * `IngestError::Io` if the directory or file cannot be written
    pub async fn stage<B>(
        dir: impl AsRef<Path>,
        original_name: Option<&str>,
        bytes: B,
    ) -> Result<Self, IngestError>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        let dir = dir.as_ref().to_path_buf();
        let original_name = original_name.map(str::to_string);

        tokio::task::spawn_blocking(move || {
            Self::stage_blocking(&dir, original_name, bytes.as_ref())
        })
        .await
        .map_err(|e| IngestError::Io(io::Error::other(e)))?
    }

    fn stage_blocking(
        dir: &Path,
        original_name: Option<String>,
        bytes: &[u8],
    ) -> Result<Self, IngestError> {
        std::fs::create_dir_all(dir)?;

        let prefix = format!("{}-", Utc::now().timestamp_millis());
        let mut file = Builder::new()
            .prefix(&prefix)
            .suffix(".csv")
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;

        debug!("Staged upload at {}", file.path().display());

        Ok(Self {
            file,
            original_name,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Owned copy of the staging path, for checking cleanup after drop
    pub fn path_buf(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    pub fn original_name(&self) -> Option<&str> {
        self.original_name.as_deref()
    }

    /// Client file name without directories or extension
    pub fn display_stem(&self) -> Option<String> {
        let name = self.original_name.as_deref()?;
        let stem = Path::new(name).file_stem()?.to_str()?.trim();
        (!stem.is_empty()).then(|| stem.to_string())
    }
}
