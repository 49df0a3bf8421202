use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::domain::entities::calibration::CalibrationState;
use crate::domain::ports::store::{CalibrationStore, StoreError};

/// Calibration state kept as a small JSON document.
///
/// Writes go to a temporary file in the same directory which is fsynced and
/// then renamed over the target, so a crash leaves either the old or the new
/// record on disk, never a torn one.
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    /// `path` may start with `~`; it is expanded here.
    #[must_use]
    pub fn new(path: &str) -> Self {
        let expanded = shellexpand::tilde(path);
        Self {
            path: PathBuf::from(expanded.as_ref()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CalibrationStore for JsonStateStore {
    fn load(&self) -> Result<Option<CalibrationState>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::ReadFailed(format!(
                    "{}: {e}",
                    self.path.display()
                )));
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, state: &CalibrationState) -> Result<(), StoreError> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)
            .map_err(|e| StoreError::WriteFailed(format!("cannot create {}: {e}", parent.display())))?;

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| StoreError::WriteFailed(format!("serialization failed: {e}")))?;

        let mut tmp = NamedTempFile::new_in(parent)
            .map_err(|e| StoreError::WriteFailed(format!("cannot create temp file: {e}")))?;
        tmp.write_all(json.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| StoreError::WriteFailed(format!("cannot write temp file: {e}")))?;
        tmp.persist(&self.path).map_err(|e| {
            StoreError::WriteFailed(format!("cannot replace {}: {}", self.path.display(), e.error))
        })?;
        Ok(())
    }
}
