use crate::{write_atomic, StoreError};
use mockoon_schema::ProcessName;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Per-process working files: the fully resolved definition a mock server
/// reads at launch, stored as `<dir>/<name>.json`.
pub struct WorkingFiles {
    dir: PathBuf,
}

impl WorkingFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write one working file atomically and return its absolute path.
    pub fn write(&self, name: &ProcessName, content: &str) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir)?;
        let dir = fs::canonicalize(&self.dir)?;
        let path = dir.join(name.working_file_name());
        write_atomic(&path, content.as_bytes())?;
        debug!("wrote working file {}", path.display());
        Ok(path)
    }

    /// Delete every `*.json` file whose stem is not a live process name.
    /// Returns the deleted paths.
    pub fn sweep(&self, live: &[ProcessName]) -> Result<Vec<PathBuf>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut removed = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if live.iter().any(|name| name == stem) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed.push(path),
                Err(e) => warn!("failed to remove working file {}: {e}", path.display()),
            }
        }
        removed.sort();
        Ok(removed)
    }
}
