//! Persistent state for mockoon: the home directory layout, the process
//! registry, per-process working files and the CLI configuration file.
//!
//! Every file written here goes through [`write_atomic`] (temp file in the
//! same directory, fsync, rename, directory fsync), and read-modify-write
//! cycles are serialized across invocations with [`FileLock`].

pub mod config;
pub mod layout;
pub mod lock;
pub mod registry;
pub mod workfiles;

pub use config::{CliConfig, RemoteSection, SupervisorSection};
pub use layout::{HomeLayout, HOME_ENV_VAR};
pub use lock::FileLock;
pub use registry::{ProcessRegistry, RegistryEntry};
pub use workfiles::WorkingFiles;

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
pub fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

/// Replace `path` with `content` atomically.
///
/// The parent directory is created if needed. Readers observe either the old
/// or the new content, never a partial write.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(dir)?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
    #[error("invalid configuration in {path}: {reason}")]
    Config { path: String, reason: String },
}
