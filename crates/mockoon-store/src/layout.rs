use crate::StoreError;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the home directory.
pub const HOME_ENV_VAR: &str = "MOCKOON_CLI_HOME";
const DEFAULT_DIR_NAME: &str = ".mockoon-cli";

/// Directory layout of the mockoon home.
///
/// ```text
/// <root>/processes.json     registry
/// <root>/config.toml        CLI configuration
/// <root>/data/<name>.json   working files
/// <root>/logs/<name>-out.log, <name>-error.log
/// <root>/supervisor/        supervisor process table
/// ```
///
/// Subdirectories are created lazily on [`initialize`](Self::initialize).
#[derive(Debug, Clone)]
pub struct HomeLayout {
    root: PathBuf,
}

impl HomeLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$MOCKOON_CLI_HOME`, else `$HOME/.mockoon-cli`.
    pub fn default_root() -> Result<PathBuf, StoreError> {
        if let Some(dir) = std::env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        let home = std::env::var_os("HOME").ok_or_else(|| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("HOME not set; pass --home or set {HOME_ENV_VAR}"),
            ))
        })?;
        Ok(PathBuf::from(home).join(DEFAULT_DIR_NAME))
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn registry_file(&self) -> PathBuf {
        self.root.join("processes.json")
    }

    #[inline]
    pub fn registry_lock_file(&self) -> PathBuf {
        self.root.join(".processes.lock")
    }

    #[inline]
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    #[inline]
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    #[inline]
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    #[inline]
    pub fn supervisor_dir(&self) -> PathBuf {
        self.root.join("supervisor")
    }

    pub fn out_log(&self, name: &str) -> PathBuf {
        self.logs_dir().join(format!("{name}-out.log"))
    }

    pub fn error_log(&self, name: &str) -> PathBuf {
        self.logs_dir().join(format!("{name}-error.log"))
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.data_dir())?;
        fs::create_dir_all(self.logs_dir())?;
        fs::create_dir_all(self.supervisor_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_correct() {
        let layout = HomeLayout::new("/tmp/mockoon-test");
        assert_eq!(
            layout.registry_file(),
            PathBuf::from("/tmp/mockoon-test/processes.json")
        );
        assert_eq!(
            layout.data_dir(),
            PathBuf::from("/tmp/mockoon-test/data")
        );
        assert_eq!(
            layout.error_log("mockoon-api"),
            PathBuf::from("/tmp/mockoon-test/logs/mockoon-api-error.log")
        );
        assert_eq!(
            layout.out_log("mockoon-api"),
            PathBuf::from("/tmp/mockoon-test/logs/mockoon-api-out.log")
        );
    }

    #[test]
    fn initialize_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = HomeLayout::new(dir.path().join("home"));
        layout.initialize().unwrap();
        assert!(layout.data_dir().is_dir());
        assert!(layout.logs_dir().is_dir());
        assert!(layout.supervisor_dir().is_dir());
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = HomeLayout::new(dir.path());
        layout.initialize().unwrap();
        layout.initialize().unwrap();
    }
}
