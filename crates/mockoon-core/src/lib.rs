//! Core orchestration for mockoon mock-API processes.
//!
//! This crate ties together data loading, schema migration, the process
//! registry and the supervisor into the [`Engine`]: the central API for
//! starting, stopping, listing and inspecting mock processes, and for
//! producing container artifacts. It also provides the launch state machine
//! and the shutdown flag used by foreground servers.

pub mod concurrency;
pub mod dockerfile;
pub mod engine;
pub mod events;
pub mod lifecycle;
pub mod loader;
pub mod resolver;

pub use concurrency::{install_signal_handler, shutdown_requested};
pub use dockerfile::{render_dockerfile, DockerfileParams};
pub use engine::{
    serve, DockerArtifact, Engine, LaunchStrategy, ProcessEntry, StartedProcess, StopReport,
};
pub use events::LogSink;
pub use lifecycle::{validate_transition, LaunchState};
pub use loader::{load, LoadedData};
pub use resolver::{
    prepare, resolve, NonInteractive, PreparedEnvironment, Prompter, ResolveOptions,
    ResolvedEnvironment,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Data(#[from] mockoon_schema::DataError),
    #[error(transparent)]
    Remote(#[from] mockoon_remote::RemoteError),
    #[error(transparent)]
    Migration(#[from] mockoon_schema::MigrationError),
    #[error(transparent)]
    Validation(#[from] mockoon_schema::ValidationError),
    #[error("store error: {0}")]
    Store(#[from] mockoon_store::StoreError),
    #[error(transparent)]
    Runtime(#[from] mockoon_runtime::RuntimeError),
    #[error("Environment not found at index \"{0}\"")]
    EnvironmentNotFoundByIndex(usize),
    #[error("Environment with name \"{0}\" cannot be found")]
    EnvironmentNotFoundByName(String),
    #[error("{count} environments found in data file, select one with --index or --name (or use --all)")]
    MissingSelector { count: usize },
    #[error("Port \"{0}\" is invalid")]
    PortInvalid(i64),
    #[error("Port \"{0}\" is already in use")]
    PortInUse(u16),
    #[error("A process with the name \"{0}\" is already running")]
    NameInUse(String),
    #[error("Cannot start {name} due to errors (see errors in {error_log})")]
    StartFailed { name: String, error_log: String },
    #[error("{source} ({started} of {total} environments were started and keep running)")]
    BatchAborted {
        started: usize,
        total: usize,
        source: Box<CoreError>,
    },
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification used to pick a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Unreadable, malformed or unsupported data and bad selectors.
    Data,
    /// Port or name already taken.
    Conflict,
    Failure,
}

impl CoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Data(_)
            | Self::Migration(_)
            | Self::Validation(_)
            | Self::EnvironmentNotFoundByIndex(_)
            | Self::EnvironmentNotFoundByName(_)
            | Self::MissingSelector { .. }
            | Self::PortInvalid(_) => ErrorCategory::Data,
            Self::PortInUse(_) | Self::NameInUse(_) => ErrorCategory::Conflict,
            Self::BatchAborted { source, .. } => source.category(),
            _ => ErrorCategory::Failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(
            CoreError::PortInUse(3000).category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            CoreError::Data(mockoon_schema::DataError::NoEnvironments).category(),
            ErrorCategory::Data
        );
        assert_eq!(
            CoreError::StartFailed {
                name: "mockoon-x".to_owned(),
                error_log: "/tmp/x".to_owned()
            }
            .category(),
            ErrorCategory::Failure
        );
    }

    #[test]
    fn batch_abort_keeps_source_category_and_counts() {
        let e = CoreError::BatchAborted {
            started: 1,
            total: 3,
            source: Box::new(CoreError::NameInUse("mockoon-b".to_owned())),
        };
        assert_eq!(e.category(), ErrorCategory::Conflict);
        let msg = e.to_string();
        assert!(msg.starts_with("A process with the name \"mockoon-b\" is already running"));
        assert!(msg.contains("1 of 3"));
    }

    #[test]
    fn messages_name_the_selector() {
        assert_eq!(
            CoreError::EnvironmentNotFoundByIndex(4).to_string(),
            "Environment not found at index \"4\""
        );
        assert_eq!(
            CoreError::EnvironmentNotFoundByName("Shop".to_owned()).to_string(),
            "Environment with name \"Shop\" cannot be found"
        );
    }
}
