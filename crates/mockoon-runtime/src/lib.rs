//! Execution layer for mockoon: process supervisors and the mock HTTP server.
//!
//! This crate implements the pluggable [`Supervisor`] trait with a real
//! [`LocalSupervisor`] (detached child processes, `/proc` liveness, bounded
//! restarts) and an in-memory [`MockSupervisor`] for tests, plus the
//! [`MockServer`] that serves one environment and the TCP port probe used
//! for pre-flight checks.

pub mod local;
pub mod mock;
pub mod probe;
pub mod procfs;
pub mod routes;
pub mod server;
pub mod supervisor;

pub use local::LocalSupervisor;
pub use mock::MockSupervisor;
pub use probe::{port_in_use, probe_host};
pub use server::{EventSink, MockServer, ServerErrorCode, ServerEvent, Transaction};
pub use supervisor::{
    ProcessInfo, ProcessStatus, ProcessTarget, ReadyCheck, RestartPolicy, StartSpec, Supervisor,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] mockoon_store::StoreError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("supervisor is not connected")]
    NotConnected,
    #[error("process name not found: {0}")]
    ProcessNotFound(String),
    #[error("a process named '{0}' is already running")]
    AlreadyRunning(String),
    #[error("invalid process target: {0}")]
    InvalidTarget(String),
    #[error("failed to spawn {name}: {reason}")]
    SpawnFailed { name: String, reason: String },
    #[error("failed to signal process {pid}: {reason}")]
    Signal { pid: u32, reason: String },
    #[error("supervisor error: {0}")]
    Supervisor(String),
    #[error("{code}: {message}")]
    Server {
        code: ServerErrorCode,
        message: String,
    },
}
