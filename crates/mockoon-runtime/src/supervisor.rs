use crate::RuntimeError;
use chrono::{DateTime, Utc};
use mockoon_schema::ProcessName;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Launching,
    Online,
    Stopped,
    Errored,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStatus::Launching => write!(f, "launching"),
            ProcessStatus::Online => write!(f, "online"),
            ProcessStatus::Stopped => write!(f, "stopped"),
            ProcessStatus::Errored => write!(f, "errored"),
        }
    }
}

/// Selects processes for `delete` and `describe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessTarget {
    All,
    Id(u32),
    Name(String),
}

impl ProcessTarget {
    pub fn matches(&self, id: u32, name: &str) -> bool {
        match self {
            ProcessTarget::All => true,
            ProcessTarget::Id(target) => *target == id,
            ProcessTarget::Name(target) => target == name,
        }
    }
}

impl FromStr for ProcessTarget {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            Ok(ProcessTarget::All)
        } else if let Ok(id) = s.parse::<u32>() {
            Ok(ProcessTarget::Id(id))
        } else {
            Ok(ProcessTarget::Name(s.to_owned()))
        }
    }
}

impl fmt::Display for ProcessTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessTarget::All => write!(f, "all"),
            ProcessTarget::Id(id) => write!(f, "{id}"),
            ProcessTarget::Name(name) => f.write_str(name),
        }
    }
}

/// Supervisor view of one process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessInfo {
    /// Supervisor-assigned id, stable for the life of the process entry.
    pub id: u32,
    pub name: ProcessName,
    /// Operating-system pid, when running.
    pub pid: Option<u32>,
    pub status: ProcessStatus,
    /// CPU usage in percent of one core, averaged over the process lifetime.
    pub cpu: f32,
    /// Resident memory in bytes.
    pub memory: u64,
    pub restarts: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub out_log: PathBuf,
    pub error_log: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestartPolicy {
    pub max_restarts: u32,
    /// A process that exits sooner than this counts as an unstable restart.
    pub min_uptime: Duration,
    /// Time between SIGTERM and SIGKILL on stop.
    pub kill_timeout: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 1,
            min_uptime: Duration::from_secs(10),
            kill_timeout: Duration::from_secs(2),
        }
    }
}

/// TCP readiness probe performed after spawn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadyCheck {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartSpec {
    pub name: ProcessName,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub out_log: PathBuf,
    pub error_log: PathBuf,
    pub restart: RestartPolicy,
    pub ready: Option<ReadyCheck>,
}

/// External process supervisor.
///
/// Calls other than `connect` require a prior successful `connect`.
pub trait Supervisor: Send + Sync {
    fn name(&self) -> &str;

    fn connect(&self) -> Result<(), RuntimeError>;

    fn disconnect(&self);

    fn list(&self) -> Result<Vec<ProcessInfo>, RuntimeError>;

    /// Launch a process. Returns its state after the readiness wait; an
    /// `Errored` status is a normal return, not an `Err`.
    fn start(&self, spec: &StartSpec) -> Result<ProcessInfo, RuntimeError>;

    /// Stop and forget the matching processes. No match is
    /// [`RuntimeError::ProcessNotFound`].
    fn delete(&self, target: &ProcessTarget) -> Result<Vec<ProcessInfo>, RuntimeError>;

    fn describe(&self, target: &ProcessTarget) -> Result<ProcessInfo, RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_parsing() {
        assert_eq!("all".parse::<ProcessTarget>().unwrap(), ProcessTarget::All);
        assert_eq!("3".parse::<ProcessTarget>().unwrap(), ProcessTarget::Id(3));
        assert_eq!(
            "mockoon-api".parse::<ProcessTarget>().unwrap(),
            ProcessTarget::Name("mockoon-api".to_owned())
        );
    }

    #[test]
    fn target_matching() {
        assert!(ProcessTarget::All.matches(1, "x"));
        assert!(ProcessTarget::Id(1).matches(1, "x"));
        assert!(!ProcessTarget::Id(2).matches(1, "x"));
        assert!(ProcessTarget::Name("x".to_owned()).matches(9, "x"));
    }

    #[test]
    fn status_display() {
        assert_eq!(ProcessStatus::Online.to_string(), "online");
        assert_eq!(ProcessStatus::Errored.to_string(), "errored");
    }
}
