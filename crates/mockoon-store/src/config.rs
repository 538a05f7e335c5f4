use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Optional `config.toml` in the home directory.
///
/// ```toml
/// [supervisor]
/// max_restarts = 1
/// min_uptime_ms = 10000
/// kill_timeout_ms = 2000
/// ready_timeout_ms = 5000
///
/// [remote]
/// timeout_secs = 10
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    #[serde(default)]
    pub supervisor: SupervisorSection,
    #[serde(default)]
    pub remote: RemoteSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SupervisorSection {
    pub max_restarts: u32,
    pub min_uptime_ms: u64,
    pub kill_timeout_ms: u64,
    pub ready_timeout_ms: u64,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            max_restarts: 1,
            min_uptime_ms: 10_000,
            kill_timeout_ms: 2_000,
            ready_timeout_ms: 5_000,
        }
    }
}

impl SupervisorSection {
    pub fn min_uptime(&self) -> Duration {
        Duration::from_millis(self.min_uptime_ms)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RemoteSection {
    pub timeout_secs: u64,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl CliConfig {
    /// Load the configuration; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&content).map_err(|e| StoreError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
