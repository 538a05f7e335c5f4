use crate::CoreError;
use std::fmt;

/// Per-environment launch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Resolved,
    PortChecked,
    NameChecked,
    Launching,
    Running,
    Errored,
    Stopping,
    Stopped,
}

impl fmt::Display for LaunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Resolved => "resolved",
            Self::PortChecked => "port-checked",
            Self::NameChecked => "name-checked",
            Self::Launching => "launching",
            Self::Running => "running",
            Self::Errored => "errored",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

pub fn validate_transition(from: LaunchState, to: LaunchState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (LaunchState::Resolved, LaunchState::PortChecked)
            | (LaunchState::PortChecked, LaunchState::NameChecked)
            | (LaunchState::NameChecked, LaunchState::Launching)
            | (
                LaunchState::Launching,
                LaunchState::Running | LaunchState::Errored
            )
            | (LaunchState::Running, LaunchState::Stopping)
            | (LaunchState::Stopping, LaunchState::Stopped)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Tracks one environment through the launch states.
#[derive(Debug)]
pub(crate) struct Launch {
    name: String,
    state: LaunchState,
}

impl Launch {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            state: LaunchState::Resolved,
        }
    }

    /// Tracker for a process that is already running.
    pub(crate) fn running(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            state: LaunchState::Running,
        }
    }

    pub(crate) fn advance(&mut self, to: LaunchState) -> Result<(), CoreError> {
        validate_transition(self.state, to)?;
        tracing::debug!("{}: {} -> {}", self.name, self.state, to);
        self.state = to;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> LaunchState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        assert!(validate_transition(LaunchState::Resolved, LaunchState::PortChecked).is_ok());
        assert!(validate_transition(LaunchState::PortChecked, LaunchState::NameChecked).is_ok());
        assert!(validate_transition(LaunchState::NameChecked, LaunchState::Launching).is_ok());
        assert!(validate_transition(LaunchState::Launching, LaunchState::Running).is_ok());
        assert!(validate_transition(LaunchState::Launching, LaunchState::Errored).is_ok());
        assert!(validate_transition(LaunchState::Running, LaunchState::Stopping).is_ok());
        assert!(validate_transition(LaunchState::Stopping, LaunchState::Stopped).is_ok());
    }

    #[test]
    fn invalid_transitions() {
        assert!(validate_transition(LaunchState::Resolved, LaunchState::Launching).is_err());
        assert!(validate_transition(LaunchState::PortChecked, LaunchState::Launching).is_err());
        assert!(validate_transition(LaunchState::Errored, LaunchState::Running).is_err());
        assert!(validate_transition(LaunchState::Stopped, LaunchState::Running).is_err());
        assert!(validate_transition(LaunchState::Running, LaunchState::Launching).is_err());
    }

    #[test]
    fn launch_follows_the_happy_path() {
        let mut launch = Launch::new("mockoon-a");
        launch.advance(LaunchState::PortChecked).unwrap();
        launch.advance(LaunchState::NameChecked).unwrap();
        launch.advance(LaunchState::Launching).unwrap();
        launch.advance(LaunchState::Running).unwrap();
        assert_eq!(launch.state(), LaunchState::Running);
        let err = launch.advance(LaunchState::Launching).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid state transition: running -> launching"
        );
    }

    #[test]
    fn running_tracker_stops() {
        let mut launch = Launch::running("mockoon-a");
        launch.advance(LaunchState::Stopping).unwrap();
        launch.advance(LaunchState::Stopped).unwrap();
        assert_eq!(launch.state(), LaunchState::Stopped);
    }
}
