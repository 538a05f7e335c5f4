pub mod completions;
pub mod dockerize;
pub mod info;
pub mod list;
pub mod logs;
pub mod prompt;
pub mod serve;
pub mod start;
pub mod stop;

use indicatif::{ProgressBar, ProgressStyle};
use mockoon_core::{CoreError, ErrorCategory};
use std::io::{stderr, stdin, IsTerminal};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_DATA_ERROR: u8 = 2;
pub const EXIT_CONFLICT: u8 = 3;

/// A failed command: the message printed after `error:` and the exit code.
#[derive(Debug)]
pub struct CommandError {
    pub code: u8,
    pub message: String,
}

impl From<CoreError> for CommandError {
    fn from(e: CoreError) -> Self {
        let code = match e.category() {
            ErrorCategory::Data => EXIT_DATA_ERROR,
            ErrorCategory::Conflict => EXIT_CONFLICT,
            ErrorCategory::Failure => EXIT_FAILURE,
        };
        Self {
            code,
            message: e.to_string(),
        }
    }
}

impl From<String> for CommandError {
    fn from(message: String) -> Self {
        Self {
            code: EXIT_FAILURE,
            message,
        }
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Whether prompts can be shown.
pub fn is_interactive() -> bool {
    stdin().is_terminal() && stderr().is_terminal()
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "online" => Style::new().green().apply_to(status).to_string(),
        "launching" => Style::new().cyan().apply_to(status).to_string(),
        "stopped" => Style::new().dim().apply_to(status).to_string(),
        "errored" => Style::new().red().bold().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: &str) -> CoreError {
        match kind {
            "port" => CoreError::PortInUse(3000),
            "name" => CoreError::NameInUse("mockoon-a".to_owned()),
            "index" => CoreError::EnvironmentNotFoundByIndex(3),
            "invalid" => CoreError::PortInvalid(70_000),
            _ => CoreError::StartFailed {
                name: "mockoon-a".to_owned(),
                error_log: "/tmp/a.log".to_owned(),
            },
        }
    }

    #[test]
    fn json_pretty_serializes_string() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn conflicts_exit_with_three() {
        assert_eq!(CommandError::from(sample("port")).code, EXIT_CONFLICT);
        assert_eq!(CommandError::from(sample("name")).code, EXIT_CONFLICT);
    }

    #[test]
    fn data_errors_exit_with_two() {
        assert_eq!(CommandError::from(sample("index")).code, EXIT_DATA_ERROR);
        assert_eq!(CommandError::from(sample("invalid")).code, EXIT_DATA_ERROR);
    }

    #[test]
    fn other_errors_exit_with_one() {
        let e = CommandError::from(sample("start"));
        assert_eq!(e.code, EXIT_FAILURE);
        assert!(e.message.starts_with("Cannot start mockoon-a"));
        assert_eq!(CommandError::from("boom".to_owned()).code, EXIT_FAILURE);
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_DATA_ERROR);
        assert_ne!(EXIT_DATA_ERROR, EXIT_CONFLICT);
    }

    #[test]
    fn colorize_status_keeps_text() {
        for status in ["online", "launching", "stopped", "errored"] {
            assert!(colorize_status(status).contains(status));
        }
        assert_eq!(colorize_status("unknown"), "unknown");
    }

    #[test]
    fn spinner_creates_progress_bar() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
    }

    #[test]
    fn spinner_fail_creates_progress_bar() {
        let pb = spinner("testing...");
        spin_fail(&pb, "failed");
    }
}
