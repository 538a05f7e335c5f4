use super::is_interactive;
use dialoguer::{Confirm, Select};
use indicatif::ProgressBar;
use mockoon_core::{NonInteractive, Prompter};
use tracing::warn;

/// Prompts on the terminal, hiding a running spinner while asking.
pub struct TerminalPrompter {
    progress: Option<ProgressBar>,
}

impl TerminalPrompter {
    fn ask<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.progress {
            Some(pb) => pb.suspend(f),
            None => f(),
        }
    }
}

impl Prompter for TerminalPrompter {
    fn confirm_repair(&self, environment_name: &str) -> bool {
        self.ask(|| {
            Confirm::new()
                .with_prompt(format!(
                    "Environment '{environment_name}' has no schema version. Migrate it to the current format?"
                ))
                .default(false)
                .interact()
        })
        .unwrap_or_else(|e| {
            warn!("prompt failed: {e}");
            false
        })
    }

    fn select_environment(&self, names: &[String]) -> Option<usize> {
        self.ask(|| {
            Select::new()
                .with_prompt("Select an environment")
                .items(names)
                .default(0)
                .interact_opt()
        })
        .unwrap_or_else(|e| {
            warn!("prompt failed: {e}");
            None
        })
    }
}

/// Terminal prompter when both stdin and stderr are terminals.
pub fn prompter(progress: Option<&ProgressBar>) -> Box<dyn Prompter> {
    if is_interactive() {
        Box::new(TerminalPrompter {
            progress: progress.cloned(),
        })
    } else {
        Box::new(NonInteractive)
    }
}

/// Pick one of `items`; `None` when the user aborts.
pub fn select(prompt: &str, items: &[String]) -> Result<Option<usize>, String> {
    Select::new()
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact_opt()
        .map_err(|e| format!("prompt failed: {e}"))
}
