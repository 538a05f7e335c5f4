use super::{CommandError, EXIT_SUCCESS};
use mockoon_core::Engine;
use mockoon_runtime::ProcessTarget;
use std::path::Path;

pub fn run(engine: &Engine, target: &str, lines: usize, errors_only: bool) -> Result<u8, CommandError> {
    let target: ProcessTarget = target.parse().unwrap_or_else(|e| match e {});
    let entry = engine.info(&target)?;
    let p = &entry.process;

    if !errors_only {
        print_tail(&p.out_log, lines)?;
    }
    print_tail(&p.error_log, lines)?;
    Ok(EXIT_SUCCESS)
}

fn print_tail(path: &Path, lines: usize) -> Result<(), CommandError> {
    println!("==> {} <==", path.display());
    match std::fs::read_to_string(path) {
        Ok(content) => {
            for line in tail(&content, lines) {
                println!("{line}");
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => println!("(empty)"),
        Err(e) => return Err(format!("failed to read {}: {e}", path.display()).into()),
    }
    Ok(())
}

fn tail(content: &str, lines: usize) -> Vec<&str> {
    let all: Vec<&str> = content.lines().collect();
    all[all.len().saturating_sub(lines)..].to_vec()
}
