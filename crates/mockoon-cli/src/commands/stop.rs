use super::list::print_table;
use super::prompt::select;
use super::{is_interactive, json_pretty, CommandError, EXIT_FAILURE, EXIT_SUCCESS};
use mockoon_core::Engine;
use mockoon_runtime::ProcessTarget;

pub fn run(engine: &Engine, target: Option<&str>, json: bool) -> Result<u8, CommandError> {
    let target = match target {
        Some(t) => t
            .parse::<ProcessTarget>()
            .unwrap_or_else(|e| match e {}),
        None => match choose_target(engine)? {
            Some(t) => t,
            None => return Ok(EXIT_SUCCESS),
        },
    };

    let report = engine.stop(&target)?;
    let code = if report.failure.is_some() {
        EXIT_FAILURE
    } else {
        EXIT_SUCCESS
    };

    if json {
        println!("{}", json_pretty(&report)?);
        return Ok(code);
    }

    for process in &report.stopped {
        println!("Process {} ({}) stopped", process.id, process.name);
    }
    if let Some(missing) = &report.not_found {
        if target == ProcessTarget::All {
            println!("No process is running");
        } else {
            eprintln!("Process {missing} not found");
            if report.running.is_empty() {
                println!("No process is running");
            } else {
                print_table(&report.running);
            }
        }
    }
    if let Some(failure) = &report.failure {
        eprintln!("error: {failure}");
        print_table(&report.running);
    }
    Ok(code)
}

/// Ask which process to stop. `None` when there is nothing to stop.
fn choose_target(engine: &Engine) -> Result<Option<ProcessTarget>, CommandError> {
    let running = engine.list()?;
    if running.is_empty() {
        println!("No process is running");
        return Ok(None);
    }
    if !is_interactive() {
        return Err("a process id, name or \"all\" is required".to_owned().into());
    }

    let mut items: Vec<String> = running
        .iter()
        .map(|e| format!("{} ({})", e.process.name, e.process.id))
        .collect();
    items.push("all".to_owned());
    let Some(choice) = select("Select a process to stop", &items)? else {
        return Ok(None);
    };
    Ok(Some(match running.get(choice) {
        Some(entry) => ProcessTarget::Id(entry.process.id),
        None => ProcessTarget::All,
    }))
}
