use super::{colorize_status, json_pretty, CommandError, EXIT_SUCCESS};
use indicatif::HumanBytes;
use mockoon_core::{Engine, ProcessEntry};

pub fn run(engine: &Engine, json: bool) -> Result<u8, CommandError> {
    let processes = engine.list()?;
    if json {
        println!("{}", json_pretty(&processes)?);
    } else if processes.is_empty() {
        println!("No process is running");
    } else {
        print_table(&processes);
    }
    Ok(EXIT_SUCCESS)
}

pub fn print_table(processes: &[ProcessEntry]) {
    println!(
        "{:<24} {:<4} {:<10} {:<6} {:<10} {:<16} PORT",
        "NAME", "ID", "STATUS", "CPU", "MEMORY", "HOSTNAME"
    );
    for entry in processes {
        let p = &entry.process;
        println!(
            "{:<24} {:<4} {} {:<6} {:<10} {:<16} {}",
            p.name.as_str(),
            p.id,
            pad_colored(&p.status.to_string(), 10),
            format!("{:.1}%", p.cpu),
            HumanBytes(p.memory).to_string(),
            entry.hostname.as_deref().unwrap_or("-"),
            entry.port.map_or_else(|| "-".to_owned(), |port| port.to_string()),
        );
    }
}

/// Pad outside the colour codes so they do not skew the column.
fn pad_colored(status: &str, width: usize) -> String {
    let padding = width.saturating_sub(status.len());
    format!("{}{}", colorize_status(status), " ".repeat(padding))
}
