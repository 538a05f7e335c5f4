use super::{colorize_status, json_pretty, CommandError, EXIT_SUCCESS};
use indicatif::HumanBytes;
use mockoon_core::Engine;
use mockoon_runtime::ProcessTarget;

pub fn run(engine: &Engine, target: &str, json: bool) -> Result<u8, CommandError> {
    let target: ProcessTarget = target.parse().unwrap_or_else(|e| match e {});
    let entry = engine.info(&target)?;
    if json {
        println!("{}", json_pretty(&entry)?);
        return Ok(EXIT_SUCCESS);
    }

    let p = &entry.process;
    let dash = || "-".to_owned();
    println!("name:            {}", p.name);
    println!("id:              {}", p.id);
    println!("status:          {}", colorize_status(&p.status.to_string()));
    println!(
        "pid:             {}",
        p.pid.map_or_else(dash, |pid| pid.to_string())
    );
    println!(
        "hostname:        {}",
        entry.hostname.clone().unwrap_or_else(dash)
    );
    println!(
        "port:            {}",
        entry.port.map_or_else(dash, |port| port.to_string())
    );
    println!(
        "endpoint prefix: {}",
        entry.endpoint_prefix.clone().unwrap_or_else(dash)
    );
    println!("cpu:             {:.1}%", p.cpu);
    println!("memory:          {}", HumanBytes(p.memory));
    println!("restarts:        {}", p.restarts);
    println!(
        "started at:      {}",
        p.started_at.map_or_else(dash, |t| t.to_rfc3339())
    );
    println!("out log:         {}", p.out_log.display());
    println!("error log:       {}", p.error_log.display());
    Ok(EXIT_SUCCESS)
}
