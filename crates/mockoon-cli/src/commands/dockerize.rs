use super::prompt::prompter;
use super::{json_pretty, CommandError, EXIT_SUCCESS};
use mockoon_core::{Engine, ResolveOptions};
use std::path::Path;

pub fn run(
    engine: &Engine,
    data: &str,
    options: &ResolveOptions,
    output: &Path,
    log_transaction: bool,
    json: bool,
) -> Result<u8, CommandError> {
    let prompter = prompter(None);
    let artifact = engine.dockerize(data, options, prompter.as_ref(), output, log_transaction)?;
    if json {
        println!("{}", json_pretty(&artifact)?);
        return Ok(EXIT_SUCCESS);
    }

    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    println!(
        "Dockerfile was generated and saved to {}",
        artifact.dockerfile.display()
    );
    println!();
    println!("Build and run the image with:");
    println!("  cd {}", dir.display());
    println!("  docker build -t {} .", artifact.name);
    println!(
        "  docker run -d -p {port}:{port} {}",
        artifact.name,
        port = artifact.port
    );
    Ok(EXIT_SUCCESS)
}
