use super::prompt::prompter;
use super::{json_pretty, spin_fail, spin_ok, spinner, CommandError, EXIT_SUCCESS};
use mockoon_core::{Engine, LaunchStrategy, ResolveOptions, StartedProcess};

pub struct StartRequest {
    pub data: String,
    pub options: ResolveOptions,
    pub all: bool,
    pub log_transaction: bool,
    /// Serve in this process (`--foreground` or `--container`).
    pub foreground: bool,
}

/// Confirmation for a foreground server, printed once it is listening.
pub fn announce(process: &StartedProcess) {
    println!("{}", process.confirmation());
}

pub fn run(engine: &Engine, request: &StartRequest, json: bool) -> Result<u8, CommandError> {
    if request.foreground {
        let prompter = prompter(None);
        let started = engine.start(
            &request.data,
            &request.options,
            prompter.as_ref(),
            LaunchStrategy::Foreground {
                log_transaction: request.log_transaction,
            },
        )?;
        tracing::info!("{} stopped", started.name);
        return Ok(EXIT_SUCCESS);
    }

    let pb = (!json).then(|| spinner(&format!("starting {}...", request.data)));
    let prompter = prompter(pb.as_ref());
    let result = if request.all {
        engine.start_all(
            &request.data,
            &request.options,
            prompter.as_ref(),
            request.log_transaction,
        )
    } else {
        engine
            .start(
                &request.data,
                &request.options,
                prompter.as_ref(),
                LaunchStrategy::Supervised {
                    log_transaction: request.log_transaction,
                },
            )
            .map(|started| vec![started])
    };

    let started = match result {
        Ok(started) => started,
        Err(e) => {
            if let Some(pb) = &pb {
                spin_fail(pb, "start failed");
            }
            return Err(e.into());
        }
    };

    if json {
        println!("{}", json_pretty(&started)?);
        return Ok(EXIT_SUCCESS);
    }
    if let Some(pb) = &pb {
        spin_ok(pb, &format!("{} started", started.len()));
    }
    for process in &started {
        println!("{}", process.confirmation());
    }
    Ok(EXIT_SUCCESS)
}
