use crate::CoreError;
use mockoon_schema::{migrate, validate, Environment, ProcessName, RawEnvironment};
use mockoon_store::WorkingFiles;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// User choices applied while resolving one environment.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Position in the data file. Takes precedence over `name`.
    pub index: Option<usize>,
    pub name: Option<String>,
    pub port: Option<i64>,
    pub hostname: Option<String>,
    pub endpoint_prefix: Option<String>,
    /// Process name overriding the environment name.
    pub pname: Option<String>,
    /// Migrate definitions without a schema marker without asking.
    pub repair: bool,
    /// Write the working file here instead of the data directory.
    pub artifact_dir: Option<PathBuf>,
}

/// Decisions that need a human when one is available.
pub trait Prompter {
    /// Consent to migrate a definition that has no schema marker.
    fn confirm_repair(&self, environment_name: &str) -> bool;

    /// Pick one of several environments. `None` when no choice can be made.
    fn select_environment(&self, names: &[String]) -> Option<usize>;
}

/// Prompter that never asks and never consents.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

impl Prompter for NonInteractive {
    fn confirm_repair(&self, _environment_name: &str) -> bool {
        false
    }

    fn select_environment(&self, _names: &[String]) -> Option<usize> {
        None
    }
}

impl ResolveOptions {
    /// Directory the working file goes to: the artifact directory when one
    /// is set, `data_dir` otherwise.
    pub fn working_dir<'a>(&'a self, data_dir: &'a Path) -> &'a Path {
        self.artifact_dir.as_deref().unwrap_or(data_dir)
    }
}

/// A selected, migrated and overridden environment. Nothing is on disk yet.
#[derive(Debug, Clone)]
pub struct ResolvedEnvironment {
    pub name: ProcessName,
    pub protocol: &'static str,
    pub hostname: String,
    pub port: i64,
    pub endpoint_prefix: String,
    pub environment: Environment,
}

impl ResolvedEnvironment {
    /// Write the working file into `dir`, replacing any file of the same
    /// name.
    pub fn persist(self, dir: &Path) -> Result<PreparedEnvironment, CoreError> {
        let working_file =
            WorkingFiles::new(dir).write(&self.name, &self.environment.to_pretty_json()?)?;
        debug!("working file for {}: {}", self.name, working_file.display());
        Ok(PreparedEnvironment {
            name: self.name,
            protocol: self.protocol,
            hostname: self.hostname,
            port: self.port,
            endpoint_prefix: self.endpoint_prefix,
            working_file,
            environment: self.environment,
        })
    }
}

/// An environment ready to launch, with its working file on disk.
#[derive(Debug, Clone)]
pub struct PreparedEnvironment {
    pub name: ProcessName,
    pub protocol: &'static str,
    pub hostname: String,
    pub port: i64,
    pub endpoint_prefix: String,
    /// Absolute path of the working file.
    pub working_file: PathBuf,
    pub environment: Environment,
}

/// Select, migrate, validate and override one environment, then write its
/// working file into `data_dir` (or `options.artifact_dir`).
pub fn resolve(
    environments: &[RawEnvironment],
    options: &ResolveOptions,
    prompter: &dyn Prompter,
    data_dir: &Path,
) -> Result<PreparedEnvironment, CoreError> {
    prepare(environments, options, prompter)?.persist(options.working_dir(data_dir))
}

/// Everything [`resolve`] does except writing the working file.
pub fn prepare(
    environments: &[RawEnvironment],
    options: &ResolveOptions,
    prompter: &dyn Prompter,
) -> Result<ResolvedEnvironment, CoreError> {
    let mut raw = select(environments, options, prompter)?.clone();

    if raw.schema_version().is_none() {
        let label = raw.name().unwrap_or("<unnamed>").to_owned();
        if options.repair || prompter.confirm_repair(&label) {
            info!("repairing environment '{label}' without schema version");
            raw.set_schema_version(0);
        }
    }

    let migrated = migrate(raw)?;
    let mut environment = validate(migrated)?;

    let name = ProcessName::canonical(options.pname.as_deref().unwrap_or(&environment.name));
    environment.name = name.to_string();
    if let Some(port) = options.port {
        environment.port = port;
    }
    if let Some(hostname) = &options.hostname {
        environment.hostname.clone_from(hostname);
    }
    if let Some(prefix) = &options.endpoint_prefix {
        environment.endpoint_prefix.clone_from(prefix);
    }

    Ok(ResolvedEnvironment {
        protocol: environment.protocol(),
        hostname: environment.hostname.clone(),
        port: environment.port,
        endpoint_prefix: environment.endpoint_prefix.clone(),
        name,
        environment,
    })
}

fn select<'a>(
    environments: &'a [RawEnvironment],
    options: &ResolveOptions,
    prompter: &dyn Prompter,
) -> Result<&'a RawEnvironment, CoreError> {
    if let Some(index) = options.index {
        return environments
            .get(index)
            .ok_or(CoreError::EnvironmentNotFoundByIndex(index));
    }
    if let Some(name) = &options.name {
        return environments
            .iter()
            .find(|e| e.name() == Some(name.as_str()))
            .ok_or_else(|| CoreError::EnvironmentNotFoundByName(name.clone()));
    }
    match environments {
        [] => Err(mockoon_schema::DataError::NoEnvironments.into()),
        [only] => Ok(only),
        many => {
            let names: Vec<String> = many
                .iter()
                .enumerate()
                .map(|(i, e)| e.name().map_or_else(|| format!("#{i}"), str::to_owned))
                .collect();
            prompter
                .select_environment(&names)
                .and_then(|i| many.get(i))
                .ok_or(CoreError::MissingSelector { count: many.len() })
        }
    }
}
