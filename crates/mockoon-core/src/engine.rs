use crate::concurrency::shutdown_requested;
use crate::dockerfile::{render_dockerfile, DockerfileParams};
use crate::events::LogSink;
use crate::lifecycle::{Launch, LaunchState};
use crate::loader::{load, LoadedData};
use crate::resolver::{prepare, PreparedEnvironment, Prompter, ResolveOptions, ResolvedEnvironment};
use crate::CoreError;
use mockoon_remote::RemoteConfig;
use mockoon_runtime::{
    port_in_use, probe_host, LocalSupervisor, MockServer, ProcessInfo, ProcessStatus,
    ProcessTarget, ReadyCheck, RestartPolicy, RuntimeError, StartSpec, Supervisor,
};
use mockoon_schema::{
    migrate, parse_data_file, validate, DataError, ProcessName, DEFAULT_HOSTNAME,
};
use mockoon_store::{
    write_atomic, CliConfig, HomeLayout, ProcessRegistry, RegistryEntry, WorkingFiles,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How a resolved environment is run once pre-flight checks pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStrategy {
    /// Hand the process to the supervisor and record it in the registry.
    Supervised { log_transaction: bool },
    /// Serve in this process until a shutdown signal arrives.
    Foreground { log_transaction: bool },
}

/// A launched environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedProcess {
    pub name: ProcessName,
    /// Supervisor id; `None` for foreground runs.
    pub id: Option<u32>,
    pub protocol: &'static str,
    pub hostname: String,
    pub port: u16,
    pub endpoint_prefix: String,
}

impl StartedProcess {
    /// Reachable URL; the wildcard bind address is shown as `localhost`.
    pub fn url(&self) -> String {
        let host = if self.hostname == DEFAULT_HOSTNAME {
            "localhost"
        } else {
            self.hostname.as_str()
        };
        format!("{}://{host}:{}", self.protocol, self.port)
    }

    pub fn confirmation(&self) -> String {
        match self.id {
            Some(id) => format!(
                "Mock started at {} (pid: {id}, name: {})",
                self.url(),
                self.name
            ),
            None => format!("Mock started at {} (name: {})", self.url(), self.name),
        }
    }
}

/// Live process joined with its registry fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEntry {
    #[serde(flatten)]
    pub process: ProcessInfo,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub endpoint_prefix: Option<String>,
}

/// Outcome of a stop request. Not-found and deletion failures are reported
/// here rather than as errors so the listing and cleanup still happen.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopReport {
    pub stopped: Vec<ProcessInfo>,
    /// The target that matched nothing.
    pub not_found: Option<String>,
    pub failure: Option<String>,
    /// Working files removed by the sweep.
    pub swept: Vec<PathBuf>,
    /// Processes still running afterwards.
    pub running: Vec<ProcessEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerArtifact {
    pub dockerfile: PathBuf,
    pub data_file: PathBuf,
    pub name: ProcessName,
    pub port: u16,
}

/// Keeps the supervisor connected for the lifetime of one operation.
struct Session<'a>(&'a dyn Supervisor);

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.0.disconnect();
    }
}

/// Lifecycle orchestrator for mock processes.
///
/// Every operation connects to the supervisor for its own duration and
/// disconnects afterwards, so concurrent invocations are serialized by the
/// supervisor while each registry write stays individually atomic.
pub struct Engine {
    layout: HomeLayout,
    registry: ProcessRegistry,
    supervisor: Box<dyn Supervisor>,
    config: CliConfig,
    program: PathBuf,
    should_stop: fn() -> bool,
    on_started: fn(&StartedProcess),
}

impl Engine {
    pub fn new(layout: HomeLayout, supervisor: Box<dyn Supervisor>, config: CliConfig) -> Self {
        let registry = ProcessRegistry::new(&layout);
        let program = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("mockoon"));
        Self {
            layout,
            registry,
            supervisor,
            config,
            program,
            should_stop: shutdown_requested,
            on_started: |_| {},
        }
    }

    /// Engine over the home directory at `root` with the local supervisor
    /// and the configuration file found there.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let layout = HomeLayout::new(root);
        layout.initialize()?;
        let config = CliConfig::load(&layout.config_file())?;
        let supervisor = LocalSupervisor::new(layout.supervisor_dir());
        debug!("home directory {}", layout.root().display());
        Ok(Self::new(layout, Box::new(supervisor), config))
    }

    /// Program launched for supervised processes. Defaults to the current
    /// executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Shutdown check polled by foreground servers.
    #[must_use]
    pub fn with_stop_signal(mut self, should_stop: fn() -> bool) -> Self {
        self.should_stop = should_stop;
        self
    }

    /// Called once a foreground server is listening.
    #[must_use]
    pub fn on_foreground_start(mut self, hook: fn(&StartedProcess)) -> Self {
        self.on_started = hook;
        self
    }

    pub fn layout(&self) -> &HomeLayout {
        &self.layout
    }

    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    pub fn load(&self, source: &str) -> Result<LoadedData, CoreError> {
        load(
            source,
            &RemoteConfig::with_timeout_secs(self.config.remote.timeout_secs),
        )
    }

    /// Resolve and launch one environment from `source`.
    pub fn start(
        &self,
        source: &str,
        options: &ResolveOptions,
        prompter: &dyn Prompter,
        strategy: LaunchStrategy,
    ) -> Result<StartedProcess, CoreError> {
        let data = self.load(source)?;
        self.launch(&data, options, prompter, strategy)
    }

    /// Launch every environment of `source` under the supervisor, in file
    /// order. The first failure aborts the rest; environments already
    /// started keep running.
    pub fn start_all(
        &self,
        source: &str,
        options: &ResolveOptions,
        prompter: &dyn Prompter,
        log_transaction: bool,
    ) -> Result<Vec<StartedProcess>, CoreError> {
        let data = self.load(source)?;
        let total = data.environments.len();
        let mut started = Vec::with_capacity(total);

        for index in 0..total {
            let options = ResolveOptions {
                index: Some(index),
                name: None,
                pname: None,
                port: None,
                ..options.clone()
            };
            match self.launch(
                &data,
                &options,
                prompter,
                LaunchStrategy::Supervised { log_transaction },
            ) {
                Ok(process) => started.push(process),
                Err(e) => {
                    warn!("batch start aborted at environment {index}: {e}");
                    return Err(CoreError::BatchAborted {
                        started: started.len(),
                        total,
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(started)
    }

    fn launch(
        &self,
        data: &LoadedData,
        options: &ResolveOptions,
        prompter: &dyn Prompter,
        strategy: LaunchStrategy,
    ) -> Result<StartedProcess, CoreError> {
        let resolved = prepare(&data.environments, options, prompter)?;
        let mut launch = Launch::new(&resolved.name);

        let port = check_port(&resolved)?;
        launch.advance(LaunchState::PortChecked)?;

        let data_dir = self.layout.data_dir();
        let dir = options.working_dir(&data_dir);
        match strategy {
            LaunchStrategy::Supervised { log_transaction } => {
                let _session = self.session()?;
                self.check_name(&resolved.name)?;
                launch.advance(LaunchState::NameChecked)?;
                let prepared = resolved.persist(dir)?;
                self.launch_supervised(
                    &prepared,
                    port,
                    data.base_dir.as_deref(),
                    log_transaction,
                    &mut launch,
                )
            }
            LaunchStrategy::Foreground { log_transaction } => {
                {
                    let _session = self.session()?;
                    self.check_name(&resolved.name)?;
                }
                launch.advance(LaunchState::NameChecked)?;
                let prepared = resolved.persist(dir)?;
                self.launch_foreground(prepared, port, data.base_dir.clone(), log_transaction, &mut launch)
            }
        }
    }

    fn launch_supervised(
        &self,
        prepared: &PreparedEnvironment,
        port: u16,
        base_dir: Option<&Path>,
        log_transaction: bool,
        launch: &mut Launch,
    ) -> Result<StartedProcess, CoreError> {
        launch.advance(LaunchState::Launching)?;
        let spec = self.start_spec(prepared, port, base_dir, log_transaction);
        info!("starting {} on port {port}", prepared.name);
        let process = self.supervisor.start(&spec)?;

        if process.status == ProcessStatus::Errored {
            launch.advance(LaunchState::Errored)?;
            let target = ProcessTarget::Name(prepared.name.to_string());
            if let Err(e) = self.supervisor.delete(&target) {
                warn!("failed to remove errored process {}: {e}", prepared.name);
            }
            return Err(CoreError::StartFailed {
                name: prepared.name.to_string(),
                error_log: spec.error_log.display().to_string(),
            });
        }

        launch.advance(LaunchState::Running)?;
        self.registry.add(RegistryEntry {
            name: prepared.name.clone(),
            port,
            hostname: prepared.hostname.clone(),
            endpoint_prefix: prepared.endpoint_prefix.clone(),
            pid: process.id,
        })?;

        Ok(StartedProcess {
            name: prepared.name.clone(),
            id: Some(process.id),
            protocol: prepared.protocol,
            hostname: prepared.hostname.clone(),
            port,
            endpoint_prefix: prepared.endpoint_prefix.clone(),
        })
    }

    fn launch_foreground(
        &self,
        prepared: PreparedEnvironment,
        port: u16,
        base_dir: Option<PathBuf>,
        log_transaction: bool,
        launch: &mut Launch,
    ) -> Result<StartedProcess, CoreError> {
        launch.advance(LaunchState::Launching)?;
        let started = StartedProcess {
            name: prepared.name.clone(),
            id: None,
            protocol: prepared.protocol,
            hostname: prepared.hostname.clone(),
            port,
            endpoint_prefix: prepared.endpoint_prefix.clone(),
        };

        let server = MockServer::new(prepared.environment, base_dir, log_transaction);
        let mut sink = LogSink::new(prepared.name.as_str(), log_transaction)
            .announcing(started.clone(), self.on_started);
        let should_stop = self.should_stop;
        let result = server.run(&mut sink, &should_stop);

        if let Err(e) = std::fs::remove_file(&prepared.working_file) {
            debug!(
                "working file {} not removed: {e}",
                prepared.working_file.display()
            );
        }

        match result {
            Ok(()) => {
                launch.advance(LaunchState::Running)?;
                launch.advance(LaunchState::Stopping)?;
                launch.advance(LaunchState::Stopped)?;
                Ok(started)
            }
            Err(e) => {
                launch.advance(LaunchState::Errored)?;
                Err(e.into())
            }
        }
    }

    fn start_spec(
        &self,
        prepared: &PreparedEnvironment,
        port: u16,
        base_dir: Option<&Path>,
        log_transaction: bool,
    ) -> StartSpec {
        let mut args = vec![
            "serve".to_owned(),
            "--data".to_owned(),
            prepared.working_file.display().to_string(),
        ];
        if let Some(dir) = base_dir {
            args.push("--base-dir".to_owned());
            args.push(dir.display().to_string());
        }
        if log_transaction {
            args.push("--log-transaction".to_owned());
        }

        let supervisor = &self.config.supervisor;
        StartSpec {
            name: prepared.name.clone(),
            program: self.program.clone(),
            args,
            out_log: self.layout.out_log(&prepared.name),
            error_log: self.layout.error_log(&prepared.name),
            restart: RestartPolicy {
                max_restarts: supervisor.max_restarts,
                min_uptime: supervisor.min_uptime(),
                kill_timeout: supervisor.kill_timeout(),
            },
            ready: Some(ReadyCheck {
                host: probe_host(&prepared.hostname).to_owned(),
                port,
                timeout: supervisor.ready_timeout(),
            }),
        }
    }

    /// Stop the matching processes, then prune the registry and sweep
    /// working files that no live process owns.
    pub fn stop(&self, target: &ProcessTarget) -> Result<StopReport, CoreError> {
        let _session = self.session()?;
        let mut report = StopReport::default();

        let mut launches: Vec<Launch> = self
            .supervisor
            .list()?
            .iter()
            .filter(|p| target.matches(p.id, &p.name))
            .map(|p| Launch::running(&p.name))
            .collect();
        for launch in &mut launches {
            launch.advance(LaunchState::Stopping)?;
        }

        match self.supervisor.delete(target) {
            Ok(stopped) => {
                for process in &stopped {
                    self.registry.remove(&process.name)?;
                    info!("stopped {} (id {})", process.name, process.id);
                }
                for launch in &mut launches {
                    launch.advance(LaunchState::Stopped)?;
                }
                report.stopped = stopped;
            }
            Err(RuntimeError::ProcessNotFound(_)) => {
                report.not_found = Some(target.to_string());
            }
            Err(e) => {
                warn!("failed to stop {target}: {e}");
                report.failure = Some(e.to_string());
            }
        }

        let live = self.supervisor.list()?;
        let ids: Vec<(ProcessName, u32)> =
            live.iter().map(|p| (p.name.clone(), p.id)).collect();
        let pruned = self.registry.prune(&ids)?;
        if !pruned.is_empty() {
            debug!("pruned {} stale registry entries", pruned.len());
        }
        let names: Vec<ProcessName> = live.iter().map(|p| p.name.clone()).collect();
        report.swept = WorkingFiles::new(self.layout.data_dir()).sweep(&names)?;
        report.running = self.join(live)?;
        Ok(report)
    }

    /// Live managed processes with their registry fields.
    pub fn list(&self) -> Result<Vec<ProcessEntry>, CoreError> {
        let _session = self.session()?;
        let live = self.supervisor.list()?;
        self.join(live)
    }

    pub fn info(&self, target: &ProcessTarget) -> Result<ProcessEntry, CoreError> {
        let _session = self.session()?;
        let process = self.supervisor.describe(target)?;
        let entry = self.registry.get(&process.name)?;
        Ok(entry_for(process, entry))
    }

    /// Write a Dockerfile to `output` and the environment's working file
    /// next to it.
    pub fn dockerize(
        &self,
        source: &str,
        options: &ResolveOptions,
        prompter: &dyn Prompter,
        output: &Path,
        log_transaction: bool,
    ) -> Result<DockerArtifact, CoreError> {
        let data = self.load(source)?;
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let resolved = prepare(&data.environments, options, prompter)?;
        let port =
            u16::try_from(resolved.port).map_err(|_| CoreError::PortInvalid(resolved.port))?;
        let prepared = resolved.persist(&dir)?;

        let data_file = prepared
            .working_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| prepared.name.working_file_name());
        let content = render_dockerfile(&DockerfileParams {
            data_file,
            port,
            log_transaction,
        });
        write_atomic(output, content.as_bytes())?;
        info!("wrote {}", output.display());

        Ok(DockerArtifact {
            dockerfile: output.to_path_buf(),
            data_file: prepared.working_file,
            name: prepared.name,
            port,
        })
    }

    fn session(&self) -> Result<Session<'_>, CoreError> {
        self.supervisor.connect()?;
        Ok(Session(self.supervisor.as_ref()))
    }

    fn check_name(&self, name: &ProcessName) -> Result<(), CoreError> {
        if self.supervisor.list()?.iter().any(|p| p.name == *name) {
            return Err(CoreError::NameInUse(name.to_string()));
        }
        Ok(())
    }

    fn join(&self, live: Vec<ProcessInfo>) -> Result<Vec<ProcessEntry>, CoreError> {
        let live: Vec<ProcessInfo> = live
            .into_iter()
            .filter(|p| ProcessName::is_managed(&p.name))
            .collect();
        let names: Vec<ProcessName> = live.iter().map(|p| p.name.clone()).collect();
        let entries = self.registry.reconcile(&names)?;
        Ok(live
            .into_iter()
            .map(|process| {
                let entry = entries.iter().find(|e| e.name == process.name).cloned();
                entry_for(process, entry)
            })
            .collect())
    }
}

fn entry_for(process: ProcessInfo, entry: Option<RegistryEntry>) -> ProcessEntry {
    match entry {
        Some(e) => ProcessEntry {
            process,
            hostname: Some(e.hostname),
            port: Some(e.port),
            endpoint_prefix: Some(e.endpoint_prefix),
        },
        None => ProcessEntry {
            process,
            hostname: None,
            port: None,
            endpoint_prefix: None,
        },
    }
}

/// The port must fit in 0..=65535 before anything is probed.
fn check_port(resolved: &ResolvedEnvironment) -> Result<u16, CoreError> {
    let port = u16::try_from(resolved.port).map_err(|_| CoreError::PortInvalid(resolved.port))?;
    if port_in_use(&resolved.hostname, port) {
        return Err(CoreError::PortInUse(port));
    }
    Ok(port)
}

/// Serve a working file in this process until shutdown is requested. This is
/// what supervised processes run.
pub fn serve(
    working_file: &Path,
    base_dir: Option<PathBuf>,
    log_transaction: bool,
) -> Result<(), CoreError> {
    let raw = parse_data_file(working_file)?
        .into_iter()
        .next()
        .ok_or(DataError::NoEnvironments)?;
    let environment = validate(migrate(raw)?)?;
    let name = environment.name.clone();
    info!("serving {name} from {}", working_file.display());

    let server = MockServer::new(environment, base_dir, log_transaction);
    let mut sink = LogSink::new(name, log_transaction);
    server.run(&mut sink, &shutdown_requested)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(hostname: &str, id: Option<u32>) -> StartedProcess {
        StartedProcess {
            name: ProcessName::canonical("shop"),
            id,
            protocol: "http",
            hostname: hostname.to_owned(),
            port: 3000,
            endpoint_prefix: String::new(),
        }
    }

    #[test]
    fn wildcard_host_is_shown_as_localhost() {
        assert_eq!(
            started("0.0.0.0", Some(2)).confirmation(),
            "Mock started at http://localhost:3000 (pid: 2, name: mockoon-shop)"
        );
    }

    #[test]
    fn explicit_host_is_kept() {
        assert_eq!(started("127.0.0.1", None).url(), "http://127.0.0.1:3000");
        assert_eq!(
            started("127.0.0.1", None).confirmation(),
            "Mock started at http://127.0.0.1:3000 (name: mockoon-shop)"
        );
    }

    #[test]
    fn process_entry_serializes_registry_fields_in_camel_case() {
        let entry = entry_for(
            ProcessInfo {
                id: 0,
                name: ProcessName::canonical("shop"),
                pid: Some(12),
                status: ProcessStatus::Online,
                cpu: 0.0,
                memory: 0,
                restarts: 0,
                started_at: None,
                out_log: PathBuf::from("/tmp/out.log"),
                error_log: PathBuf::from("/tmp/err.log"),
            },
            Some(RegistryEntry {
                name: ProcessName::canonical("shop"),
                port: 3000,
                hostname: "0.0.0.0".to_owned(),
                endpoint_prefix: "api".to_owned(),
                pid: 0,
            }),
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["name"], "mockoon-shop");
        assert_eq!(json["status"], "online");
        assert_eq!(json["port"], 3000);
        assert_eq!(json["endpointPrefix"], "api");
    }
}
