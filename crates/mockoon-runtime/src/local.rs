//! Poll-based supervisor for processes on the local host.
//!
//! There is no daemon: the process table lives in `<dir>/table.json` and is
//! refreshed against `/proc` whenever it is read. A process that died since
//! the last look is restarted at that point, within the limits of its
//! [`RestartPolicy`](crate::RestartPolicy).

use crate::probe;
use crate::procfs;
use crate::supervisor::{ProcessInfo, ProcessStatus, ProcessTarget, StartSpec, Supervisor};
use crate::RuntimeError;
use chrono::{DateTime, Utc};
use mockoon_store::{write_atomic, FileLock};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const TABLE_FILE: &str = "table.json";
const LOCK_FILE: &str = ".table.lock";
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const READY_PROBE_TIMEOUT: Duration = Duration::from_millis(200);
/// Without a readiness probe, a process is online once it survives this long.
const UNPROBED_GRACE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableEntry {
    id: u32,
    spec: StartSpec,
    status: ProcessStatus,
    os_pid: Option<u32>,
    start_ticks: Option<u64>,
    started_at: Option<DateTime<Utc>>,
    restarts: u32,
    /// Restarts after exits shorter than `min_uptime`; bounded by `max_restarts`.
    unstable_restarts: u32,
}

impl TableEntry {
    fn is_running(&self) -> bool {
        matches!(self.status, ProcessStatus::Online | ProcessStatus::Launching)
    }

    fn alive(&self) -> bool {
        self.os_pid
            .is_some_and(|pid| procfs::is_alive(pid, self.start_ticks))
    }

    fn record_spawn(&mut self, child: &Child) {
        let pid = child.id();
        self.os_pid = Some(pid);
        self.start_ticks = procfs::read_stat(pid).map(|s| s.start_ticks);
        self.started_at = Some(Utc::now());
    }

    fn mark_errored(&mut self) {
        self.status = ProcessStatus::Errored;
        self.os_pid = None;
        self.start_ticks = None;
    }

    fn to_info(&self) -> ProcessInfo {
        let live_pid = self.os_pid.filter(|_| self.is_running());
        ProcessInfo {
            id: self.id,
            name: self.spec.name.clone(),
            pid: live_pid,
            status: self.status,
            cpu: live_pid.map_or(0.0, procfs::cpu_percent),
            memory: live_pid.map_or(0, procfs::rss_bytes),
            restarts: self.restarts,
            started_at: self.started_at,
            out_log: self.spec.out_log.clone(),
            error_log: self.spec.error_log.clone(),
        }
    }
}

pub struct LocalSupervisor {
    dir: PathBuf,
    session: Mutex<Option<FileLock>>,
}

impl LocalSupervisor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            session: Mutex::new(None),
        }
    }

    fn table_path(&self) -> PathBuf {
        self.dir.join(TABLE_FILE)
    }

    fn ensure_connected(&self) -> Result<(), RuntimeError> {
        let session = self
            .session
            .lock()
            .map_err(|e| RuntimeError::Supervisor(format!("mutex poisoned: {e}")))?;
        if session.is_some() {
            Ok(())
        } else {
            Err(RuntimeError::NotConnected)
        }
    }

    fn load(&self) -> Result<Vec<TableEntry>, RuntimeError> {
        let path = self.table_path();
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content) {
            Ok(table) => Ok(table),
            Err(e) => {
                warn!("supervisor table {} is corrupt ({e}); starting empty", path.display());
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, table: &[TableEntry]) -> Result<(), RuntimeError> {
        let content = serde_json::to_string_pretty(table)?;
        write_atomic(&self.table_path(), content.as_bytes())?;
        Ok(())
    }

    /// Load the table and bring it in line with reality, restarting dead
    /// processes where the policy allows.
    fn load_refreshed(&self) -> Result<Vec<TableEntry>, RuntimeError> {
        let mut table = self.load()?;
        let mut changed = false;
        for entry in table.iter_mut().filter(|e| e.is_running()) {
            if entry.alive() {
                continue;
            }
            changed = true;
            restart_dead(entry);
        }
        if changed {
            self.save(&table)?;
        }
        Ok(table)
    }
}

fn restart_dead(entry: &mut TableEntry) {
    let name = entry.spec.name.clone();
    let policy = &entry.spec.restart;
    let uptime = entry
        .started_at
        .and_then(|t| (Utc::now() - t).to_std().ok())
        .unwrap_or_default();

    if uptime >= policy.min_uptime {
        entry.unstable_restarts = 0;
    } else if entry.unstable_restarts >= policy.max_restarts {
        warn!("{name} exited after {uptime:?}; restart limit reached, marking errored");
        entry.mark_errored();
        return;
    } else {
        entry.unstable_restarts += 1;
    }

    info!("{name} exited after {uptime:?}; restarting");
    match spawn(&entry.spec) {
        Ok(child) => {
            entry.record_spawn(&child);
            entry.restarts += 1;
            entry.status = ProcessStatus::Online;
        }
        Err(e) => {
            warn!("failed to restart {name}: {e}");
            entry.mark_errored();
        }
    }
}

fn open_log(path: &Path) -> Result<fs::File, RuntimeError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn spawn(spec: &StartSpec) -> Result<Child, RuntimeError> {
    let out = open_log(&spec.out_log)?;
    let err = open_log(&spec.error_log)?;
    debug!(
        "spawning {} {} {}",
        spec.name,
        spec.program.display(),
        spec.args.join(" ")
    );
    Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(out))
        .stderr(Stdio::from(err))
        .process_group(0)
        .spawn()
        .map_err(|e| RuntimeError::SpawnFailed {
            name: spec.name.to_string(),
            reason: e.to_string(),
        })
}

/// Spawn and wait until the process is ready, restarting early exits
/// within the policy.
fn launch(entry: &mut TableEntry) -> Result<(), RuntimeError> {
    let mut child = spawn(&entry.spec)?;
    entry.record_spawn(&child);
    let mut attempt_started = Instant::now();

    loop {
        if let Some(status) = child.try_wait()? {
            warn!("{} exited during launch ({status})", entry.spec.name);
            if entry.unstable_restarts >= entry.spec.restart.max_restarts {
                entry.mark_errored();
                return Ok(());
            }
            entry.unstable_restarts += 1;
            entry.restarts += 1;
            child = spawn(&entry.spec)?;
            entry.record_spawn(&child);
            attempt_started = Instant::now();
            continue;
        }

        let elapsed = attempt_started.elapsed();
        match &entry.spec.ready {
            Some(check) => {
                if probe::can_connect(&check.host, check.port, READY_PROBE_TIMEOUT) {
                    break;
                }
                if elapsed >= check.timeout {
                    warn!(
                        "{} did not accept connections on port {} within {:?}; assuming online",
                        entry.spec.name, check.port, check.timeout
                    );
                    break;
                }
            }
            None if elapsed >= UNPROBED_GRACE => break,
            None => {}
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    entry.status = ProcessStatus::Online;
    Ok(())
}

/// Stop every matched entry. Entries that could not be stopped go back into
/// the table unchanged; the first failure is returned alongside.
fn stop_entries(
    matched: Vec<TableEntry>,
    mut table: Vec<TableEntry>,
    terminate: impl Fn(u32, Option<u64>, Duration) -> Result<(), RuntimeError>,
) -> (Vec<TableEntry>, Vec<ProcessInfo>, Option<RuntimeError>) {
    let mut stopped = Vec::with_capacity(matched.len());
    let mut failure = None;
    for mut entry in matched {
        if let Some(pid) = entry.os_pid.filter(|_| entry.alive()) {
            if let Err(e) = terminate(pid, entry.start_ticks, entry.spec.restart.kill_timeout) {
                warn!("failed to stop {} (id {}): {e}", entry.spec.name, entry.id);
                failure.get_or_insert(e);
                table.push(entry);
                continue;
            }
        }
        entry.status = ProcessStatus::Stopped;
        entry.os_pid = None;
        info!("stopped {} (id {})", entry.spec.name, entry.id);
        stopped.push(entry.to_info());
    }
    table.sort_by_key(|e| e.id);
    (table, stopped, failure)
}

/// SIGTERM the process group, then SIGKILL once `timeout` has passed.
fn terminate(pid: u32, start_ticks: Option<u64>, timeout: Duration) -> Result<(), RuntimeError> {
    let pgid = i32::try_from(pid).map_err(|_| RuntimeError::Signal {
        pid,
        reason: "pid exceeds i32 range".to_owned(),
    })?;

    debug!("sending SIGTERM to process group {pid}");
    // SAFETY: kill() with a valid process group id and signal is safe; pgid validated via i32::try_from above.
    #[allow(unsafe_code)]
    let term_ret = unsafe { libc::kill(-pgid, libc::SIGTERM) };
    if term_ret != 0 {
        let errno = std::io::Error::last_os_error();
        if errno.raw_os_error() == Some(libc::ESRCH) {
            debug!("process group {pid} already gone before SIGTERM");
            return Ok(());
        }
        return Err(RuntimeError::Signal {
            pid,
            reason: format!("SIGTERM failed: {errno}"),
        });
    }

    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if !procfs::is_alive(pid, start_ticks) {
            return Ok(());
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    if procfs::is_alive(pid, start_ticks) {
        warn!("process {pid} did not exit after SIGTERM, sending SIGKILL");
        // SAFETY: same as above, valid pgid and signal.
        #[allow(unsafe_code)]
        let kill_ret = unsafe { libc::kill(-pgid, libc::SIGKILL) };
        if kill_ret != 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() != Some(libc::ESRCH) {
                warn!("failed to send SIGKILL to process group {pid}: {errno}");
            }
        }
    }
    Ok(())
}

impl Supervisor for LocalSupervisor {
    fn name(&self) -> &'static str {
        "local"
    }

    fn connect(&self) -> Result<(), RuntimeError> {
        let mut session = self
            .session
            .lock()
            .map_err(|e| RuntimeError::Supervisor(format!("mutex poisoned: {e}")))?;
        if session.is_none() {
            fs::create_dir_all(&self.dir)?;
            *session = Some(FileLock::acquire(&self.dir.join(LOCK_FILE))?);
            debug!("connected to local supervisor at {}", self.dir.display());
        }
        Ok(())
    }

    fn disconnect(&self) {
        if let Ok(mut session) = self.session.lock() {
            session.take();
        }
    }

    fn list(&self) -> Result<Vec<ProcessInfo>, RuntimeError> {
        self.ensure_connected()?;
        let mut infos: Vec<ProcessInfo> = self
            .load_refreshed()?
            .iter()
            .map(TableEntry::to_info)
            .collect();
        infos.sort_by_key(|p| p.id);
        Ok(infos)
    }

    fn start(&self, spec: &StartSpec) -> Result<ProcessInfo, RuntimeError> {
        self.ensure_connected()?;
        let mut table = self.load_refreshed()?;
        if table
            .iter()
            .any(|e| e.spec.name == spec.name && e.is_running())
        {
            return Err(RuntimeError::AlreadyRunning(spec.name.to_string()));
        }
        table.retain(|e| e.spec.name != spec.name);

        let id = table.iter().map(|e| e.id + 1).max().unwrap_or(0);
        let mut entry = TableEntry {
            id,
            spec: spec.clone(),
            status: ProcessStatus::Launching,
            os_pid: None,
            start_ticks: None,
            started_at: None,
            restarts: 0,
            unstable_restarts: 0,
        };
        launch(&mut entry)?;
        info!("{} is {} (id {id})", spec.name, entry.status);

        let result = entry.to_info();
        table.push(entry);
        self.save(&table)?;
        Ok(result)
    }

    fn delete(&self, target: &ProcessTarget) -> Result<Vec<ProcessInfo>, RuntimeError> {
        self.ensure_connected()?;
        let table = self.load()?;
        let (matched, kept): (Vec<_>, Vec<_>) = table
            .into_iter()
            .partition(|e| target.matches(e.id, &e.spec.name));
        if matched.is_empty() {
            return Err(RuntimeError::ProcessNotFound(target.to_string()));
        }

        let (table, stopped, failure) = stop_entries(matched, kept, terminate);
        self.save(&table)?;
        match failure {
            Some(e) => Err(e),
            None => Ok(stopped),
        }
    }

    fn describe(&self, target: &ProcessTarget) -> Result<ProcessInfo, RuntimeError> {
        self.ensure_connected()?;
        if *target == ProcessTarget::All {
            return Err(RuntimeError::InvalidTarget(
                "describe needs an id or a name".to_owned(),
            ));
        }
        self.load_refreshed()?
            .iter()
            .find(|e| target.matches(e.id, &e.spec.name))
            .map(TableEntry::to_info)
            .ok_or_else(|| RuntimeError::ProcessNotFound(target.to_string()))
    }
}

impl Drop for LocalSupervisor {
    fn drop(&mut self) {
        self.disconnect();
    }
}
