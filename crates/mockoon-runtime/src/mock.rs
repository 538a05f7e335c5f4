use crate::supervisor::{ProcessInfo, ProcessStatus, ProcessTarget, StartSpec, Supervisor};
use crate::RuntimeError;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MockState {
    connected: bool,
    processes: Vec<ProcessInfo>,
    started: Vec<StartSpec>,
    fail_names: HashSet<String>,
    next_pid: u32,
}

/// In-memory supervisor for tests. Clones share state, so a test can keep a
/// handle after giving one to the engine.
#[derive(Clone, Default)]
pub struct MockSupervisor {
    state: Arc<Mutex<MockState>>,
}

impl MockSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every start of `name` come back `Errored`.
    pub fn fail_start_for(&self, name: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_names.insert(name.to_owned());
        }
    }

    /// Every spec passed to `start`, in call order.
    pub fn started_specs(&self) -> Vec<StartSpec> {
        self.state
            .lock()
            .map(|s| s.started.clone())
            .unwrap_or_default()
    }

    /// Forget a process without going through `delete`, like a crash that
    /// the supervisor already cleaned up.
    pub fn vanish(&self, name: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.processes.retain(|p| p.name != name);
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        self.state
            .lock()
            .map_err(|e| RuntimeError::Supervisor(format!("mutex poisoned: {e}")))
    }

    fn connected(&self) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        let state = self.lock()?;
        if state.connected {
            Ok(state)
        } else {
            Err(RuntimeError::NotConnected)
        }
    }
}

impl Supervisor for MockSupervisor {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn connect(&self) -> Result<(), RuntimeError> {
        self.lock()?.connected = true;
        Ok(())
    }

    fn disconnect(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.connected = false;
        }
    }

    fn list(&self) -> Result<Vec<ProcessInfo>, RuntimeError> {
        Ok(self.connected()?.processes.clone())
    }

    fn start(&self, spec: &StartSpec) -> Result<ProcessInfo, RuntimeError> {
        let mut state = self.connected()?;
        if state.processes.iter().any(|p| p.name == spec.name) {
            return Err(RuntimeError::AlreadyRunning(spec.name.to_string()));
        }
        state.started.push(spec.clone());

        let id = state.processes.iter().map(|p| p.id + 1).max().unwrap_or(0);
        let errored = state.fail_names.contains(spec.name.as_str());
        state.next_pid += 1;
        let info = ProcessInfo {
            id,
            name: spec.name.clone(),
            pid: (!errored).then_some(90_000 + state.next_pid),
            status: if errored {
                ProcessStatus::Errored
            } else {
                ProcessStatus::Online
            },
            cpu: 0.0,
            memory: 0,
            restarts: u32::from(errored) * spec.restart.max_restarts,
            started_at: Some(chrono::Utc::now()),
            out_log: spec.out_log.clone(),
            error_log: spec.error_log.clone(),
        };
        state.processes.push(info.clone());
        Ok(info)
    }

    fn delete(&self, target: &ProcessTarget) -> Result<Vec<ProcessInfo>, RuntimeError> {
        let mut state = self.connected()?;
        let (matched, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.processes)
            .into_iter()
            .partition(|p| target.matches(p.id, &p.name));
        state.processes = kept;
        if matched.is_empty() {
            return Err(RuntimeError::ProcessNotFound(target.to_string()));
        }
        Ok(matched
            .into_iter()
            .map(|mut p| {
                p.status = ProcessStatus::Stopped;
                p.pid = None;
                p
            })
            .collect())
    }

    fn describe(&self, target: &ProcessTarget) -> Result<ProcessInfo, RuntimeError> {
        if *target == ProcessTarget::All {
            return Err(RuntimeError::InvalidTarget(
                "describe needs an id or a name".to_owned(),
            ));
        }
        self.connected()?
            .processes
            .iter()
            .find(|p| target.matches(p.id, &p.name))
            .cloned()
            .ok_or_else(|| RuntimeError::ProcessNotFound(target.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::RestartPolicy;
    use mockoon_schema::ProcessName;
    use std::path::PathBuf;

    fn spec(name: &str) -> StartSpec {
        StartSpec {
            name: ProcessName::canonical(name),
            program: PathBuf::from("mockoon"),
            args: vec![],
            out_log: PathBuf::from("/tmp/out.log"),
            error_log: PathBuf::from("/tmp/error.log"),
            restart: RestartPolicy::default(),
            ready: None,
        }
    }

    #[test]
    fn requires_connect() {
        let sup = MockSupervisor::new();
        assert!(sup.list().is_err());
        sup.connect().unwrap();
        assert!(sup.list().unwrap().is_empty());
        sup.disconnect();
        assert!(sup.list().is_err());
    }

    #[test]
    fn start_and_delete() {
        let sup = MockSupervisor::new();
        sup.connect().unwrap();
        let a = sup.start(&spec("a")).unwrap();
        let b = sup.start(&spec("b")).unwrap();
        assert_eq!((a.id, b.id), (0, 1));
        assert_eq!(a.status, ProcessStatus::Online);

        let deleted = sup.delete(&ProcessTarget::Id(0)).unwrap();
        assert_eq!(deleted[0].name, "mockoon-a");
        assert_eq!(sup.list().unwrap().len(), 1);
        assert!(sup.delete(&ProcessTarget::Id(0)).is_err());
    }

    #[test]
    fn forced_failure_reports_errored() {
        let sup = MockSupervisor::new();
        sup.connect().unwrap();
        sup.fail_start_for("mockoon-bad");
        let info = sup.start(&spec("bad")).unwrap();
        assert_eq!(info.status, ProcessStatus::Errored);
        assert_eq!(info.pid, None);
    }

    #[test]
    fn clones_share_state() {
        let sup = MockSupervisor::new();
        let handle = sup.clone();
        sup.connect().unwrap();
        sup.start(&spec("a")).unwrap();
        assert_eq!(handle.started_specs().len(), 1);
        assert_eq!(handle.list().unwrap().len(), 1);
    }
}
