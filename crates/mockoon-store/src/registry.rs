use crate::layout::HomeLayout;
use crate::lock::FileLock;
use crate::{write_atomic, StoreError};
use mockoon_schema::ProcessName;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Side-table record for one managed process: the fields the supervisor does
/// not track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub name: ProcessName,
    pub port: u16,
    pub hostname: String,
    #[serde(default)]
    pub endpoint_prefix: String,
    /// Supervisor-assigned process id.
    pub pid: u32,
}

/// The persisted process registry (`processes.json`).
///
/// Every mutation is a locked read-modify-write followed by an atomic
/// replacement of the file. A missing or corrupt file reads as empty; a
/// corrupt one is reset with a warning.
pub struct ProcessRegistry {
    path: PathBuf,
    lock_path: PathBuf,
}

impl ProcessRegistry {
    pub fn new(layout: &HomeLayout) -> Self {
        Self {
            path: layout.registry_file(),
            lock_path: layout.registry_lock_file(),
        }
    }

    /// Insert or refresh an entry. Idempotent on `(name, port)`; an older
    /// entry with the same name is replaced since names are unique.
    pub fn add(&self, entry: RegistryEntry) -> Result<(), StoreError> {
        let _lock = FileLock::acquire(&self.lock_path)?;
        let mut entries = self.read_or_reset()?;
        entries.retain(|e| e.name != entry.name);
        debug!("registry add {} (port {}, pid {})", entry.name, entry.port, entry.pid);
        entries.push(entry);
        self.write(&entries)
    }

    /// Remove an entry by name. Returns whether anything was removed.
    pub fn remove(&self, name: &str) -> Result<bool, StoreError> {
        let _lock = FileLock::acquire(&self.lock_path)?;
        let mut entries = self.read_or_reset()?;
        let before = entries.len();
        entries.retain(|e| e.name != name);
        if entries.len() == before {
            return Ok(false);
        }
        debug!("registry remove {name}");
        self.write(&entries)?;
        Ok(true)
    }

    pub fn list(&self) -> Result<Vec<RegistryEntry>, StoreError> {
        let _lock = FileLock::acquire(&self.lock_path)?;
        self.read_or_reset()
    }

    pub fn get(&self, name: &str) -> Result<Option<RegistryEntry>, StoreError> {
        Ok(self.list()?.into_iter().find(|e| e.name == name))
    }

    /// Display view: entries whose name the supervisor currently reports.
    /// Does not modify the file.
    pub fn reconcile(&self, live: &[ProcessName]) -> Result<Vec<RegistryEntry>, StoreError> {
        let mut entries = self.list()?;
        entries.retain(|e| live.contains(&e.name));
        Ok(entries)
    }

    /// Drop entries whose name is no longer live, or whose recorded id no
    /// longer matches the live process of that name. Returns the removed entries.
    pub fn prune(&self, live: &[(ProcessName, u32)]) -> Result<Vec<RegistryEntry>, StoreError> {
        let _lock = FileLock::acquire(&self.lock_path)?;
        let entries = self.read_or_reset()?;
        let (kept, removed): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|e| live.iter().any(|(name, id)| *name == e.name && *id == e.pid));
        if !removed.is_empty() {
            debug!("registry prune removed {} stale entries", removed.len());
            self.write(&kept)?;
        }
        Ok(removed)
    }

    fn read_or_reset(&self) -> Result<Vec<RegistryEntry>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(
                    "process registry {} is corrupt ({e}); resetting it",
                    self.path.display()
                );
                self.write(&[])?;
                Ok(Vec::new())
            }
        }
    }

    fn write(&self, entries: &[RegistryEntry]) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(entries)?;
        write_atomic(&self.path, content.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, port: u16, pid: u32) -> RegistryEntry {
        RegistryEntry {
            name: ProcessName::canonical(name),
            port,
            hostname: "0.0.0.0".to_owned(),
            endpoint_prefix: String::new(),
            pid,
        }
    }

    fn setup() -> (tempfile::TempDir, ProcessRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let layout = HomeLayout::new(dir.path());
        layout.initialize().unwrap();
        let registry = ProcessRegistry::new(&layout);
        (dir, registry)
    }

    #[test]
    fn missing_file_lists_empty() {
        let (_dir, registry) = setup();
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn add_and_list() {
        let (_dir, registry) = setup();
        registry.add(entry("a", 3000, 0)).unwrap();
        registry.add(entry("b", 3001, 1)).unwrap();
        let names: Vec<_> = registry
            .list()
            .unwrap()
            .into_iter()
            .map(|e| e.name.to_string())
            .collect();
        assert_eq!(names, ["mockoon-a", "mockoon-b"]);
    }

    #[test]
    fn add_is_idempotent_on_name_and_port() {
        let (_dir, registry) = setup();
        registry.add(entry("a", 3000, 0)).unwrap();
        registry.add(entry("a", 3000, 0)).unwrap();
        assert_eq!(registry.list().unwrap().len(), 1);
    }

    #[test]
    fn remove_by_name() {
        let (_dir, registry) = setup();
        registry.add(entry("a", 3000, 0)).unwrap();
        assert!(registry.remove("mockoon-a").unwrap());
        assert!(!registry.remove("mockoon-a").unwrap());
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_reset() {
        let (dir, registry) = setup();
        fs::write(dir.path().join("processes.json"), "{{ not json").unwrap();
        assert!(registry.list().unwrap().is_empty());
        let content = fs::read_to_string(dir.path().join("processes.json")).unwrap();
        assert_eq!(content.trim(), "[]");
        registry.add(entry("a", 3000, 0)).unwrap();
        assert_eq!(registry.list().unwrap().len(), 1);
    }

    #[test]
    fn reconcile_filters_without_writing() {
        let (_dir, registry) = setup();
        registry.add(entry("a", 3000, 0)).unwrap();
        registry.add(entry("b", 3001, 1)).unwrap();
        let view = registry
            .reconcile(&[ProcessName::canonical("b")])
            .unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].name, "mockoon-b");
        assert_eq!(registry.list().unwrap().len(), 2);
    }

    #[test]
    fn prune_removes_gone_and_mismatched_ids() {
        let (_dir, registry) = setup();
        registry.add(entry("gone", 3000, 0)).unwrap();
        registry.add(entry("reused", 3001, 1)).unwrap();
        registry.add(entry("alive", 3002, 2)).unwrap();
        let live = [
            (ProcessName::canonical("reused"), 7),
            (ProcessName::canonical("alive"), 2),
        ];
        let removed = registry.prune(&live).unwrap();
        assert_eq!(removed.len(), 2);
        let left = registry.list().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].name, "mockoon-alive");
    }

    #[test]
    fn file_uses_camel_case_fields() {
        let (dir, registry) = setup();
        let mut e = entry("a", 3000, 4);
        e.endpoint_prefix = "api".to_owned();
        registry.add(e).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("processes.json")).unwrap())
                .unwrap();
        assert_eq!(raw[0]["endpointPrefix"], "api");
        assert_eq!(raw[0]["pid"], 4);
    }
}
