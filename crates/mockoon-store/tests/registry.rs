//! Registry behaviour under concurrent writers and across reopen.

use mockoon_schema::ProcessName;
use mockoon_store::{HomeLayout, ProcessRegistry, RegistryEntry, WorkingFiles};
use std::sync::Arc;
use std::thread;

fn entry(i: u16) -> RegistryEntry {
    RegistryEntry {
        name: ProcessName::canonical(&format!("env {i}")),
        port: 4000 + i,
        hostname: "127.0.0.1".to_owned(),
        endpoint_prefix: String::new(),
        pid: u32::from(i),
    }
}

#[test]
fn concurrent_adds_are_all_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let layout = Arc::new(HomeLayout::new(dir.path()));
    layout.initialize().unwrap();

    let handles: Vec<_> = (0..8u16)
        .map(|i| {
            let layout = Arc::clone(&layout);
            thread::spawn(move || {
                // each thread opens its own handle, like separate invocations
                let registry = ProcessRegistry::new(&layout);
                registry.add(entry(i)).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let registry = ProcessRegistry::new(&layout);
    let mut ports: Vec<u16> = registry.list().unwrap().iter().map(|e| e.port).collect();
    ports.sort_unstable();
    assert_eq!(ports, (4000..4008).collect::<Vec<_>>());
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let layout = HomeLayout::new(dir.path());
    layout.initialize().unwrap();

    ProcessRegistry::new(&layout).add(entry(1)).unwrap();
    let reopened = ProcessRegistry::new(&layout);
    let found = reopened.get("mockoon-env-1").unwrap().unwrap();
    assert_eq!(found.port, 4001);
    assert_eq!(found.hostname, "127.0.0.1");
}

#[test]
fn sweep_after_prune_leaves_only_live_state() {
    let dir = tempfile::tempdir().unwrap();
    let layout = HomeLayout::new(dir.path());
    layout.initialize().unwrap();
    let registry = ProcessRegistry::new(&layout);
    let files = WorkingFiles::new(layout.data_dir());

    for i in 0..3 {
        let e = entry(i);
        files.write(&e.name, "{}").unwrap();
        registry.add(e).unwrap();
    }

    let survivor = entry(2);
    let live = vec![(survivor.name.clone(), survivor.pid)];
    registry.prune(&live).unwrap();
    files.sweep(&[survivor.name.clone()]).unwrap();

    assert_eq!(registry.list().unwrap(), vec![survivor.clone()]);
    let remaining: Vec<_> = std::fs::read_dir(layout.data_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(remaining, vec![survivor.name.working_file_name()]);
}
