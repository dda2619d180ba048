//! In-memory process table shared by the registry, terminator and spawner stubs.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::launcher::ProcessSpawner;
use crate::model::{KillOutcome, KillReport, LaunchStamp};
use crate::orchestrator::ProcessServices;
use crate::registry::{ProcessRegistry, collect_descendants};
use crate::terminator::ProcessTerminator;

pub const HELPER: &str = "winws.exe";
pub const SHELL: &str = "cmd.exe";

#[derive(Default)]
pub struct FakeTable {
    procs: Mutex<BTreeMap<u32, (String, Option<u32>)>>,
    next_pid: Mutex<u32>,
    log: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    /// Reported by every kill that finds its target. Only `Success` removes it.
    kill_outcome: Mutex<Option<KillOutcome>>,
    spawn_error: Mutex<Option<io::ErrorKind>>,
}

impl FakeTable {
    pub fn insert(&self, name: &str, parent: Option<u32>) -> u32 {
        let mut next = self.next_pid.lock().unwrap();
        *next += 1;
        let pid = 1000 + *next;
        self.procs
            .lock()
            .unwrap()
            .insert(pid, (name.to_string(), parent));
        pid
    }

    pub fn count(&self, name: &str) -> usize {
        self.procs
            .lock()
            .unwrap()
            .values()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .count()
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.procs.lock().unwrap().contains_key(&pid)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Most workers that ever touched the table at the same time.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn fail_kills_with(&self, outcome: KillOutcome) {
        *self.kill_outcome.lock().unwrap() = Some(outcome);
    }

    pub fn fail_spawns_with(&self, kind: io::ErrorKind) {
        *self.spawn_error.lock().unwrap() = Some(kind);
    }

    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(5));
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Apply the configured outcome to `doomed` and report it.
    fn kill(&self, doomed: &[u32]) -> KillReport {
        let outcome = self.kill_outcome.lock().unwrap().unwrap_or(KillOutcome::Success);
        let mut procs = self.procs.lock().unwrap();
        let found = doomed.iter().any(|pid| procs.contains_key(pid));
        if !found {
            return KillReport::absent();
        }
        if outcome == KillOutcome::Success {
            for pid in doomed {
                procs.remove(pid);
            }
        }
        KillReport {
            found: true,
            outcome,
        }
    }
}

#[derive(Clone)]
pub struct FakeOs(pub Arc<FakeTable>);

impl FakeOs {
    pub fn services(table: &Arc<FakeTable>) -> ProcessServices {
        let os = FakeOs(table.clone());
        ProcessServices {
            registry: Arc::new(os.clone()),
            terminator: Arc::new(os.clone()),
            spawner: Arc::new(os),
        }
    }
}

impl ProcessRegistry for FakeOs {
    fn pids_by_name(&self, name: &str) -> Vec<u32> {
        self.0
            .procs
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, (n, _))| n.eq_ignore_ascii_case(name))
            .map(|(pid, _)| *pid)
            .collect()
    }

    fn descendants(&self, pid: u32) -> Vec<u32> {
        let edges: Vec<(u32, u32)> = self
            .0
            .procs
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(child, (_, parent))| parent.map(|p| (*child, p)))
            .collect();
        collect_descendants(pid, edges)
    }
}

impl ProcessTerminator for FakeOs {
    fn kill_by_name(&self, name: &str) -> KillReport {
        self.0.enter();
        self.0.log.lock().unwrap().push(format!("kill:{}", name));
        let doomed = self.pids_by_name(name);
        let report = self.0.kill(&doomed);
        self.0.leave();
        report
    }

    fn kill_by_pid(&self, target: LaunchStamp) -> KillReport {
        self.0.enter();
        self.0
            .log
            .lock()
            .unwrap()
            .push(format!("kill-pid:{}", target.pid));
        let mut doomed = self.descendants(target.pid);
        doomed.push(target.pid);
        let report = self.0.kill(&doomed);
        self.0.leave();
        report
    }
}

impl ProcessSpawner for FakeOs {
    fn spawn(&self, script: &Path, _working_dir: &Path) -> io::Result<u32> {
        self.0.enter();
        let name = script.file_name().unwrap().to_string_lossy().to_string();
        self.0.log.lock().unwrap().push(format!("spawn:{}", name));
        let failure = *self.0.spawn_error.lock().unwrap();
        let result = match failure {
            Some(kind) => Err(io::Error::new(kind, "spawn refused")),
            None => {
                let shell = self.0.insert(SHELL, None);
                self.0.insert(HELPER, Some(shell));
                Ok(shell)
            }
        };
        self.0.leave();
        result
    }
}
