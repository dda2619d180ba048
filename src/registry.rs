//! Read-only view of the OS process table.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::utils::same_process_name;

pub trait ProcessRegistry: Send + Sync {
    /// True as soon as one process with this executable name is found.
    fn is_running(&self, name: &str) -> bool {
        !self.pids_by_name(name).is_empty()
    }

    fn pids_by_name(&self, name: &str) -> Vec<u32>;

    /// All transitive children of `pid`, parents before children.
    fn descendants(&self, pid: u32) -> Vec<u32>;

    /// When the process currently holding `pid` was created, if known.
    fn start_time(&self, _pid: u32) -> Option<SystemTime> {
        None
    }
}

/// Registry backed by a fresh `sysinfo` snapshot on every query.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRegistry;

impl SystemRegistry {
    fn snapshot() -> System {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        system
    }
}

impl ProcessRegistry for SystemRegistry {
    fn is_running(&self, name: &str) -> bool {
        let system = Self::snapshot();
        let found = system
            .processes()
            .values()
            .any(|process| same_process_name(&process.name().to_string_lossy(), name));
        found
    }

    fn pids_by_name(&self, name: &str) -> Vec<u32> {
        let system = Self::snapshot();
        let mut pids: Vec<u32> = system
            .processes()
            .iter()
            .filter(|(_, process)| same_process_name(&process.name().to_string_lossy(), name))
            .map(|(pid, _)| pid.as_u32())
            .collect();
        pids.sort_unstable();
        pids
    }

    fn descendants(&self, pid: u32) -> Vec<u32> {
        let system = Self::snapshot();
        let edges = system.processes().iter().filter_map(|(child, process)| {
            process
                .parent()
                .map(|parent| (child.as_u32(), parent.as_u32()))
        });
        collect_descendants(pid, edges)
    }

    fn start_time(&self, pid: u32) -> Option<SystemTime> {
        let pid = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system
            .process(pid)
            .map(|process| UNIX_EPOCH + Duration::from_secs(process.start_time()))
    }
}

/// Breadth-first walk over `(child, parent)` pairs starting at `root`.
pub fn collect_descendants<I>(root: u32, edges: I) -> Vec<u32>
where
    I: IntoIterator<Item = (u32, u32)>,
{
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for (child, parent) in edges {
        if child != parent {
            children.entry(parent).or_default().push(child);
        }
    }
    for list in children.values_mut() {
        list.sort_unstable();
    }

    let mut seen: HashSet<u32> = HashSet::new();
    seen.insert(root);
    let mut order = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(root);

    while let Some(pid) = queue.pop_front() {
        if let Some(kids) = children.get(&pid) {
            for &kid in kids {
                if seen.insert(kid) {
                    order.push(kid);
                    queue.push_back(kid);
                }
            }
        }
    }
    order
}
