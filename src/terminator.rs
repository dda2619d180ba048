//! Forcible termination by executable name or by pid tree.

use std::time::Duration;

use log::{debug, info, warn};

use crate::model::{KillOutcome, KillReport, LaunchStamp};
use crate::process::kill::terminate_pid;
use crate::registry::{ProcessRegistry, SystemRegistry};

pub trait ProcessTerminator: Send + Sync {
    /// Kill every process with this executable name.
    fn kill_by_name(&self, name: &str) -> KillReport;

    /// Kill the launched process together with all of its descendants.
    /// A pid now held by a process created before the launch is left alone.
    fn kill_by_pid(&self, target: LaunchStamp) -> KillReport;
}

/// Creation times are reported in whole seconds on some platforms.
const START_TIME_SLACK: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, Default)]
pub struct SystemTerminator<R = SystemRegistry> {
    registry: R,
}

impl<R: ProcessRegistry> SystemTerminator<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }
}

impl<R: ProcessRegistry> ProcessTerminator for SystemTerminator<R> {
    fn kill_by_name(&self, name: &str) -> KillReport {
        let own_pid = std::process::id();
        let pids: Vec<u32> = self
            .registry
            .pids_by_name(name)
            .into_iter()
            .filter(|pid| *pid != own_pid)
            .collect();
        if pids.is_empty() {
            debug!("No running process named {}", name);
            return KillReport::absent();
        }

        let outcomes: Vec<KillOutcome> = pids.iter().map(|pid| terminate_pid(*pid)).collect();
        let report = KillReport {
            found: true,
            outcome: merge_outcomes(&outcomes),
        };
        log_report(&format!("{} ({} instance(s))", name, pids.len()), &report);
        report
    }

    fn kill_by_pid(&self, target: LaunchStamp) -> KillReport {
        let pid = target.pid;
        if pid == std::process::id() {
            warn!("Refusing to terminate our own process (PID {})", pid);
            return KillReport::absent();
        }

        if let Some(created) = self.registry.start_time(pid)
            && created + START_TIME_SLACK < target.started_at
        {
            warn!(
                "PID {} now belongs to a process created before our launch, leaving it alone",
                pid
            );
            return KillReport::absent();
        }

        // Children first: the helper runs underneath an intermediate shell
        let descendants = self.registry.descendants(pid);
        let mut children_killed = false;
        for child in descendants.iter().rev() {
            let outcome = terminate_pid(*child);
            debug!("Descendant PID {} of {}: {:?}", child, pid, outcome);
            children_killed |= outcome == KillOutcome::Success;
        }

        let root = terminate_pid(pid);
        let report = match root {
            KillOutcome::AlreadyExited if children_killed => KillReport {
                found: true,
                outcome: KillOutcome::Success,
            },
            KillOutcome::AlreadyExited => KillReport::absent(),
            outcome => KillReport {
                found: true,
                outcome,
            },
        };
        log_report(&format!("PID {} tree", pid), &report);
        report
    }
}

/// The first non-clean outcome wins; otherwise success if anything was killed.
pub fn merge_outcomes(outcomes: &[KillOutcome]) -> KillOutcome {
    if let Some(bad) = outcomes.iter().find(|o| {
        !matches!(o, KillOutcome::Success | KillOutcome::AlreadyExited)
    }) {
        return *bad;
    }
    if outcomes.contains(&KillOutcome::Success) {
        KillOutcome::Success
    } else {
        KillOutcome::AlreadyExited
    }
}

fn log_report(label: &str, report: &KillReport) {
    match report.outcome {
        KillOutcome::Success => info!("Terminated {}", label),
        KillOutcome::AlreadyExited => info!("{} was already stopped", label),
        KillOutcome::PermissionDenied => warn!("Permission denied terminating {}", label),
        KillOutcome::TimedOut => warn!("Timed out terminating {}", label),
        KillOutcome::Failed(code) => warn!("Failed to terminate {}: error {}", label, code),
    }
}
