//! Stops applications that must not run alongside the helper.

use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::model::SweepReport;
use crate::terminator::ProcessTerminator;

/// Kill every listed process name, in order, never stopping early.
///
/// When something was actually killed, waits `settle` so the applications can
/// release what they held before the helper starts.
pub fn sweep_conflicts(
    terminator: &dyn ProcessTerminator,
    names: &[String],
    settle: Duration,
) -> SweepReport {
    let mut report = SweepReport::default();

    for name in names {
        report.attempted += 1;
        let result = terminator.kill_by_name(name);
        if result.found {
            report.found += 1;
        }
        if !result.is_clean() {
            report.warnings += 1;
            warn!("Conflict sweep: {} -> {:?}", name, result.outcome);
        } else {
            debug!("Conflict sweep: {} (found: {})", name, result.found);
        }
    }

    if report.found > 0 {
        info!(
            "Stopped {} conflicting application(s), waiting {:?}",
            report.found, settle
        );
        if !settle.is_zero() {
            thread::sleep(settle);
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{KillOutcome, KillReport, LaunchStamp};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedTerminator {
        calls: Mutex<Vec<String>>,
    }

    impl ProcessTerminator for ScriptedTerminator {
        fn kill_by_name(&self, name: &str) -> KillReport {
            self.calls.lock().unwrap().push(name.to_string());
            match name {
                "Discord.exe" => KillReport {
                    found: true,
                    outcome: KillOutcome::Success,
                },
                "locked.exe" => KillReport {
                    found: true,
                    outcome: KillOutcome::PermissionDenied,
                },
                _ => KillReport::absent(),
            }
        }

        fn kill_by_pid(&self, _target: LaunchStamp) -> KillReport {
            KillReport::absent()
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sweep_visits_every_name_in_order() {
        let terminator = ScriptedTerminator::default();
        let list = names(&["locked.exe", "Discord.exe", "DiscordPTB.exe"]);
        let report = sweep_conflicts(&terminator, &list, Duration::ZERO);

        assert_eq!(*terminator.calls.lock().unwrap(), list);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.found, 2);
        assert_eq!(report.warnings, 1);
    }

    #[test]
    fn nothing_found_skips_the_settle_delay() {
        let terminator = ScriptedTerminator::default();
        let started = std::time::Instant::now();
        let report = sweep_conflicts(
            &terminator,
            &names(&["DiscordCanary.exe"]),
            Duration::from_secs(5),
        );
        assert_eq!(report.found, 0);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
