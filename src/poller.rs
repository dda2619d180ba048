//! Periodic liveness sampling of the helper process.

use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{RecvTimeoutError, Sender};
use log::{debug, trace};

use crate::config::Config;
use crate::model::CoreEvent;
use crate::orchestrator::EventSink;
use crate::registry::ProcessRegistry;

/// Owns the poller thread. Dropping it stops the thread at its next tick.
pub struct PollerHandle {
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn stop(mut self) {
        self.stop_tx.take();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop_tx.take();
    }
}

/// Sample immediately, then once per `timing.poll_interval_ms`.
///
/// The helper name and interval are re-read from `shared_config` on every tick
/// so a hot reload applies without restarting the thread.
pub fn spawn_poller<S: EventSink>(
    registry: Arc<dyn ProcessRegistry>,
    shared_config: Arc<RwLock<Config>>,
    sink: S,
) -> PollerHandle {
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);

    let join = thread::spawn(move || {
        loop {
            let (name, interval) = {
                let cfg = shared_config.read().unwrap_or_else(|e| e.into_inner());
                (cfg.helper.process_name.clone(), cfg.timing.poll_interval())
            };

            let live = registry.is_running(&name);
            trace!("Liveness tick: {} running = {}", name, live);
            if !sink.emit(CoreEvent::LivenessSampled(live)) {
                break;
            }

            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                _ => break,
            }
        }
        debug!("Liveness poller stopped");
    });

    PollerHandle {
        stop_tx: Some(stop_tx),
        join: Some(join),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct Switch(AtomicBool);

    impl ProcessRegistry for Switch {
        fn pids_by_name(&self, _name: &str) -> Vec<u32> {
            if self.0.load(Ordering::SeqCst) {
                vec![77]
            } else {
                Vec::new()
            }
        }

        fn descendants(&self, _pid: u32) -> Vec<u32> {
            Vec::new()
        }
    }

    fn fast_config() -> Arc<RwLock<Config>> {
        let mut config = Config::default();
        config.timing.poll_interval_ms = 50;
        Arc::new(RwLock::new(config))
    }

    #[test]
    fn reports_not_running_within_one_interval() {
        let registry = Arc::new(Switch(AtomicBool::new(false)));
        let (tx, rx) = crossbeam_channel::unbounded::<CoreEvent>();
        let poller = spawn_poller(registry, fast_config(), tx);

        assert_eq!(
            rx.recv_timeout(Duration::from_millis(500)),
            Ok(CoreEvent::LivenessSampled(false))
        );
        poller.stop();
    }

    #[test]
    fn follows_the_process_table() {
        let registry = Arc::new(Switch(AtomicBool::new(false)));
        let (tx, rx) = crossbeam_channel::unbounded::<CoreEvent>();
        let poller = spawn_poller(registry.clone(), fast_config(), tx);

        assert_eq!(
            rx.recv_timeout(Duration::from_millis(500)),
            Ok(CoreEvent::LivenessSampled(false))
        );
        registry.0.store(true, Ordering::SeqCst);
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        let mut seen_live = false;
        while std::time::Instant::now() < deadline {
            if let Ok(CoreEvent::LivenessSampled(true)) =
                rx.recv_timeout(Duration::from_millis(100))
            {
                seen_live = true;
                break;
            }
        }
        assert!(seen_live);
        poller.stop();
    }

    #[test]
    fn stops_when_the_receiver_is_gone() {
        let registry = Arc::new(Switch(AtomicBool::new(false)));
        let (tx, rx) = crossbeam_channel::unbounded::<CoreEvent>();
        drop(rx);
        // Joins promptly: the first emit fails and the loop exits
        spawn_poller(registry, fast_config(), tx).stop();
    }
}
