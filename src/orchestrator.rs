//! Helper lifecycle state machine.
//!
//! The [`Orchestrator`] lives on the interactive thread. Every start or stop
//! runs on its own worker thread and comes back as a [`CoreEvent`] through the
//! host's [`EventSink`]; only the owning thread applies outcomes to state.
//!
//! The transition lock is released by a timer, not by worker completion. A
//! toggle that arrives after the release but while the previous worker is
//! still running is rejected the same way as a locked one, so there is never
//! more than one worker alive.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use log::{debug, error, info, warn};

use crate::config::Config;
use crate::error::LifecycleError;
use crate::launcher::{Launcher, ProcessSpawner, ScriptCatalog, SystemSpawner};
use crate::model::{
    CoreEvent, LaunchStamp, Mode, Phase, RunningProcessHandle, StopReport, ToggleIntent,
    TransitionOutcome, UserEvent,
};
use crate::registry::{ProcessRegistry, SystemRegistry};
use crate::sweeper::sweep_conflicts;
use crate::terminator::{ProcessTerminator, SystemTerminator};

const SHUTDOWN_POLL_STEP: Duration = Duration::from_millis(25);

/// The presentation side of the toggle.
pub trait ToggleControl {
    fn set_enabled(&mut self, enabled: bool);
    /// Move the control without emitting a new toggle request.
    fn force_position(&mut self, on: bool);
    fn set_live_indicator(&mut self, live: bool);
    /// Blocking or prominent notice for failures the user must see.
    fn show_error(&mut self, error: &LifecycleError);
}

/// Where background threads post their results.
pub trait EventSink: Clone + Send + 'static {
    /// Returns false once nobody is listening any more.
    fn emit(&self, event: CoreEvent) -> bool;
}

impl EventSink for Sender<CoreEvent> {
    fn emit(&self, event: CoreEvent) -> bool {
        self.send(event).is_ok()
    }
}

impl EventSink for Sender<UserEvent> {
    fn emit(&self, event: CoreEvent) -> bool {
        self.send(UserEvent::Core(event)).is_ok()
    }
}

#[cfg(any(target_os = "windows", target_os = "macos"))]
impl EventSink for winit::event_loop::EventLoopProxy<UserEvent> {
    fn emit(&self, event: CoreEvent) -> bool {
        self.send_event(UserEvent::Core(event)).is_ok()
    }
}

#[derive(Clone)]
pub struct ProcessServices {
    pub registry: Arc<dyn ProcessRegistry>,
    pub terminator: Arc<dyn ProcessTerminator>,
    pub spawner: Arc<dyn ProcessSpawner>,
}

impl ProcessServices {
    pub fn system() -> Self {
        Self {
            registry: Arc::new(SystemRegistry),
            terminator: Arc::new(SystemTerminator::new(SystemRegistry)),
            spawner: Arc::new(SystemSpawner),
        }
    }
}

/// Everything a transition needs to know about the helper, taken from config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelperProfile {
    pub process_name: String,
    pub conflicts: Vec<String>,
    pub catalog: ScriptCatalog,
    pub conflict_settle: Duration,
    pub launch_settle: Duration,
    pub cooldown: Duration,
    pub shutdown_timeout: Duration,
}

impl HelperProfile {
    pub fn from_config(config: &Config) -> Self {
        Self {
            process_name: config.helper.process_name.clone(),
            conflicts: config.conflicts.process_names.clone(),
            catalog: ScriptCatalog::from_config(&config.helper),
            conflict_settle: Duration::from_millis(config.conflicts.settle_ms),
            launch_settle: config.timing.launch_settle(),
            cooldown: config.timing.cooldown(),
            shutdown_timeout: config.timing.shutdown_timeout(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransitionRequest {
    Accepted,
    Rejected,
}

#[derive(Debug, Default)]
struct TransitionLock {
    engaged: bool,
    deadline: Option<Instant>,
    generation: u64,
}

impl TransitionLock {
    fn engage(&mut self, cooldown: Duration) -> u64 {
        self.generation += 1;
        self.engaged = true;
        self.deadline = Some(Instant::now() + cooldown);
        self.generation
    }

    /// Only the timer armed by the latest `engage` may release the lock.
    fn release(&mut self, generation: u64) -> bool {
        if self.engaged && generation == self.generation {
            self.engaged = false;
            self.deadline = None;
            true
        } else {
            false
        }
    }
}

struct InFlight {
    ticket: u64,
    /// Yields the helper the worker started, if any.
    join: JoinHandle<Option<LaunchStamp>>,
}

struct StartJob {
    helper_name: String,
    previous: Option<LaunchStamp>,
    conflicts: Vec<String>,
    conflict_settle: Duration,
    catalog: ScriptCatalog,
    mode: Mode,
    variant: Option<String>,
    launch_settle: Duration,
}

pub struct Orchestrator<S: EventSink> {
    services: ProcessServices,
    profile: HelperProfile,
    sink: S,
    intent: ToggleIntent,
    phase: Phase,
    lock: TransitionLock,
    handle: Option<RunningProcessHandle>,
    mode: Mode,
    variant: Option<String>,
    liveness: bool,
    in_flight: Option<InFlight>,
    next_ticket: u64,
    /// A mode switch asked for a stop while a worker was still running.
    pending_stop: bool,
}

impl<S: EventSink> Orchestrator<S> {
    pub fn new(services: ProcessServices, profile: HelperProfile, sink: S) -> Self {
        Self {
            services,
            profile,
            sink,
            intent: ToggleIntent::Off,
            phase: Phase::Idle,
            lock: TransitionLock::default(),
            handle: None,
            mode: Mode::Primary,
            variant: None,
            liveness: false,
            in_flight: None,
            next_ticket: 1,
            pending_stop: false,
        }
    }

    pub fn intent(&self) -> ToggleIntent {
        self.intent
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    pub fn handle(&self) -> Option<&RunningProcessHandle> {
        self.handle.as_ref()
    }

    pub fn liveness(&self) -> bool {
        self.liveness
    }

    pub fn is_locked(&self) -> bool {
        self.lock.engaged
    }

    pub fn lock_deadline(&self) -> Option<Instant> {
        self.lock.deadline
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn profile(&self) -> &HelperProfile {
        &self.profile
    }

    /// Takes effect from the next transition on.
    pub fn apply_profile(&mut self, profile: HelperProfile) {
        if profile.process_name != self.profile.process_name {
            info!(
                "Helper process name changed: {} -> {}",
                self.profile.process_name, profile.process_name
            );
        }
        self.profile = profile;
    }

    /// Restore mode and variant from a previous session without touching processes.
    pub fn restore_selection(&mut self, mode: Mode, variant: Option<String>) {
        self.mode = mode;
        self.variant = variant;
    }

    pub fn handle_event(&mut self, event: CoreEvent, ui: &mut dyn ToggleControl) {
        match event {
            CoreEvent::TransitionFinished { ticket, outcome } => {
                self.on_transition_finished(ticket, outcome, ui)
            }
            CoreEvent::CooldownElapsed { generation } => self.on_cooldown_elapsed(generation, ui),
            CoreEvent::LivenessSampled(live) => self.on_liveness(live, ui),
        }
    }

    pub fn request_transition(
        &mut self,
        desired_on: bool,
        ui: &mut dyn ToggleControl,
    ) -> TransitionRequest {
        if self.lock.engaged || self.in_flight.is_some() {
            debug!(
                "Toggle to {} rejected (locked: {}, busy: {})",
                desired_on,
                self.lock.engaged,
                self.in_flight.is_some()
            );
            ui.force_position(self.intent.is_on());
            return TransitionRequest::Rejected;
        }

        self.arm_cooldown(ui);
        self.intent = ToggleIntent::from_bool(desired_on);
        if desired_on {
            self.begin_start();
        } else {
            self.begin_stop();
        }
        TransitionRequest::Accepted
    }

    pub fn select_main(&mut self, ui: &mut dyn ToggleControl) {
        self.switch_mode(Mode::Primary, ui);
    }

    pub fn select_alternate(&mut self, variant: Option<String>, ui: &mut dyn ToggleControl) {
        if let Some(variant) = variant {
            self.variant = Some(variant);
        }
        self.switch_mode(Mode::Alternate, ui);
    }

    /// Pick a different alternate script. A running helper keeps running.
    pub fn set_variant(&mut self, variant: String) {
        info!("Selected variant: {}", variant);
        self.variant = Some(variant);
    }

    pub fn on_cooldown_elapsed(&mut self, generation: u64, ui: &mut dyn ToggleControl) {
        if self.lock.release(generation) {
            debug!("Transition lock released (generation {})", generation);
            ui.set_enabled(true);
        }
    }

    pub fn on_liveness(&mut self, live: bool, ui: &mut dyn ToggleControl) {
        if live != self.liveness {
            info!(
                "{} is {}",
                self.profile.process_name,
                if live { "running" } else { "not running" }
            );
        }
        self.liveness = live;
        ui.set_live_indicator(live);
    }

    pub fn on_transition_finished(
        &mut self,
        ticket: u64,
        outcome: TransitionOutcome,
        ui: &mut dyn ToggleControl,
    ) {
        match self.in_flight.take() {
            Some(flight) if flight.ticket == ticket => {
                // The worker already sent its last message
                let _ = flight.join.join();
            }
            other => {
                self.in_flight = other;
                warn!("Ignoring result of unknown transition {}", ticket);
                return;
            }
        }

        match outcome {
            TransitionOutcome::Started(handle) => {
                if self.pending_stop {
                    info!(
                        "Helper PID {} started during a mode switch, stopping it",
                        handle.pid
                    );
                    self.pending_stop = false;
                    self.handle = Some(handle);
                    self.begin_stop();
                    return;
                }
                info!(
                    "Helper running: {} (PID {})",
                    handle.script.display(),
                    handle.pid
                );
                self.handle = Some(handle);
                self.phase = Phase::Running;
                ui.force_position(self.intent.is_on());
            }
            TransitionOutcome::StartFailed(err) => {
                error!("Start failed: {}", err);
                self.intent = ToggleIntent::Off;
                self.phase = Phase::Idle;
                self.handle = None;
                ui.force_position(false);
                ui.show_error(&err);
                if self.pending_stop {
                    self.pending_stop = false;
                    self.begin_stop();
                }
            }
            TransitionOutcome::Stopped(report) => {
                if report.found_any() {
                    info!("Helper stopped: {:?}", report);
                } else {
                    debug!("Stop found nothing to terminate");
                }
                self.phase = Phase::Idle;
                if self.pending_stop {
                    self.pending_stop = false;
                    self.begin_stop();
                }
            }
        }
    }

    /// Stop everything before the process exits, blocking up to the shutdown timeout.
    pub fn shutdown(&mut self) {
        let deadline = Instant::now() + self.profile.shutdown_timeout;
        let mut target = self.handle.take().map(|h| h.stamp());

        if let Some(flight) = self.in_flight.take() {
            while !flight.join.is_finished() && Instant::now() < deadline {
                thread::sleep(SHUTDOWN_POLL_STEP);
            }
            if flight.join.is_finished() {
                if let Ok(Some(started)) = flight.join.join() {
                    target = target.or(Some(started));
                }
            } else {
                warn!("Transition {} still running at shutdown", flight.ticket);
            }
        }

        let helper = self.profile.process_name.clone();
        let terminator = self.services.terminator.clone();
        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let _ = tx.send(run_stop(terminator.as_ref(), &helper, target));
        });

        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(report) => info!("Shutdown stop finished: {:?}", report),
            Err(_) => warn!("Shutdown stop did not finish within {:?}", self.profile.shutdown_timeout),
        }

        self.intent = ToggleIntent::Off;
        self.phase = Phase::Idle;
        self.pending_stop = false;
    }

    fn switch_mode(&mut self, mode: Mode, ui: &mut dyn ToggleControl) {
        info!(
            "Switching to {} mode{}",
            mode.as_str(),
            self.variant
                .as_deref()
                .filter(|_| mode == Mode::Alternate)
                .map(|v| format!(" ({})", v))
                .unwrap_or_default()
        );
        self.intent = ToggleIntent::Off;
        ui.force_position(false);
        self.arm_cooldown(ui);
        if self.in_flight.is_some() {
            self.pending_stop = true;
        } else {
            self.begin_stop();
        }
        self.mode = mode;
    }

    fn arm_cooldown(&mut self, ui: &mut dyn ToggleControl) {
        let cooldown = self.profile.cooldown;
        let generation = self.lock.engage(cooldown);
        ui.set_enabled(false);

        let sink = self.sink.clone();
        thread::spawn(move || {
            thread::sleep(cooldown);
            if !sink.emit(CoreEvent::CooldownElapsed { generation }) {
                debug!("Cooldown {} elapsed after the event loop closed", generation);
            }
        });
    }

    fn begin_start(&mut self) {
        self.phase = Phase::Starting;
        let job = StartJob {
            helper_name: self.profile.process_name.clone(),
            previous: self.handle.take().map(|h| h.stamp()),
            conflicts: self.profile.conflicts.clone(),
            conflict_settle: self.profile.conflict_settle,
            catalog: self.profile.catalog.clone(),
            mode: self.mode,
            variant: self.variant.clone(),
            launch_settle: self.profile.launch_settle,
        };
        self.dispatch(move |services| run_start(services, job));
    }

    fn begin_stop(&mut self) {
        self.phase = Phase::Stopping;
        let helper = self.profile.process_name.clone();
        let target = self.handle.take().map(|h| h.stamp());
        self.dispatch(move |services| {
            TransitionOutcome::Stopped(run_stop(services.terminator.as_ref(), &helper, target))
        });
    }

    fn dispatch<F>(&mut self, job: F)
    where
        F: FnOnce(&ProcessServices) -> TransitionOutcome + Send + 'static,
    {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let services = self.services.clone();
        let sink = self.sink.clone();

        let join = thread::spawn(move || {
            let outcome = job(&services);
            let started = match &outcome {
                TransitionOutcome::Started(handle) => Some(handle.stamp()),
                _ => None,
            };
            if !sink.emit(CoreEvent::TransitionFinished { ticket, outcome }) {
                debug!("Transition {} finished after the event loop closed", ticket);
            }
            started
        });
        self.in_flight = Some(InFlight { ticket, join });
    }
}

fn run_start(services: &ProcessServices, job: StartJob) -> TransitionOutcome {
    // A fresh start never assumes a clean process table
    services.terminator.kill_by_name(&job.helper_name);
    if let Some(previous) = job.previous {
        services.terminator.kill_by_pid(previous);
    }

    sweep_conflicts(
        services.terminator.as_ref(),
        &job.conflicts,
        job.conflict_settle,
    );

    let script = match job.catalog.resolve(job.mode, job.variant.as_deref()) {
        Ok(script) => script,
        Err(err) => return TransitionOutcome::StartFailed(err),
    };

    let launcher = Launcher::new(services.spawner.clone(), job.launch_settle);
    match launcher.launch(&script) {
        Ok(handle) => TransitionOutcome::Started(handle),
        Err(err) => TransitionOutcome::StartFailed(err),
    }
}

/// Best-effort: every step runs whatever the previous one reported.
fn run_stop(
    terminator: &dyn ProcessTerminator,
    helper: &str,
    target: Option<LaunchStamp>,
) -> StopReport {
    let by_name = terminator.kill_by_name(helper);
    let by_pid = target.map(|target| terminator.kill_by_pid(target));
    StopReport { by_name, by_pid }
}
