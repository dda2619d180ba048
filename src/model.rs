use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

use crate::config::Config;
use crate::error::LifecycleError;
use crate::ui::icon::Theme;

/// The user-requested target state of the helper.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ToggleIntent {
    #[default]
    Off,
    On,
}

impl ToggleIntent {
    pub fn from_bool(on: bool) -> Self {
        if on { ToggleIntent::On } else { ToggleIntent::Off }
    }

    pub fn is_on(self) -> bool {
        self == ToggleIntent::On
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Phase {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
}

/// Which script the next start launches.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Primary,
    Alternate,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Primary => "primary",
            Mode::Alternate => "alternate",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "primary" | "main" => Some(Mode::Primary),
            "alternate" | "alt" => Some(Mode::Alternate),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunningProcessHandle {
    pub pid: u32,
    pub launched_at: Instant,
    /// Wall-clock time taken just before the spawn, comparable with the
    /// creation time the OS reports for `pid`.
    pub started_at: SystemTime,
    pub script: PathBuf,
}

impl RunningProcessHandle {
    pub fn uptime(&self) -> Duration {
        self.launched_at.elapsed()
    }

    pub fn stamp(&self) -> LaunchStamp {
        LaunchStamp {
            pid: self.pid,
            started_at: self.started_at,
        }
    }
}

/// A pid we launched, plus when. A process holding the same pid that was
/// created earlier is somebody else's.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LaunchStamp {
    pub pid: u32,
    pub started_at: SystemTime,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KillOutcome {
    Success,
    AlreadyExited,
    PermissionDenied,
    TimedOut,
    Failed(i32),
}

/// Result of one terminator call. An absent target is `found == false`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KillReport {
    pub found: bool,
    pub outcome: KillOutcome,
}

impl KillReport {
    pub fn absent() -> Self {
        Self {
            found: false,
            outcome: KillOutcome::AlreadyExited,
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(
            self.outcome,
            KillOutcome::Success | KillOutcome::AlreadyExited
        )
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SweepReport {
    pub attempted: usize,
    pub found: usize,
    pub warnings: usize,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StopReport {
    pub by_name: KillReport,
    pub by_pid: Option<KillReport>,
}

impl StopReport {
    pub fn found_any(&self) -> bool {
        self.by_name.found || self.by_pid.is_some_and(|r| r.found)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    Started(RunningProcessHandle),
    StartFailed(LifecycleError),
    Stopped(StopReport),
}

/// Messages from background threads to the thread that owns the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoreEvent {
    TransitionFinished {
        ticket: u64,
        outcome: TransitionOutcome,
    },
    CooldownElapsed {
        generation: u64,
    },
    LivenessSampled(bool),
}

#[derive(Clone, Debug)]
pub enum UserEvent {
    Core(CoreEvent),
    MenuAction(MenuAction),
    ConfigReloaded(Config),
    ConfigReloadFailed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MenuAction {
    Toggle(bool),
    SelectMain,
    SelectAlternate(Option<String>),
    SelectVariant(String),
    ToggleTheme,
    EditConfig,
    ReloadConfig,
    Status,
    Quit,
}

#[derive(Clone, Debug)]
pub struct Feedback {
    pub message: String,
    pub severity: FeedbackSeverity,
}

impl Feedback {
    pub fn new(message: String, severity: FeedbackSeverity) -> Self {
        Self { message, severity }
    }

    pub fn info(message: String) -> Self {
        Self::new(message, FeedbackSeverity::Info)
    }

    pub fn warning(message: String) -> Self {
        Self::new(message, FeedbackSeverity::Warning)
    }

    pub fn error(message: String) -> Self {
        Self::new(message, FeedbackSeverity::Error)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FeedbackSeverity {
    Info,
    Warning,
    Error,
}

/// Presentation state owned by whichever host runs the event loop.
#[derive(Clone, Debug, Default)]
pub struct AppState {
    pub config: Config,
    pub theme: Theme,
    pub live: bool,
    pub last_feedback: Option<Feedback>,
}
